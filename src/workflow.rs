//! Orchestration of the admin and buyer actions.
//!
//! Each method does one screen's worth of work: load or take a ticket, run
//! a transition or build a document, and deliver it. Failures are logged
//! here and handed back unchanged; nothing is retried.

use chrono::NaiveDate;
use tracing::{error, info, warn};

use crate::backend::{Backend, DraftFilter};
use crate::config::ProjectConfig;
use crate::cost::{self, CostBreakdown, RateOverrides};
use crate::delivery::{deliver, Delivered, Delivery, DocumentKind, GeneratedDocument};
use crate::error::{AppError, BackendError, Result};
use crate::lifecycle::{Booking, Decision, StageKind, StateMachine};
use crate::render::{self, agreement, letter, receipt};
use crate::signature::{Signature, SignaturePad};
use crate::ticket::{Ticket, TicketId};

/// A generated document and where it ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issued {
    pub document: GeneratedDocument,
    pub delivered: Delivered,
}

pub struct Workflow<'a, B: Backend + ?Sized> {
    backend: &'a B,
    project: &'a ProjectConfig,
}

impl<'a, B: Backend + ?Sized> Workflow<'a, B> {
    pub fn new(backend: &'a B, project: &'a ProjectConfig) -> Self {
        Self { backend, project }
    }

    fn machine(&self) -> StateMachine<'a, B> {
        StateMachine::new(self.backend)
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    /// Tickets matching `filter`. Records that break the lifecycle ordering
    /// are skipped.
    pub fn list(&self, filter: &DraftFilter) -> Result<Vec<Ticket>> {
        let records = self.backend.list_drafts(filter).inspect_err(|e| {
            error!(error = %e, "Listing drafts failed");
        })?;
        let total = records.len();
        let tickets: Vec<Ticket> = records
            .into_iter()
            .filter_map(|record| match Ticket::try_from(record) {
                Ok(ticket) => Some(ticket),
                Err(e) => {
                    warn!(error = %e, "Skipping inconsistent draft");
                    None
                }
            })
            .collect();
        info!(total, usable = tickets.len(), "Drafts listed");
        Ok(tickets)
    }

    /// Fetches one ticket. An inconsistent record is an error here.
    pub fn find_ticket(&self, ticket_id: &TicketId) -> Result<Ticket> {
        let records = self.backend.list_drafts(&DraftFilter::default())?;
        let record = records
            .into_iter()
            .find(|record| &record.ticket_id == ticket_id)
            .ok_or_else(|| BackendError::NotFound(ticket_id.to_string()))?;
        Ticket::try_from(record).inspect_err(|e| {
            error!(ticket_id = %ticket_id, error = %e, "Ticket cannot be loaded");
        })
    }

    // ------------------------------------------------------------------------
    // Admin transitions
    // ------------------------------------------------------------------------

    pub fn review(&self, ticket: &mut Ticket, decision: Decision) -> Result<()> {
        self.machine()
            .review(ticket, decision)
            .inspect_err(|e| self.log_failure(ticket, "review", e))
    }

    pub fn allot(&self, ticket: &mut Ticket, unit: &str, gift: &str) -> Result<()> {
        self.machine()
            .allot(ticket, unit, gift)
            .inspect_err(|e| self.log_failure(ticket, "allot", e))
    }

    /// Finalizes with admin-entered figures, taken as given.
    pub fn finalize(&self, ticket: &mut Ticket, booking: Booking) -> Result<()> {
        self.machine()
            .finalize_allotment(ticket, booking)
            .inspect_err(|e| self.log_failure(ticket, "finalize", e))
    }

    /// Finalizes with the total cost and booking amount computed for `area`
    /// at the ticket's rates.
    pub fn finalize_with_engine(
        &self,
        ticket: &mut Ticket,
        mode: &str,
        area: f64,
        rates: &RateOverrides,
    ) -> Result<CostBreakdown> {
        let inputs = rates.apply(self.project.cost_inputs(area));
        inputs.validate()?;
        let costs = cost::compute(&inputs);
        let booking = Booking {
            mode: mode.to_string(),
            area,
            total_cost: costs.total_cost,
            booking_amount: costs.booking_amount,
        };
        self.finalize(ticket, booking)?;
        Ok(costs)
    }

    // ------------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------------

    pub fn issue_letter(
        &self,
        ticket: &Ticket,
        rates: &RateOverrides,
        date: NaiveDate,
        delivery: &Delivery,
    ) -> Result<Issued> {
        let result = letter::allotment_letter(ticket, self.project, rates, date)
            .and_then(|template| render::render(&template, None))
            .map(|rendered| GeneratedDocument::new(DocumentKind::AllotmentLetter, ticket, rendered))
            .and_then(|document| self.deliver(ticket, document, delivery));
        result.inspect_err(|e| self.log_failure(ticket, "issue letter", e))
    }

    pub fn issue_receipt(
        &self,
        ticket: &Ticket,
        amount: Option<f64>,
        date: NaiveDate,
        delivery: &Delivery,
    ) -> Result<Issued> {
        let result = receipt::payment_receipt(ticket, self.project, amount, date).and_then(|receipt| {
            let rendered = render::render(&receipt.template, None)?;
            let kind = DocumentKind::PaymentReceipt {
                number: receipt.number,
            };
            self.deliver(ticket, GeneratedDocument::new(kind, ticket, rendered), delivery)
        });
        result.inspect_err(|e| self.log_failure(ticket, "issue receipt", e))
    }

    /// Saves the buyer's signature, which marks the ticket signed, then
    /// writes the signed agreement.
    ///
    /// If the agreement cannot be written afterwards, the ticket stays
    /// signed; [`Workflow::reissue_agreement`] regenerates it.
    pub fn sign_agreement(
        &self,
        ticket: &mut Ticket,
        pad: &mut SignaturePad,
        date: NaiveDate,
        delivery: &Delivery,
    ) -> Result<Issued> {
        let machine = self.machine();
        let signature = pad
            .save(&machine, ticket)
            .inspect_err(|e| self.log_failure(ticket, "sign", e))?;
        self.reissue_agreement(ticket, &signature, date, delivery)
    }

    /// Renders the agreement of an already signed ticket with `signature`
    /// on every page.
    pub fn reissue_agreement(
        &self,
        ticket: &Ticket,
        signature: &Signature,
        date: NaiveDate,
        delivery: &Delivery,
    ) -> Result<Issued> {
        let result = if ticket.stage.kind() == StageKind::Signed {
            agreement::agreement(ticket, self.project, date)
                .and_then(|template| render::render(&template, Some(signature)))
                .map(|rendered| GeneratedDocument::new(DocumentKind::Agreement, ticket, rendered))
                .and_then(|document| self.deliver(ticket, document, delivery))
        } else {
            Err(AppError::validation(format!(
                "ticket {} is {}, not signed",
                ticket.id,
                ticket.stage.kind()
            )))
        };
        result.inspect_err(|e| self.log_failure(ticket, "issue agreement", e))
    }

    fn deliver(&self, ticket: &Ticket, document: GeneratedDocument, delivery: &Delivery) -> Result<Issued> {
        let project_name = if ticket.selection.project.trim().is_empty() {
            self.project.name.as_str()
        } else {
            ticket.selection.project.as_str()
        };
        let delivered = deliver(self.backend, &document, ticket, project_name, delivery)?;
        info!(
            ticket_id = %ticket.id,
            kind = document.kind.label(),
            pages = document.page_count,
            file = %document.file_name,
            "Document issued"
        );
        Ok(Issued { document, delivered })
    }

    fn log_failure(&self, ticket: &Ticket, action: &str, e: &AppError) {
        if e.is_local() {
            warn!(ticket_id = %ticket.id, action, error = %e, "Action refused");
        } else {
            error!(ticket_id = %ticket.id, action, error = %e, "Action failed");
        }
    }
}
