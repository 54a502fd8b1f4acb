//! One-page payment receipt.

use chrono::NaiveDate;

use super::layout::{Block, Party, Section, Template};
use super::{format_date, letterhead};
use crate::config::ProjectConfig;
use crate::cost::{amount_in_words, format_rupees};
use crate::error::{AppError, Result};
use crate::ticket::Ticket;

pub const TITLE: &str = "Payment Receipt";

/// `NN` + ddmmyyyy + first letter of the name + `01`.
///
/// Leading punctuation and digits are skipped when looking for the letter.
/// Two receipts issued on the same day to names sharing an initial get the
/// same number.
#[must_use]
pub fn receipt_number(name: &str, date: NaiveDate) -> String {
    let initial = name
        .chars()
        .find(|c| c.is_alphabetic())
        .map(|c| c.to_uppercase().to_string())
        .unwrap_or_else(|| "X".to_string());
    format!("NN{}{}01", date.format("%d%m%Y"), initial)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub number: String,
    pub amount: f64,
    pub template: Template,
}

/// Receipt for `amount`, or for the finalized booking amount when none is given.
pub fn payment_receipt(
    ticket: &Ticket,
    project: &ProjectConfig,
    amount: Option<f64>,
    date: NaiveDate,
) -> Result<Receipt> {
    let booking = ticket.stage.booking();
    let amount = match (amount, booking) {
        (Some(amount), _) => amount,
        (None, Some(booking)) => booking.booking_amount,
        (None, None) => {
            return Err(AppError::validation(format!(
                "ticket {} has no booking amount yet; pass an amount",
                ticket.id
            )))
        }
    };
    if !amount.is_finite() || amount <= 0.0 {
        return Err(AppError::validation(format!(
            "receipt amount must be positive, got {amount}"
        )));
    }

    let number = receipt_number(ticket.display_name(), date);
    let mode = booking.map_or_else(|| "-".to_string(), |b| b.mode.clone());
    let unit = ticket
        .stage
        .allotment()
        .map_or_else(|| "-".to_string(), |a| a.unit.clone());
    let project_name = if ticket.selection.project.trim().is_empty() {
        project.name.clone()
    } else {
        ticket.selection.project.clone()
    };

    let mut template = letterhead(project, TITLE, format!("Receipt {number}"));
    template.sections = vec![Section::new()
        .with(Block::Title("Payment Receipt".into()))
        .with(Block::Fields(vec![
            ("Receipt No.".into(), number.clone()),
            ("Date".into(), format_date(date)),
            ("Ticket No.".into(), ticket.id.to_string()),
        ]))
        .with(Block::Spacer(3.0))
        .with(Block::Paragraph(format!(
            "Received with thanks from {} the sum of {} ({}) towards booking of unit {} in {}.",
            ticket.display_name(),
            format_rupees(amount),
            amount_in_words(amount),
            unit,
            project_name
        )))
        .with(Block::Fields(vec![
            ("Received From".into(), ticket.display_name().to_string()),
            ("Amount".into(), format_rupees(amount)),
            ("Amount in Words".into(), amount_in_words(amount)),
            ("Purpose".into(), format!("Booking amount for {project_name}")),
            ("Payment Mode".into(), mode),
        ]))
        .with(Block::Spacer(4.0))
        .with(Block::Paragraph(
            "This receipt is valid subject to realisation of the payment.".into(),
        ))
        .with(Block::Spacer(8.0))
        .with(Block::Signatures(vec![Party {
            caption: format!("For {}", project.company.name),
            name: project.company.signatory.clone(),
            buyer_signature: false,
        }]))];

    Ok(Receipt {
        number,
        amount,
        template,
    })
}
