//! Getting a generated document to its destination: a file on disk or a
//! notification upload.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::backend::{Attachment, Backend, Notice};
use crate::cost::format_amount;
use crate::error::{AppError, Result};
use crate::render::RenderedPdf;
use crate::ticket::Ticket;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentKind {
    AllotmentLetter,
    PaymentReceipt { number: String },
    Agreement,
}

impl DocumentKind {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::AllotmentLetter => "allotment letter",
            Self::PaymentReceipt { .. } => "payment receipt",
            Self::Agreement => "agreement",
        }
    }

    /// Deterministic file name for this kind of document.
    #[must_use]
    pub fn file_name(&self, ticket: &Ticket) -> String {
        match self {
            Self::AllotmentLetter => {
                format!("Allotment-Letter-{}.pdf", hyphenate(ticket.display_name()))
            }
            Self::PaymentReceipt { number } => format!("Payment-Receipt-{number}.pdf"),
            Self::Agreement => format!("Agreement-{}.pdf", hyphenate(ticket.id.as_str())),
        }
    }

    const fn notice(&self) -> Option<Notice> {
        match self {
            Self::AllotmentLetter => Some(Notice::Allotment),
            Self::PaymentReceipt { .. } => Some(Notice::Receipt),
            Self::Agreement => None,
        }
    }
}

/// Spaces become hyphens; path separators are not allowed through.
fn hyphenate(text: &str) -> String {
    text.trim()
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '-',
            other => other,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDocument {
    pub kind: DocumentKind,
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub signed_pages: Vec<usize>,
}

impl GeneratedDocument {
    #[must_use]
    pub fn new(kind: DocumentKind, ticket: &Ticket, rendered: RenderedPdf) -> Self {
        Self {
            file_name: kind.file_name(ticket),
            kind,
            bytes: rendered.bytes,
            page_count: rendered.page_count,
            signed_pages: rendered.signed_pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Write into this directory.
    Save(PathBuf),
    /// Upload to the matching notification endpoint.
    Transmit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivered {
    Saved(PathBuf),
    Transmitted,
}

/// Writes the document under `dir`, creating the directory if needed.
pub fn save_to_dir(document: &GeneratedDocument, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(&document.file_name);
    fs::write(&path, &document.bytes)?;
    info!(
        kind = document.kind.label(),
        path = %path.display(),
        pages = document.page_count,
        "Document saved"
    );
    Ok(path)
}

/// Uploads the document with the buyer's name, email and project alongside it.
pub fn transmit<B: Backend + ?Sized>(
    backend: &B,
    document: &GeneratedDocument,
    ticket: &Ticket,
    project_name: &str,
) -> Result<()> {
    let Some(notice) = document.kind.notice() else {
        return Err(AppError::validation(format!(
            "{} cannot be sent, only saved",
            document.kind.label()
        )));
    };

    let mut extra = vec![("ticket_id".to_string(), ticket.id.to_string())];
    if let DocumentKind::PaymentReceipt { number } = &document.kind {
        extra.push(("receipt_no".to_string(), number.clone()));
    }
    if let Some(booking) = ticket.stage.booking() {
        extra.push(("booking_amount".to_string(), format_amount(booking.booking_amount)));
    }

    let attachment = Attachment {
        file_name: document.file_name.clone(),
        bytes: document.bytes.clone(),
        name: ticket.display_name().to_string(),
        email: ticket.contact.email.clone(),
        project: project_name.to_string(),
        extra,
    };
    backend
        .send_document(notice, &attachment)
        .map_err(AppError::Transmission)?;
    info!(
        kind = document.kind.label(),
        ticket_id = %ticket.id,
        endpoint = notice.path(),
        "Document transmitted"
    );
    Ok(())
}

pub fn deliver<B: Backend + ?Sized>(
    backend: &B,
    document: &GeneratedDocument,
    ticket: &Ticket,
    project_name: &str,
    delivery: &Delivery,
) -> Result<Delivered> {
    match delivery {
        Delivery::Save(dir) => save_to_dir(document, dir).map(Delivered::Saved),
        Delivery::Transmit => {
            transmit(backend, document, ticket, project_name).map(|()| Delivered::Transmitted)
        }
    }
}
