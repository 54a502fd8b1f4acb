//! REST collaborator seam.
//!
//! Everything this crate persists goes through [`Backend`]: listing drafts,
//! partial updates for lifecycle transitions, and the two notification
//! uploads that carry a generated document.

mod http;
mod memory;
mod multipart;

pub use http::HttpBackend;
pub use memory::{MemoryBackend, RecordedCall};
pub use multipart::MultipartForm;

use crate::error::BackendError;
use crate::lifecycle::TicketUpdate;
use crate::ticket::{DraftRecord, TicketId};

/// Query for `GET /draft`. Unset fields are left out of the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftFilter {
    pub alloted: Option<bool>,
    pub allotment_done: Option<bool>,
    pub user_id: Option<String>,
    pub signed: Option<bool>,
}

impl DraftFilter {
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(alloted) = self.alloted {
            pairs.push(("alloted", alloted.to_string()));
        }
        if let Some(done) = self.allotment_done {
            pairs.push(("allotment_done", done.to_string()));
        }
        if let Some(user_id) = &self.user_id {
            pairs.push(("user_id", user_id.clone()));
        }
        if let Some(signed) = self.signed {
            pairs.push(("signed", signed.to_string()));
        }
        pairs
    }

    /// Client-side equivalent of the server filter.
    #[must_use]
    pub fn matches(&self, record: &DraftRecord) -> bool {
        let flag = |wanted: Option<bool>, actual: Option<bool>| {
            wanted.map_or(true, |w| w == actual.unwrap_or(false))
        };
        flag(self.alloted, record.alloted)
            && flag(self.allotment_done, record.allotment_done)
            && flag(self.signed, record.signed)
            && self
                .user_id
                .as_ref()
                .map_or(true, |id| record.user_id.as_ref() == Some(id))
    }
}

/// Notification endpoints that accept a generated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Allotment,
    Receipt,
}

impl Notice {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Allotment => "send-allotment",
            // The backend route is spelled this way.
            Self::Receipt => "send-recipt",
        }
    }
}

/// A generated file plus the context fields sent alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub name: String,
    pub email: String,
    pub project: String,
    pub extra: Vec<(String, String)>,
}

impl Attachment {
    #[must_use]
    pub fn to_form(&self) -> MultipartForm {
        let mut form = MultipartForm::new();
        form.file("file", &self.file_name, "application/pdf", &self.bytes);
        form.text("name", &self.name);
        form.text("email", &self.email);
        form.text("project", &self.project);
        for (key, value) in &self.extra {
            form.text(key, value);
        }
        form
    }
}

pub trait Backend {
    fn list_drafts(&self, filter: &DraftFilter) -> Result<Vec<DraftRecord>, BackendError>;

    fn update_draft(&self, ticket_id: &TicketId, update: &TicketUpdate)
        -> Result<(), BackendError>;

    fn send_document(&self, notice: Notice, attachment: &Attachment) -> Result<(), BackendError>;
}
