//! Error taxonomy shared by every layer of the crate.

use thiserror::Error;

use crate::lifecycle::{Action, StageKind};

/// Failures reported by the REST collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("server rejected request with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("ticket {0} not found")]
    NotFound(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or malformed input, caught before any network call.
    #[error("Validation failed: {0}")]
    Validation(String),
    /// The ticket's current stage does not permit the action.
    #[error("Cannot {action} a ticket that is {stage}")]
    InvalidTransition { action: Action, stage: StageKind },
    #[error("Backend request failed: {0}")]
    Backend(#[from] BackendError),
    /// The backend returned a flag combination that breaks the lifecycle ordering.
    #[error("Ticket {ticket_id} is inconsistent: {reason}")]
    InconsistentTicket { ticket_id: String, reason: String },
    #[error("Failed to render document: {0}")]
    Render(String),
    #[error("Failed to transmit document: {0}")]
    Transmission(BackendError),
    #[error("Failed to load config: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True when the failure happened before anything was sent to the backend.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::InvalidTransition { .. } | Self::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
