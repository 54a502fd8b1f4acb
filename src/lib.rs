//! Ticketed plot-allotment workflow with PDF document generation.
//!
//! A buyer's application moves through review, allotment, cost
//! finalization and signing. Along the way the crate produces the
//! allotment letter, payment receipt and signed agreement as PDFs.

pub mod backend;
pub mod config;
pub mod cost;
pub mod delivery;
pub mod error;
pub mod lifecycle;
pub mod render;
pub mod signature;
pub mod ticket;
pub mod workflow;

pub use error::{AppError, BackendError, Result};
pub use lifecycle::{Booking, Decision, Stage, StageKind};
pub use ticket::{Ticket, TicketId};
pub use workflow::{Issued, Workflow};
