//! Application state machine.
//!
//! The backend keeps a ticket's lifecycle as independent flags
//! (`approved`, `alloted`, `allotment_done`, `signed`). Here they are read
//! into one [`Stage`] and every change goes through a transition function
//! that checks the current stage first, so flags can never be set out of
//! order from this side.
//!
//! ```text
//! Pending -> Approved -> Allotted -> AllotmentFinalized -> Signed
//!         \-> Rejected
//! ```
//!
//! `Rejected` and `Signed` are terminal.

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use crate::backend::Backend;
use crate::error::{AppError, Result};
use crate::ticket::{Approval, DraftRecord, Ticket};

// ============================================================================
// Stages
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allotment {
    pub unit: String,
    pub gift: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    pub mode: String,
    pub area: f64,
    pub total_cost: f64,
    pub booking_amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Pending,
    Rejected,
    Approved,
    Allotted(Allotment),
    AllotmentFinalized(Allotment, Booking),
    Signed(Allotment, Booking),
}

/// Stage without its payload, for messages and matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Pending,
    Rejected,
    Approved,
    Allotted,
    AllotmentFinalized,
    Signed,
}

impl StageKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Rejected => "rejected",
            Self::Approved => "approved",
            Self::Allotted => "allotted",
            Self::AllotmentFinalized => "allotment finalized",
            Self::Signed => "signed",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Review,
    Allot,
    FinalizeAllotment,
    MarkSigned,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Review => "review",
            Self::Allot => "allot",
            Self::FinalizeAllotment => "finalize allotment of",
            Self::MarkSigned => "mark signed",
        })
    }
}

impl Stage {
    #[must_use]
    pub const fn kind(&self) -> StageKind {
        match self {
            Self::Pending => StageKind::Pending,
            Self::Rejected => StageKind::Rejected,
            Self::Approved => StageKind::Approved,
            Self::Allotted(_) => StageKind::Allotted,
            Self::AllotmentFinalized(..) => StageKind::AllotmentFinalized,
            Self::Signed(..) => StageKind::Signed,
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Signed(..))
    }

    #[must_use]
    pub const fn allotment(&self) -> Option<&Allotment> {
        match self {
            Self::Allotted(a) | Self::AllotmentFinalized(a, _) | Self::Signed(a, _) => Some(a),
            _ => None,
        }
    }

    #[must_use]
    pub const fn booking(&self) -> Option<&Booking> {
        match self {
            Self::AllotmentFinalized(_, b) | Self::Signed(_, b) => Some(b),
            _ => None,
        }
    }

    #[must_use]
    pub const fn permits(&self, action: Action) -> bool {
        matches!(
            (self, action),
            (Self::Pending, Action::Review)
                | (Self::Approved, Action::Allot)
                | (Self::Allotted(_), Action::FinalizeAllotment)
                | (Self::AllotmentFinalized(..), Action::MarkSigned)
        )
    }

    fn require(&self, action: Action) -> Result<()> {
        if self.permits(action) {
            Ok(())
        } else {
            Err(AppError::InvalidTransition {
                action,
                stage: self.kind(),
            })
        }
    }

    /// Reads the flag bag, refusing combinations that skip a step.
    pub fn from_record(record: &DraftRecord) -> std::result::Result<Self, String> {
        let alloted = record.alloted.unwrap_or(false);
        let allotment_done = record.allotment_done.unwrap_or(false);
        let signed = record.signed.unwrap_or(false);

        if signed && !allotment_done {
            return Err("signed without a finalized allotment".to_string());
        }
        if allotment_done && !alloted {
            return Err("allotment finalized without an allotment".to_string());
        }
        if alloted && record.approved != Approval::Approved {
            return Err(format!("alloted while {}", record.approved.as_str()));
        }

        if !alloted {
            return Ok(match record.approved {
                Approval::Pending => Self::Pending,
                Approval::Approved => Self::Approved,
                Approval::Rejected => Self::Rejected,
            });
        }

        let allotment = Allotment {
            unit: present(&record.allot).ok_or("alloted without a unit code")?,
            gift: present(&record.gift).ok_or("alloted without a gift")?,
        };
        if !allotment_done {
            return Ok(Self::Allotted(allotment));
        }

        let booking = Booking {
            mode: present(&record.mode).ok_or("finalized without a payment mode")?,
            area: record.area.ok_or("finalized without an area")?,
            total_cost: record.total_cost.ok_or("finalized without a total cost")?,
            booking_amount: record
                .booking_amount
                .ok_or("finalized without a booking amount")?,
        };
        if signed {
            Ok(Self::Signed(allotment, booking))
        } else {
            Ok(Self::AllotmentFinalized(allotment, booking))
        }
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// ============================================================================
// Transitions
// ============================================================================

/// Partial-update body for `PUT /draft/{ticket_id}`. Each variant carries
/// exactly the fields its transition sets.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TicketUpdate {
    Review {
        approved: Approval,
    },
    Allot {
        alloted: bool,
        allot: String,
        gift: String,
    },
    FinalizeAllotment {
        mode: String,
        area: f64,
        total_cost: f64,
        booking_amount: f64,
        allotment_done: bool,
    },
    Signed {
        signed: bool,
    },
}

/// A validated transition: the body to persist and the stage to adopt once
/// the backend accepts it.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub action: Action,
    pub update: TicketUpdate,
    pub next: Stage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl std::str::FromStr for Decision {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" | "approved" => Ok(Self::Approve),
            "reject" | "rejected" => Ok(Self::Reject),
            other => Err(AppError::validation(format!(
                "decision must be 'approved' or 'rejected', got '{other}'"
            ))),
        }
    }
}

/// Checks the allotment fields on their own, before a ticket is even loaded.
pub fn validate_allotment(unit: &str, gift: &str) -> Result<()> {
    if unit.trim().is_empty() {
        return Err(AppError::validation("unit code is required to allot a ticket"));
    }
    if gift.trim().is_empty() {
        return Err(AppError::validation("gift is required to allot a ticket"));
    }
    Ok(())
}

pub fn validate_booking(booking: &Booking) -> Result<()> {
    if booking.mode.trim().is_empty() {
        return Err(AppError::validation("payment mode is required"));
    }
    if !booking.area.is_finite() || booking.area <= 0.0 {
        return Err(AppError::validation(format!(
            "allotted area must be positive, got {}",
            booking.area
        )));
    }
    for (name, value) in [
        ("total cost", booking.total_cost),
        ("booking amount", booking.booking_amount),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(AppError::validation(format!(
                "{name} must be a non-negative number, got {value}"
            )));
        }
    }
    Ok(())
}

impl Stage {
    pub fn review(&self, decision: Decision) -> Result<Transition> {
        self.require(Action::Review)?;
        let (approved, next) = match decision {
            Decision::Approve => (Approval::Approved, Self::Approved),
            Decision::Reject => (Approval::Rejected, Self::Rejected),
        };
        Ok(Transition {
            action: Action::Review,
            update: TicketUpdate::Review { approved },
            next,
        })
    }

    pub fn allot(&self, unit: &str, gift: &str) -> Result<Transition> {
        self.require(Action::Allot)?;
        validate_allotment(unit, gift)?;
        let allotment = Allotment {
            unit: unit.trim().to_string(),
            gift: gift.trim().to_string(),
        };
        Ok(Transition {
            action: Action::Allot,
            update: TicketUpdate::Allot {
                alloted: true,
                allot: allotment.unit.clone(),
                gift: allotment.gift.clone(),
            },
            next: Self::Allotted(allotment),
        })
    }

    pub fn finalize_allotment(&self, booking: Booking) -> Result<Transition> {
        self.require(Action::FinalizeAllotment)?;
        validate_booking(&booking)?;
        let Self::Allotted(allotment) = self else {
            return Err(AppError::InvalidTransition {
                action: Action::FinalizeAllotment,
                stage: self.kind(),
            });
        };
        Ok(Transition {
            action: Action::FinalizeAllotment,
            update: TicketUpdate::FinalizeAllotment {
                mode: booking.mode.trim().to_string(),
                area: booking.area,
                total_cost: booking.total_cost,
                booking_amount: booking.booking_amount,
                allotment_done: true,
            },
            next: Self::AllotmentFinalized(
                allotment.clone(),
                Booking {
                    mode: booking.mode.trim().to_string(),
                    ..booking
                },
            ),
        })
    }

    pub fn mark_signed(&self) -> Result<Transition> {
        self.require(Action::MarkSigned)?;
        let Self::AllotmentFinalized(allotment, booking) = self else {
            return Err(AppError::InvalidTransition {
                action: Action::MarkSigned,
                stage: self.kind(),
            });
        };
        Ok(Transition {
            action: Action::MarkSigned,
            update: TicketUpdate::Signed { signed: true },
            next: Self::Signed(allotment.clone(), booking.clone()),
        })
    }
}

// ============================================================================
// Persisting transitions
// ============================================================================

/// Applies transitions to tickets, persisting each one before the local
/// ticket changes. Nothing is mutated when validation or the backend fails.
pub struct StateMachine<'a, B: Backend + ?Sized> {
    backend: &'a B,
}

impl<'a, B: Backend + ?Sized> StateMachine<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    pub fn review(&self, ticket: &mut Ticket, decision: Decision) -> Result<()> {
        let transition = ticket.stage.review(decision);
        let transition = self.checked(ticket, transition)?;
        self.commit(ticket, transition)
    }

    pub fn allot(&self, ticket: &mut Ticket, unit: &str, gift: &str) -> Result<()> {
        let transition = ticket.stage.allot(unit, gift);
        let transition = self.checked(ticket, transition)?;
        self.commit(ticket, transition)
    }

    pub fn finalize_allotment(&self, ticket: &mut Ticket, booking: Booking) -> Result<()> {
        let transition = ticket.stage.finalize_allotment(booking);
        let transition = self.checked(ticket, transition)?;
        self.commit(ticket, transition)
    }

    pub fn mark_signed(&self, ticket: &mut Ticket) -> Result<()> {
        let transition = ticket.stage.mark_signed();
        let transition = self.checked(ticket, transition)?;
        self.commit(ticket, transition)
    }

    fn checked(&self, ticket: &Ticket, transition: Result<Transition>) -> Result<Transition> {
        transition.inspect_err(|e| {
            warn!(ticket_id = %ticket.id, stage = %ticket.stage.kind(), error = %e, "Transition refused");
        })
    }

    fn commit(&self, ticket: &mut Ticket, transition: Transition) -> Result<()> {
        self.backend.update_draft(&ticket.id, &transition.update)?;
        let from = ticket.stage.kind();
        ticket.stage = transition.next;
        info!(
            ticket_id = %ticket.id,
            action = %transition.action,
            from = %from,
            to = %ticket.stage.kind(),
            "Transition persisted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allotment() -> Allotment {
        Allotment {
            unit: "Plot-12".into(),
            gift: "Gold Coin".into(),
        }
    }

    fn booking() -> Booking {
        Booking {
            mode: "Online".into(),
            area: 200.0,
            total_cost: 500_000.0,
            booking_amount: 50_000.0,
        }
    }

    #[test]
    fn test_only_one_action_per_stage() {
        let stages = [
            (Stage::Pending, Some(Action::Review)),
            (Stage::Rejected, None),
            (Stage::Approved, Some(Action::Allot)),
            (Stage::Allotted(allotment()), Some(Action::FinalizeAllotment)),
            (
                Stage::AllotmentFinalized(allotment(), booking()),
                Some(Action::MarkSigned),
            ),
            (Stage::Signed(allotment(), booking()), None),
        ];
        let actions = [
            Action::Review,
            Action::Allot,
            Action::FinalizeAllotment,
            Action::MarkSigned,
        ];
        for (stage, allowed) in stages {
            for action in actions {
                assert_eq!(
                    stage.permits(action),
                    allowed == Some(action),
                    "{:?} / {action}",
                    stage.kind()
                );
            }
            assert_eq!(stage.is_terminal(), allowed.is_none());
        }
    }

    #[test]
    fn test_review_cannot_be_repeated() {
        let transition = Stage::Pending.review(Decision::Approve).expect("pending");
        assert_eq!(transition.next, Stage::Approved);
        let err = transition.next.review(Decision::Reject).unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidTransition {
                action: Action::Review,
                stage: StageKind::Approved
            }
        ));
    }

    #[test]
    fn test_allot_requires_both_fields() {
        assert!(matches!(
            Stage::Approved.allot("Plot-1", "  "),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            Stage::Approved.allot("", "Gold Coin"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_allot_rejected_unless_approved() {
        for stage in [Stage::Pending, Stage::Rejected] {
            assert!(matches!(
                stage.allot("Plot-1", "Gold Coin"),
                Err(AppError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn test_finalize_requires_allotment() {
        let err = Stage::Approved.finalize_allotment(booking()).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));

        let transition = Stage::Allotted(allotment())
            .finalize_allotment(booking())
            .expect("allotted");
        assert_eq!(transition.next.booking(), Some(&booking()));
        assert_eq!(transition.next.allotment(), Some(&allotment()));
    }

    #[test]
    fn test_finalize_validates_booking() {
        let mut bad = booking();
        bad.area = 0.0;
        assert!(matches!(
            Stage::Allotted(allotment()).finalize_allotment(bad),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_mark_signed_requires_finalized_allotment() {
        assert!(Stage::Allotted(allotment()).mark_signed().is_err());
        let signed = Stage::AllotmentFinalized(allotment(), booking())
            .mark_signed()
            .expect("finalized");
        assert_eq!(signed.next.kind(), StageKind::Signed);
        assert!(signed.next.mark_signed().is_err());
    }

    #[test]
    fn test_update_bodies_carry_only_their_fields() {
        let review = serde_json::to_value(TicketUpdate::Review {
            approved: Approval::Approved,
        })
        .expect("serializes");
        assert_eq!(review, serde_json::json!({"approved": 1}));

        let allot = Stage::Approved.allot(" Plot-12 ", "Gold Coin").expect("approved");
        assert_eq!(
            serde_json::to_value(&allot.update).expect("serializes"),
            serde_json::json!({"alloted": true, "allot": "Plot-12", "gift": "Gold Coin"})
        );

        let finalize = Stage::Allotted(allotment())
            .finalize_allotment(booking())
            .expect("allotted");
        assert_eq!(
            serde_json::to_value(&finalize.update).expect("serializes"),
            serde_json::json!({
                "mode": "Online",
                "area": 200.0,
                "total_cost": 500000.0,
                "booking_amount": 50000.0,
                "allotment_done": true
            })
        );
    }

    #[test]
    fn test_out_of_order_flags_are_refused() {
        let record = DraftRecord {
            approved: Approval::Approved,
            signed: Some(true),
            ..Default::default()
        };
        assert!(Stage::from_record(&record).is_err());

        let record = DraftRecord {
            approved: Approval::Pending,
            alloted: Some(true),
            allot: Some("Plot-3".into()),
            gift: Some("Voucher".into()),
            ..Default::default()
        };
        let err = Stage::from_record(&record).unwrap_err();
        assert!(err.contains("pending"), "{err}");
    }

    #[test]
    fn test_decision_parsing() {
        assert_eq!("approved".parse::<Decision>().ok(), Some(Decision::Approve));
        assert_eq!("Reject".parse::<Decision>().ok(), Some(Decision::Reject));
        assert!("maybe".parse::<Decision>().is_err());
    }
}
