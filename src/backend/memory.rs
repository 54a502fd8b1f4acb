use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{Attachment, Backend, DraftFilter, Notice};
use crate::error::BackendError;
use crate::lifecycle::TicketUpdate;
use crate::ticket::{DraftRecord, TicketId};

/// A request the in-memory backend has seen, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    List(DraftFilter),
    Update(TicketId, TicketUpdate),
    Send(Notice, Attachment),
}

/// Backend held in process memory. Applies updates the way the server does:
/// field by field, without checking lifecycle ordering.
#[derive(Default)]
pub struct MemoryBackend {
    drafts: Mutex<BTreeMap<TicketId, DraftRecord>>,
    calls: Mutex<Vec<RecordedCall>>,
    failures: Mutex<Vec<BackendError>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_drafts(drafts: impl IntoIterator<Item = DraftRecord>) -> Self {
        let backend = Self::new();
        for draft in drafts {
            backend.insert(draft);
        }
        backend
    }

    pub fn insert(&self, draft: DraftRecord) {
        lock(&self.drafts).insert(draft.ticket_id.clone(), draft);
    }

    #[must_use]
    pub fn draft(&self, ticket_id: &TicketId) -> Option<DraftRecord> {
        lock(&self.drafts).get(ticket_id).cloned()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Number of requests that would have changed backend state.
    #[must_use]
    pub fn write_count(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| !matches!(call, RecordedCall::List(_)))
            .count()
    }

    /// Makes the next request fail with `error`. Queued failures are used in order.
    pub fn fail_next(&self, error: BackendError) {
        lock(&self.failures).push(error);
    }

    fn take_failure(&self) -> Result<(), BackendError> {
        let mut failures = lock(&self.failures);
        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures.remove(0))
        }
    }
}

fn apply(record: &mut DraftRecord, update: &TicketUpdate) {
    match update {
        TicketUpdate::Review { approved } => record.approved = *approved,
        TicketUpdate::Allot {
            alloted,
            allot,
            gift,
        } => {
            record.alloted = Some(*alloted);
            record.allot = Some(allot.clone());
            record.gift = Some(gift.clone());
        }
        TicketUpdate::FinalizeAllotment {
            mode,
            area,
            total_cost,
            booking_amount,
            allotment_done,
        } => {
            record.mode = Some(mode.clone());
            record.area = Some(*area);
            record.total_cost = Some(*total_cost);
            record.booking_amount = Some(*booking_amount);
            record.allotment_done = Some(*allotment_done);
        }
        TicketUpdate::Signed { signed } => record.signed = Some(*signed),
    }
}

impl Backend for MemoryBackend {
    fn list_drafts(&self, filter: &DraftFilter) -> Result<Vec<DraftRecord>, BackendError> {
        lock(&self.calls).push(RecordedCall::List(filter.clone()));
        self.take_failure()?;
        Ok(lock(&self.drafts)
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }

    fn update_draft(
        &self,
        ticket_id: &TicketId,
        update: &TicketUpdate,
    ) -> Result<(), BackendError> {
        lock(&self.calls).push(RecordedCall::Update(ticket_id.clone(), update.clone()));
        self.take_failure()?;
        let mut drafts = lock(&self.drafts);
        let record = drafts
            .get_mut(ticket_id)
            .ok_or_else(|| BackendError::NotFound(ticket_id.to_string()))?;
        apply(record, update);
        Ok(())
    }

    fn send_document(&self, notice: Notice, attachment: &Attachment) -> Result<(), BackendError> {
        lock(&self.calls).push(RecordedCall::Send(notice, attachment.clone()));
        self.take_failure()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::Approval;

    fn draft(id: &str) -> DraftRecord {
        DraftRecord {
            ticket_id: TicketId::new(id),
            name: Some("Amit".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_update_is_applied_field_by_field() {
        let backend = MemoryBackend::with_drafts([draft("T-1")]);
        let id = TicketId::new("T-1");
        backend
            .update_draft(
                &id,
                &TicketUpdate::Review {
                    approved: Approval::Approved,
                },
            )
            .expect("update succeeds");
        assert_eq!(backend.draft(&id).map(|d| d.approved), Some(Approval::Approved));
        assert_eq!(backend.write_count(), 1);
    }

    #[test]
    fn test_queued_failure_leaves_record_untouched() {
        let backend = MemoryBackend::with_drafts([draft("T-1")]);
        let id = TicketId::new("T-1");
        backend.fail_next(BackendError::Status {
            status: 422,
            message: "invalid".into(),
        });
        let result = backend.update_draft(&id, &TicketUpdate::Signed { signed: true });
        assert!(matches!(result, Err(BackendError::Status { status: 422, .. })));
        assert_eq!(backend.draft(&id).and_then(|d| d.signed), None);
    }

    #[test]
    fn test_unknown_ticket_is_not_found() {
        let backend = MemoryBackend::new();
        let result =
            backend.update_draft(&TicketId::new("nope"), &TicketUpdate::Signed { signed: true });
        assert_eq!(result, Err(BackendError::NotFound("nope".into())));
    }
}
