//! Compensation log for multi-step writes.
//!
//! The store only guarantees single-entity atomicity, so operations that
//! touch several records record an undo step before each forward write and
//! unwind them in reverse order when a later write fails. The log lives for
//! one call only and is never persisted.

use crewline_core::{Assignment, AssignmentId, BookingEntry, BookingEntryId, WorkUnit, WorkUnitId};
use crewline_storage::{Storage, StorageError};
use tracing::{debug, error, warn};

/// One undo step.
#[derive(Debug, Clone)]
pub enum Compensation {
    /// Put a booking back to an earlier snapshot
    RestoreBooking(BookingEntry),
    /// Remove a booking that was inserted
    DeleteBooking(BookingEntryId),
    /// Remove a unit that was (or may have been) inserted
    DeleteUnit(WorkUnitId),
    /// Re-insert a unit that was (or may have been) deleted
    RestoreUnit(WorkUnit),
    /// Remove an assignment row that was (or may have been) inserted
    DeleteAssignment(AssignmentId),
    /// Re-insert an assignment row that was (or may have been) deleted
    RestoreAssignment(Assignment),
}

/// Undo steps recorded during one call.
#[derive(Debug, Default)]
pub struct CompensationLog {
    steps: Vec<Compensation>,
}

impl CompensationLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an undo step. Call before the forward write it undoes.
    pub fn record(&mut self, step: Compensation) {
        self.steps.push(step);
    }

    /// Number of recorded steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in reverse order.
    ///
    /// A failing step is logged and the rest still run. Returns the number
    /// of steps that failed; non-zero means the store needs attention.
    pub async fn unwind(self, storage: &dyn Storage) -> usize {
        let total = self.steps.len();
        let mut failed = 0;
        for step in self.steps.into_iter().rev() {
            if let Err(e) = apply(storage, &step).await {
                error!(step = ?step, error = %e, "compensation step failed");
                failed += 1;
            }
        }
        if failed == 0 {
            debug!(steps = total, "compensation complete");
        } else {
            warn!(steps = total, failed, "compensation incomplete");
        }
        failed
    }
}

async fn apply(storage: &dyn Storage, step: &Compensation) -> Result<(), StorageError> {
    match step {
        Compensation::RestoreBooking(entry) => storage.save_booking(entry).await,
        Compensation::DeleteBooking(id) => storage.delete_booking(*id).await,
        Compensation::DeleteUnit(id) => storage.delete_work_unit(*id).await,
        Compensation::RestoreUnit(unit) => ignore_conflict(storage.insert_work_unit(unit).await),
        Compensation::DeleteAssignment(id) => storage.delete_assignment(*id).await,
        Compensation::RestoreAssignment(row) => {
            ignore_conflict(storage.insert_assignment(row).await)
        }
    }
}

/// A restore whose forward delete never happened finds the record in place.
fn ignore_conflict(result: Result<(), StorageError>) -> Result<(), StorageError> {
    match result {
        Err(StorageError::Conflict(_)) => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crewline_core::{NewBooking, PropertyId, WorkUnitFilter};
    use crewline_storage::MemoryStorage;
    use std::collections::BTreeSet;

    fn entry() -> BookingEntry {
        BookingEntry::create(
            NewBooking {
                property_id: PropertyId::new("loft"),
                stay_start: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
                stay_end: NaiveDate::from_ymd_opt(2025, 7, 3).unwrap(),
                occupant_count: 2,
                owner_remark: String::new(),
                work_dates: BTreeSet::new(),
            },
            "owner".into(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_unwind_runs_in_reverse() {
        let storage = MemoryStorage::new();
        let original = entry();
        storage.insert_booking(&original).await.unwrap();

        let mut log = CompensationLog::new();
        let mut edited = original.clone();
        edited.occupant_count = 9;
        log.record(Compensation::RestoreBooking(original.clone()));
        storage.save_booking(&edited).await.unwrap();

        let unit = WorkUnit::derive(&edited, edited.stay_end);
        log.record(Compensation::DeleteUnit(unit.id));
        storage.insert_work_unit(&unit).await.unwrap();

        assert_eq!(log.len(), 2);
        assert_eq!(log.unwind(&storage).await, 0);

        assert_eq!(storage.load_booking(original.id).await.unwrap(), Some(original.clone()));
        assert!(storage
            .list_work_units(&WorkUnitFilter::for_booking(original.id))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_restore_of_undeleted_unit_is_harmless() {
        let storage = MemoryStorage::new();
        let unit = WorkUnit::derive(&entry(), NaiveDate::from_ymd_opt(2025, 7, 3).unwrap());
        storage.insert_work_unit(&unit).await.unwrap();

        let mut log = CompensationLog::new();
        log.record(Compensation::RestoreUnit(unit.clone()));
        // forward delete never ran
        assert_eq!(log.unwind(&storage).await, 0);
        assert_eq!(storage.load_work_unit(unit.id).await.unwrap(), Some(unit));
    }

    #[tokio::test]
    async fn test_failed_step_is_counted() {
        let storage = MemoryStorage::new();
        let mut log = CompensationLog::new();
        // restoring a booking that no longer exists fails with NotFound
        log.record(Compensation::RestoreBooking(entry()));
        assert_eq!(log.unwind(&storage).await, 1);
    }
}
