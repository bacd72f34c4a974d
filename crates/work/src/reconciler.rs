//! Booking reconciler - keeps derived work units in step with their booking.
//!
//! Editing a booking's work dates is a diff over dates:
//! ```text
//! added   = desired - current   → insert draft units
//! removed = current - desired   → delete units (draft/open only)
//! ```
//! Each forward write is preceded by its undo step so a mid-way failure
//! leaves the booking and its units as they were.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use crewline_core::{
    Actor, BookingEntry, BookingEntryId, BookingPatch, NewBooking, Role, WorkUnit, WorkUnitFilter,
    WorkUnitId,
};
use crewline_storage::Storage;
use tracing::{debug, info, warn};

use crate::error::ReconcileError;
use crate::saga::{Compensation, CompensationLog};

/// Creates, edits and deletes bookings together with their work units.
pub struct BookingReconciler {
    storage: Arc<dyn Storage>,
}

impl BookingReconciler {
    /// Create a reconciler.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Declare a booking and derive one draft unit per work date.
    pub async fn create_booking(
        &self,
        actor: &Actor,
        input: NewBooking,
    ) -> Result<BookingEntry, ReconcileError> {
        authorize(actor)?;
        let entry = BookingEntry::create(input, actor.user_id.clone())?;

        self.storage.insert_booking(&entry).await?;

        let mut log = CompensationLog::new();
        log.record(Compensation::DeleteBooking(entry.id));

        for date in &entry.work_dates {
            let unit = WorkUnit::derive(&entry, *date);
            log.record(Compensation::DeleteUnit(unit.id));
            if let Err(e) = self.storage.insert_work_unit(&unit).await {
                warn!(booking = %entry.id, date = %date, error = %e, "unit insert failed, rolling back booking");
                log.unwind(self.storage.as_ref()).await;
                return Err(ReconcileError::CreateFailed { source: e });
            }
        }

        info!(
            booking = %entry.id,
            property = %entry.property_id,
            units = entry.work_dates.len(),
            "booking created"
        );
        Ok(entry)
    }

    /// Apply an edit to a booking and reconcile its units.
    ///
    /// Units are only added or removed when the patch carries `work_dates`.
    /// Removing a date whose unit has progressed past `open` is refused
    /// before anything is written.
    pub async fn apply_booking_edit(
        &self,
        entry_id: BookingEntryId,
        patch: BookingPatch,
        actor: &Actor,
    ) -> Result<BookingEntry, ReconcileError> {
        authorize(actor)?;

        // 1. Load entry and derived units
        let current = self
            .storage
            .load_booking(entry_id)
            .await?
            .ok_or(ReconcileError::NotFound(entry_id))?;
        let units = self
            .storage
            .list_work_units(&WorkUnitFilter::for_booking(entry_id))
            .await?;
        let next = patch.apply_to(&current)?;

        // 2. Diff dates
        let (added, removed_units) = if patch.work_dates.is_some() {
            let existing: BTreeSet<NaiveDate> = units.iter().map(|u| u.work_date).collect();
            let added: Vec<NaiveDate> = next.work_dates.difference(&existing).copied().collect();
            let removed: Vec<WorkUnit> = units
                .iter()
                .filter(|u| !next.work_dates.contains(&u.work_date))
                .cloned()
                .collect();
            (added, removed)
        } else {
            (Vec::new(), Vec::new())
        };

        let removed: Vec<NaiveDate> = removed_units.iter().map(|u| u.work_date).collect();
        debug!(booking = %entry_id, added = ?added, removed = ?removed, "work date diff");

        // 3. Refuse to drop work that is under way
        let blocking: BTreeSet<NaiveDate> = removed_units
            .iter()
            .filter(|u| !u.state.is_deletable())
            .map(|u| u.work_date)
            .collect();
        if !blocking.is_empty() {
            info!(booking = %entry_id, dates = ?blocking, "edit refused, units in progress");
            return Err(ReconcileError::UnitsInProgress {
                dates: blocking.into_iter().collect(),
            });
        }

        // 4. Persist the entry
        self.storage.save_booking(&next).await?;

        let mut log = CompensationLog::new();
        log.record(Compensation::RestoreBooking(current.clone()));

        // 5. New units
        for date in &added {
            let unit = WorkUnit::derive(&next, *date);
            log.record(Compensation::DeleteUnit(unit.id));
            if let Err(e) = self.storage.insert_work_unit(&unit).await {
                warn!(booking = %entry_id, date = %date, error = %e, "unit insert failed, rolling back edit");
                log.unwind(self.storage.as_ref()).await;
                return Err(ReconcileError::CreateFailed { source: e });
            }
        }

        // 6. Dropped units
        for unit in &removed_units {
            log.record(Compensation::RestoreUnit(unit.clone()));
            if let Err(e) = self.storage.delete_work_unit(unit.id).await {
                warn!(booking = %entry_id, unit = %unit.id, error = %e, "unit delete failed, rolling back edit");
                log.unwind(self.storage.as_ref()).await;
                return Err(ReconcileError::RemoveFailed { source: e });
            }
        }
        for unit in &removed_units {
            self.purge_assignments(unit.id).await;
        }

        // 7. Copy changed fields onto the units that stay
        if patch.touches_unit_fields() {
            let fields = next.unit_fields();
            for unit in units
                .iter()
                .filter(|u| !removed_units.iter().any(|r| r.id == u.id))
            {
                if let Err(e) = self.storage.update_work_unit(unit.id, &fields).await {
                    warn!(booking = %entry_id, unit = %unit.id, error = %e, "could not copy booking fields to unit");
                }
            }
        }

        info!(
            booking = %entry_id,
            added = added.len(),
            removed = removed_units.len(),
            "booking reconciled"
        );
        Ok(next)
    }

    /// Delete a booking and every unit derived from it.
    ///
    /// Unlike an edit, this removes units in any state. A failure part way
    /// leaves the entry in place; calling again finishes the job.
    /// Returns the number of units removed.
    pub async fn delete_booking(
        &self,
        entry_id: BookingEntryId,
        actor: &Actor,
    ) -> Result<usize, ReconcileError> {
        authorize(actor)?;

        let entry = self
            .storage
            .load_booking(entry_id)
            .await?
            .ok_or(ReconcileError::NotFound(entry_id))?;
        let units = self
            .storage
            .list_work_units(&WorkUnitFilter::for_booking(entry_id))
            .await?;

        for unit in &units {
            if !unit.state.is_deletable() {
                warn!(
                    booking = %entry_id,
                    unit = %unit.id,
                    state = %unit.state,
                    "deleting unit that is already under way"
                );
            }
            self.storage.delete_work_unit(unit.id).await?;
            self.purge_assignments(unit.id).await;
        }

        self.storage.delete_booking(entry.id).await?;

        info!(booking = %entry_id, units = units.len(), "booking deleted");
        Ok(units.len())
    }

    /// Drop assignment rows of a deleted unit. Attendance stays as history.
    async fn purge_assignments(&self, unit_id: WorkUnitId) {
        match self.storage.delete_assignments_for_unit(unit_id).await {
            Ok(0) => {}
            Ok(n) => debug!(unit = %unit_id, rows = n, "assignments purged"),
            Err(e) => warn!(unit = %unit_id, error = %e, "could not purge assignments"),
        }
    }
}

fn authorize(actor: &Actor) -> Result<(), ReconcileError> {
    match actor.role {
        Role::Owner | Role::Manager => Ok(()),
        other => Err(ReconcileError::Forbidden(other)),
    }
}
