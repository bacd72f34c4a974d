//! Workflow facade - one handle over every coordination component.

use std::sync::Arc;

use crewline_core::{
    Actor, Assignment, AttendanceKind, AttendanceRecord, BookingEntry, BookingEntryId,
    BookingFilter, BookingPatch, GuardRejected, NewBooking, Property, PropertyId,
    TransitionAux, TransitionRequest, UserId, WorkState, WorkUnit, WorkUnitFilter, WorkUnitId,
};
use crewline_storage::{Result as StorageResult, Storage};

use crate::assignment::{AssignOutcome, AssignRequest, AssignmentManager};
use crate::attendance::{AttendanceReceipt, AttendanceSynchronizer, SyncOutcome};
use crate::engine::TransitionEngine;
use crate::error::{ReconcileError, TransitionError};
use crate::reconciler::BookingReconciler;

/// Cleaning job coordination over a single store.
pub struct Workflow {
    storage: Arc<dyn Storage>,
    engine: Arc<TransitionEngine>,
    attendance: AttendanceSynchronizer,
    reconciler: BookingReconciler,
    assignments: AssignmentManager,
}

impl Workflow {
    /// Create a workflow that sends no notifications.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        let engine = TransitionEngine::new(storage.clone());
        Self::with_engine(storage, engine)
    }

    /// Create a workflow around a configured engine.
    pub fn with_engine(storage: Arc<dyn Storage>, engine: TransitionEngine) -> Self {
        let engine = Arc::new(engine);
        Self {
            attendance: AttendanceSynchronizer::new(storage.clone(), engine.clone()),
            reconciler: BookingReconciler::new(storage.clone()),
            assignments: AssignmentManager::new(storage.clone(), engine.clone()),
            engine,
            storage,
        }
    }

    /// The underlying store.
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    // === Transitions ===

    /// Apply a transition as requested.
    pub async fn transition(&self, request: TransitionRequest) -> Result<WorkUnit, TransitionError> {
        self.engine.transition(request).await
    }

    /// Reload the unit and transition it from its current state.
    ///
    /// With `expected` set, the call fails with `StaleState` when the stored
    /// state differs from what the caller last saw.
    pub async fn advance(
        &self,
        work_unit_id: WorkUnitId,
        expected: Option<WorkState>,
        to: WorkState,
        actor: Actor,
        aux: TransitionAux,
    ) -> Result<WorkUnit, TransitionError> {
        let unit = self
            .storage
            .load_work_unit(work_unit_id)
            .await?
            .ok_or(TransitionError::NotFound(work_unit_id))?;

        if let Some(expected) = expected {
            if expected != unit.state {
                return Err(GuardRejected::StaleState {
                    expected,
                    actual: unit.state,
                }
                .into());
            }
        }

        let request = TransitionRequest::new(work_unit_id, unit.state, to, actor).with_aux(aux);
        self.engine.transition(request).await
    }

    // === Bookings ===

    /// Declare a booking and derive its units.
    pub async fn create_booking(
        &self,
        actor: &Actor,
        input: NewBooking,
    ) -> Result<BookingEntry, ReconcileError> {
        self.reconciler.create_booking(actor, input).await
    }

    /// Edit a booking and reconcile its units.
    pub async fn apply_booking_edit(
        &self,
        entry_id: BookingEntryId,
        patch: BookingPatch,
        actor: &Actor,
    ) -> Result<BookingEntry, ReconcileError> {
        self.reconciler.apply_booking_edit(entry_id, patch, actor).await
    }

    /// Delete a booking with all its units.
    pub async fn delete_booking(
        &self,
        entry_id: BookingEntryId,
        actor: &Actor,
    ) -> Result<usize, ReconcileError> {
        self.reconciler.delete_booking(entry_id, actor).await
    }

    // === Crew ===

    /// Assign crew to a unit.
    pub async fn assign(
        &self,
        request: AssignRequest,
        actor: &Actor,
    ) -> Result<AssignOutcome, TransitionError> {
        self.assignments.assign(request, actor).await
    }

    /// Remove one crew member from a unit.
    pub async fn unassign(
        &self,
        work_unit_id: WorkUnitId,
        crew_id: &UserId,
        actor: &Actor,
    ) -> Result<WorkUnit, TransitionError> {
        self.assignments.unassign(work_unit_id, crew_id, actor).await
    }

    // === Attendance ===

    /// Record a check-in or check-out.
    pub async fn record_attendance(
        &self,
        work_unit_id: WorkUnitId,
        actor: &Actor,
        kind: AttendanceKind,
    ) -> Result<AttendanceReceipt, TransitionError> {
        self.attendance
            .record_attendance(work_unit_id, actor, kind)
            .await
    }

    /// Bring a unit's state in line with its attendance log.
    pub async fn resync(&self, work_unit_id: WorkUnitId) -> Result<SyncOutcome, TransitionError> {
        self.attendance.resync(work_unit_id).await
    }

    // === Reads ===

    /// Save a property.
    pub async fn save_property(&self, property: &Property) -> StorageResult<()> {
        self.storage.save_property(property).await
    }

    /// Load a property.
    pub async fn property(&self, id: &PropertyId) -> StorageResult<Option<Property>> {
        self.storage.load_property(id).await
    }

    /// Load a work unit.
    pub async fn work_unit(&self, id: WorkUnitId) -> StorageResult<Option<WorkUnit>> {
        self.storage.load_work_unit(id).await
    }

    /// Load a booking entry.
    pub async fn booking(&self, id: BookingEntryId) -> StorageResult<Option<BookingEntry>> {
        self.storage.load_booking(id).await
    }

    /// Units derived from a booking.
    pub async fn work_units_for_booking(&self, id: BookingEntryId) -> StorageResult<Vec<WorkUnit>> {
        self.storage
            .list_work_units(&WorkUnitFilter::for_booking(id))
            .await
    }

    /// Units at a property.
    pub async fn work_units_for_property(&self, id: &PropertyId) -> StorageResult<Vec<WorkUnit>> {
        self.storage
            .list_work_units(&WorkUnitFilter {
                property_id: Some(id.clone()),
                ..Default::default()
            })
            .await
    }

    /// Units a crew member is currently assigned to.
    pub async fn work_units_for_crew(&self, crew_id: &UserId) -> StorageResult<Vec<WorkUnit>> {
        self.storage
            .list_work_units(&WorkUnitFilter {
                crew_id: Some(crew_id.clone()),
                ..Default::default()
            })
            .await
    }

    /// Units currently in `state`.
    pub async fn work_units_in_state(&self, state: WorkState) -> StorageResult<Vec<WorkUnit>> {
        self.storage
            .list_work_units(&WorkUnitFilter {
                states: Some(vec![state]),
                ..Default::default()
            })
            .await
    }

    /// Bookings declared for a property.
    pub async fn bookings_for_property(&self, id: &PropertyId) -> StorageResult<Vec<BookingEntry>> {
        self.storage
            .list_bookings(&BookingFilter {
                property_id: Some(id.clone()),
                ..Default::default()
            })
            .await
    }

    /// Assignment rows of a unit, oldest first.
    pub async fn assignments(&self, work_unit_id: WorkUnitId) -> StorageResult<Vec<Assignment>> {
        self.storage.list_assignments(work_unit_id).await
    }

    /// Full attendance log of a unit.
    pub async fn attendance(&self, work_unit_id: WorkUnitId) -> StorageResult<Vec<AttendanceRecord>> {
        self.storage.list_attendance(work_unit_id).await
    }
}
