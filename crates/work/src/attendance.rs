//! Attendance-driven state synchronisation.
//!
//! Crew check-ins and check-outs are appended to an immutable log. After each
//! append the unit's state is pulled forward to match what the log says:
//! the first check-in starts an accepted unit, and the last check-out
//! completes it. The log is always re-read in full so a retried or duplicate
//! call converges on the same state.

use std::sync::Arc;

use crewline_core::{
    all_checked_out, Actor, AttendanceKind, AttendanceRecord, Guard, GuardRejected, Role,
    TransitionRequest, WorkState, WorkUnit, WorkUnitId,
};
use crewline_storage::Storage;
use tracing::{debug, info, warn};

use crate::engine::TransitionEngine;
use crate::error::TransitionError;

/// What synchronisation did to the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// State already matched the log
    Unchanged,
    /// Moved to `in_progress`
    Started,
    /// Moved to `completed`
    Completed,
}

/// A stored attendance record plus the effect it had.
#[derive(Debug, Clone)]
pub struct AttendanceReceipt {
    /// The appended record
    pub record: AttendanceRecord,
    /// State change it caused, if any
    pub outcome: SyncOutcome,
}

/// Keeps unit state in line with the attendance log.
pub struct AttendanceSynchronizer {
    storage: Arc<dyn Storage>,
    engine: Arc<TransitionEngine>,
}

impl AttendanceSynchronizer {
    /// Create a synchronizer.
    pub fn new(storage: Arc<dyn Storage>, engine: Arc<TransitionEngine>) -> Self {
        Self { storage, engine }
    }

    /// Append a check-in or check-out and advance the unit if warranted.
    ///
    /// Only crew assigned to the unit may record attendance.
    ///
    /// Only the append can fail the call. Anything that goes wrong while
    /// advancing the unit is logged and reported as `Unchanged`; `resync`
    /// repairs it later.
    pub async fn record_attendance(
        &self,
        work_unit_id: WorkUnitId,
        actor: &Actor,
        kind: AttendanceKind,
    ) -> Result<AttendanceReceipt, TransitionError> {
        if actor.role != Role::Crew {
            return Err(GuardRejected::RoleNotPermitted {
                role: actor.role,
                operation: "record attendance",
            }
            .into());
        }

        let unit = self.load(work_unit_id).await?;
        Guard::check_membership(actor, &unit.assigned_crew_ids)?;

        let record = AttendanceRecord::new(work_unit_id, actor.user_id.clone(), kind);
        self.storage.append_attendance(&record).await?;
        debug!(unit = %work_unit_id, crew = %actor.user_id, kind = %kind, "attendance recorded");

        let synced = match kind {
            AttendanceKind::CheckIn => self.on_check_in(work_unit_id).await,
            AttendanceKind::CheckOut => self.evaluate_check_out(work_unit_id).await,
        };

        let outcome = synced.unwrap_or_else(|e| {
            warn!(unit = %work_unit_id, kind = %kind, error = %e, "attendance sync failed");
            SyncOutcome::Unchanged
        });

        Ok(AttendanceReceipt { record, outcome })
    }

    /// Re-run the check-out evaluation without writing a record.
    pub async fn resync(&self, work_unit_id: WorkUnitId) -> Result<SyncOutcome, TransitionError> {
        self.evaluate_check_out(work_unit_id).await
    }

    async fn on_check_in(&self, work_unit_id: WorkUnitId) -> Result<SyncOutcome, TransitionError> {
        let unit = self.load(work_unit_id).await?;
        if unit.state != WorkState::Accepted {
            return Ok(SyncOutcome::Unchanged);
        }
        self.advance(&unit, WorkState::Accepted, WorkState::InProgress)
            .await?;
        Ok(SyncOutcome::Started)
    }

    async fn evaluate_check_out(&self, work_unit_id: WorkUnitId) -> Result<SyncOutcome, TransitionError> {
        let unit = self.load(work_unit_id).await?;
        let log = self.storage.list_attendance(work_unit_id).await?;

        if !all_checked_out(&log, &unit.assigned_crew_ids) {
            return Ok(SyncOutcome::Unchanged);
        }

        match unit.state {
            WorkState::Accepted => {
                // Nobody checked in first; walk both edges
                if let Err(e) = self
                    .advance(&unit, WorkState::Accepted, WorkState::InProgress)
                    .await
                {
                    warn!(unit = %work_unit_id, error = %e, "could not start unit, skipping completion");
                    return Err(e);
                }
                match self
                    .advance(&unit, WorkState::InProgress, WorkState::Completed)
                    .await
                {
                    Ok(_) => Ok(SyncOutcome::Completed),
                    Err(e) => {
                        warn!(unit = %work_unit_id, error = %e, "unit started but not completed");
                        Ok(SyncOutcome::Started)
                    }
                }
            }
            WorkState::InProgress => {
                self.advance(&unit, WorkState::InProgress, WorkState::Completed)
                    .await?;
                Ok(SyncOutcome::Completed)
            }
            _ => Ok(SyncOutcome::Unchanged),
        }
    }

    async fn advance(
        &self,
        unit: &WorkUnit,
        from: WorkState,
        to: WorkState,
    ) -> Result<WorkUnit, TransitionError> {
        let request = TransitionRequest::new(unit.id, from, to, Actor::system());
        let next = self.engine.transition(request).await?;
        info!(unit = %unit.id, from = %from, to = %to, "attendance advanced work unit");
        Ok(next)
    }

    async fn load(&self, work_unit_id: WorkUnitId) -> Result<WorkUnit, TransitionError> {
        self.storage
            .load_work_unit(work_unit_id)
            .await?
            .ok_or(TransitionError::NotFound(work_unit_id))
    }
}
