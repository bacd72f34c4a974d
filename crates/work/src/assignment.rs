//! Crew assignment.
//!
//! Assignment rows and the unit's crew field are kept together: the rows are
//! written first, then the unit either transitions `open → assigned` through
//! the engine or, when it is already past `open`, gets a membership-only
//! update. A failure after rows were written unwinds them.

use std::sync::Arc;

use crewline_core::{
    ordered_set, Actor, Assignment, GuardRejected, Role, TransitionAux, TransitionRequest, UserId,
    WorkState, WorkUnit, WorkUnitId, WorkUnitPatch,
};
use crewline_notify::TransitionEvent;
use crewline_storage::Storage;
use tracing::{debug, info, warn};

use crate::engine::TransitionEngine;
use crate::error::TransitionError;
use crate::saga::{Compensation, CompensationLog};

/// Request to put crew on a unit.
#[derive(Debug, Clone)]
pub struct AssignRequest {
    /// Target unit
    pub work_unit_id: WorkUnitId,
    /// Crew to assign; duplicates are ignored
    pub crew_ids: Vec<UserId>,
    /// Note stored on every new assignment row
    pub remark: Option<String>,
    /// Replace the current crew instead of adding to it
    pub replace: bool,
}

impl AssignRequest {
    /// Add `crew_ids` to whatever is already assigned.
    pub fn append(work_unit_id: WorkUnitId, crew_ids: Vec<UserId>) -> Self {
        Self {
            work_unit_id,
            crew_ids,
            remark: None,
            replace: false,
        }
    }

    /// Make `crew_ids` the whole crew.
    pub fn replace(work_unit_id: WorkUnitId, crew_ids: Vec<UserId>) -> Self {
        Self {
            replace: true,
            ..Self::append(work_unit_id, crew_ids)
        }
    }

    /// Attach a remark.
    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = Some(remark.into());
        self
    }
}

/// Result of an assignment.
#[derive(Debug, Clone)]
pub struct AssignOutcome {
    /// The unit after the update
    pub unit: WorkUnit,
    /// Crew that were not on the unit before
    pub added: Vec<UserId>,
    /// Whether the unit moved `open → assigned`
    pub transitioned: bool,
}

/// Manages crew membership of work units.
pub struct AssignmentManager {
    storage: Arc<dyn Storage>,
    engine: Arc<TransitionEngine>,
}

impl AssignmentManager {
    /// Create an assignment manager.
    pub fn new(storage: Arc<dyn Storage>, engine: Arc<TransitionEngine>) -> Self {
        Self { storage, engine }
    }

    /// Assign crew to a unit.
    pub async fn assign(
        &self,
        request: AssignRequest,
        actor: &Actor,
    ) -> Result<AssignOutcome, TransitionError> {
        require_manager(actor, "assign crew")?;

        let crew = ordered_set(request.crew_ids);
        if crew.is_empty() {
            return Err(TransitionError::Invalid(
                "crew set must not be empty".to_string(),
            ));
        }

        let id = request.work_unit_id;
        let unit = self
            .storage
            .load_work_unit(id)
            .await?
            .ok_or(TransitionError::NotFound(id))?;
        if unit.state == WorkState::Draft {
            return Err(GuardRejected::UnitNotOpen { state: unit.state }.into());
        }

        let mut log = CompensationLog::new();

        // Rows first
        let existing = self.storage.list_assignments(id).await?;
        let added: Vec<UserId> = crew
            .iter()
            .filter(|c| !unit.is_assigned(c))
            .cloned()
            .collect();
        let (effective, to_insert) = if request.replace {
            for row in existing {
                let row_id = row.id;
                log.record(Compensation::RestoreAssignment(row));
                if let Err(e) = self.storage.delete_assignment(row_id).await {
                    return Err(self.abort(log, id, e.into()).await);
                }
            }
            (crew.clone(), crew)
        } else {
            // Rows are matched on their own, not on the unit's crew field
            let to_insert: Vec<UserId> = crew
                .into_iter()
                .filter(|c| !existing.iter().any(|row| &row.crew_id == c))
                .collect();
            let effective = ordered_set(
                unit.assigned_crew_ids
                    .iter()
                    .cloned()
                    .chain(added.iter().cloned()),
            );
            (effective, to_insert)
        };

        for crew_id in &to_insert {
            let row = Assignment::new(
                id,
                crew_id.clone(),
                actor.user_id.clone(),
                request.remark.clone(),
            );
            log.record(Compensation::DeleteAssignment(row.id));
            if let Err(e) = self.storage.insert_assignment(&row).await {
                return Err(self.abort(log, id, e.into()).await);
            }
        }

        // Then the unit
        let forced = TransitionRequest::new(id, unit.state, WorkState::Assigned, actor.clone())
            .with_aux(TransitionAux::crew(effective.clone()));

        let (updated, transitioned) = match self.engine.transition(forced).await {
            Ok(updated) => (updated, true),
            Err(TransitionError::Guard(rejected)) => {
                debug!(unit = %id, state = %unit.state, reason = %rejected, "membership-only assignment");
                let patch = WorkUnitPatch {
                    assigned_crew_ids: Some(effective.clone()),
                    ..Default::default()
                };
                let updated = match self.storage.update_work_unit(id, &patch).await {
                    Ok(updated) => updated,
                    Err(e) => {
                        return Err(self
                            .abort(log, id, TransitionError::from_storage(id, e))
                            .await)
                    }
                };
                if !added.is_empty() {
                    self.engine
                        .notify(TransitionEvent {
                            unit: updated.clone(),
                            from: unit.state,
                            to: WorkState::Assigned,
                            actor: actor.clone(),
                            aux: TransitionAux::crew(added.clone()),
                        })
                        .await;
                }
                (updated, false)
            }
            Err(e) => return Err(self.abort(log, id, e).await),
        };

        info!(
            unit = %id,
            crew = ?updated.assigned_crew_ids,
            added = added.len(),
            replace = request.replace,
            "crew assigned"
        );

        Ok(AssignOutcome {
            unit: updated,
            added,
            transitioned,
        })
    }

    /// Take one crew member off a unit. The unit's state is left alone.
    pub async fn unassign(
        &self,
        work_unit_id: WorkUnitId,
        crew_id: &UserId,
        actor: &Actor,
    ) -> Result<WorkUnit, TransitionError> {
        require_manager(actor, "unassign crew")?;

        let unit = self
            .storage
            .load_work_unit(work_unit_id)
            .await?
            .ok_or(TransitionError::NotFound(work_unit_id))?;

        let would_empty = unit.assigned_crew_ids.iter().all(|c| c == crew_id);
        if would_empty && unit.state.needs_crew() {
            return Err(TransitionError::Invalid(format!(
                "cannot remove the last crew member from a unit that is {}",
                unit.state
            )));
        }

        for row in self.storage.list_assignments(work_unit_id).await? {
            if &row.crew_id == crew_id {
                self.storage.delete_assignment(row.id).await?;
            }
        }

        let patch = WorkUnitPatch {
            removed_crew: Some(crew_id.clone()),
            ..Default::default()
        };
        let updated = self
            .storage
            .update_work_unit(work_unit_id, &patch)
            .await
            .map_err(|e| TransitionError::from_storage(work_unit_id, e))?;

        info!(unit = %work_unit_id, crew = %crew_id, "crew unassigned");
        Ok(updated)
    }

    /// Undo recorded row changes and hand back the error that caused it.
    async fn abort(
        &self,
        log: CompensationLog,
        work_unit_id: WorkUnitId,
        error: TransitionError,
    ) -> TransitionError {
        warn!(unit = %work_unit_id, error = %error, "assignment failed, restoring previous crew rows");
        log.unwind(self.storage.as_ref()).await;
        error
    }
}

fn require_manager(actor: &Actor, operation: &'static str) -> Result<(), GuardRejected> {
    if actor.role == Role::Manager {
        Ok(())
    } else {
        Err(GuardRejected::RoleNotPermitted {
            role: actor.role,
            operation,
        })
    }
}
