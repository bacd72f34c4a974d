//! The status transition engine - the single entry point for moving a work unit.

use std::sync::Arc;

use crewline_core::{
    Guard, Role, TransitionRequest, UserId, WorkState, WorkUnit, WorkUnitId, WorkUnitPatch,
};
use crewline_notify::{Dispatcher, TransitionEvent};
use crewline_storage::Storage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::TransitionError;

/// Configuration for the transition engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Spawn notification dispatch instead of awaiting it
    pub detached_dispatch: bool,
}

/// Validates, persists and announces work unit transitions.
///
/// ```text
/// Guard → Membership → Build patch → Persist → Dispatch
/// ```
///
/// The engine keeps no state between calls. The store update is
/// last-write-wins, so callers pass the state they just loaded as `from`.
pub struct TransitionEngine {
    storage: Arc<dyn Storage>,
    dispatcher: Option<Arc<Dispatcher>>,
    config: EngineConfig,
}

impl TransitionEngine {
    /// Create an engine that sends no notifications.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            dispatcher: None,
            config: EngineConfig::default(),
        }
    }

    /// Set the notification dispatcher.
    pub fn with_dispatcher(mut self, dispatcher: Arc<Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Apply one transition and return the persisted unit.
    pub async fn transition(&self, request: TransitionRequest) -> Result<WorkUnit, TransitionError> {
        let id = request.work_unit_id;

        // 1. Guard, before any store access
        if let Err(rejected) = Guard::check(&request) {
            debug!(unit = %id, error = %rejected, "transition rejected");
            return Err(rejected.into());
        }

        // 2. Crew act only on their own units
        if request.actor.role == Role::Crew {
            let current = self
                .storage
                .load_work_unit(id)
                .await?
                .ok_or(TransitionError::NotFound(id))?;
            if let Err(rejected) = Guard::check_membership(&request.actor, &current.assigned_crew_ids) {
                debug!(unit = %id, error = %rejected, "transition rejected");
                return Err(rejected.into());
            }
        }

        // 3. Patch for this edge
        let patch = Self::build_patch(&request);

        // 4. Persist
        let unit = self
            .storage
            .update_work_unit(id, &patch)
            .await
            .map_err(|e| TransitionError::from_storage(id, e))?;

        info!(
            unit = %id,
            from = %request.from,
            to = %request.to,
            actor = %request.actor.user_id,
            role = %request.actor.role,
            "work unit transitioned"
        );

        if (request.from, request.to) == (WorkState::Assigned, WorkState::Open) {
            self.drop_assignment_rows(id, &request.actor.user_id).await;
        }

        // 5. Announce
        self.notify(TransitionEvent {
            unit: unit.clone(),
            from: request.from,
            to: request.to,
            actor: request.actor,
            aux: request.aux,
        })
        .await;

        Ok(unit)
    }

    /// The store patch a guarded request turns into.
    pub fn build_patch(request: &TransitionRequest) -> WorkUnitPatch {
        let now = chrono::Utc::now();
        let mut patch = WorkUnitPatch::state(request.to);

        match (request.from, request.to) {
            (_, WorkState::Assigned) => {
                patch.assigned_crew_ids = Some(request.aux.assigned_crew_ids.clone());
            }
            (_, WorkState::Accepted) => {
                patch.accepted_crew = Some(request.actor.user_id.clone());
            }
            (WorkState::Assigned, WorkState::Open) => {
                patch.removed_crew = Some(request.actor.user_id.clone());
            }
            (_, WorkState::Completed) => {
                patch.completed_at = Some(now);
            }
            (_, WorkState::Confirmed) => {
                patch.confirmed_at = Some(now);
                patch.manager_report = request.aux.manager_report.clone();
            }
            _ => {}
        }

        patch
    }

    /// Remove a crew member's assignment rows after they left the unit.
    ///
    /// Best-effort: the unit is already committed, so failures are logged.
    async fn drop_assignment_rows(&self, work_unit_id: WorkUnitId, crew_id: &UserId) {
        let rows = match self.storage.list_assignments(work_unit_id).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(unit = %work_unit_id, crew = %crew_id, error = %e, "could not list assignment rows");
                return;
            }
        };
        for row in rows.into_iter().filter(|r| &r.crew_id == crew_id) {
            if let Err(e) = self.storage.delete_assignment(row.id).await {
                warn!(unit = %work_unit_id, row = %row.id, error = %e, "could not drop assignment row");
            }
        }
    }

    /// Hand a committed transition to the dispatcher.
    ///
    /// Never fails: delivery problems are logged and dropped.
    pub async fn notify(&self, event: TransitionEvent) {
        let Some(dispatcher) = self.dispatcher.clone() else {
            return;
        };

        if self.config.detached_dispatch {
            tokio::spawn(async move {
                run_dispatch(&dispatcher, &event).await;
            });
        } else {
            run_dispatch(&dispatcher, &event).await;
        }
    }
}

async fn run_dispatch(dispatcher: &Dispatcher, event: &TransitionEvent) {
    match dispatcher.dispatch(event).await {
        Ok(report) => {
            if !report.failed.is_empty() {
                warn!(
                    unit = %event.unit.id,
                    failed = report.failed.len(),
                    sent = report.sent.len(),
                    "some notifications were not delivered"
                );
            } else {
                debug!(unit = %event.unit.id, sent = report.sent.len(), "dispatch finished");
            }
        }
        Err(e) => {
            warn!(unit = %event.unit.id, to = %event.to, error = %e, "dispatch aborted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crewline_core::{Actor, TransitionAux, WorkUnitId};

    #[test]
    fn test_patch_for_assign_sets_crew() {
        let request = TransitionRequest::new(
            WorkUnitId::new(),
            WorkState::Open,
            WorkState::Assigned,
            Actor::manager("m1"),
        )
        .with_aux(TransitionAux::crew(vec!["a".into(), "b".into()]));

        let patch = TransitionEngine::build_patch(&request);
        assert_eq!(patch.state, Some(WorkState::Assigned));
        assert_eq!(patch.assigned_crew_ids, Some(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_patch_for_reject_removes_actor() {
        let request = TransitionRequest::new(
            WorkUnitId::new(),
            WorkState::Assigned,
            WorkState::Open,
            Actor::crew("a"),
        );
        let patch = TransitionEngine::build_patch(&request);
        assert_eq!(patch.state, Some(WorkState::Open));
        assert_eq!(patch.removed_crew, Some("a".into()));
        assert!(patch.assigned_crew_ids.is_none());
    }

    #[test]
    fn test_patch_for_confirm_stamps_and_reports() {
        let request = TransitionRequest::new(
            WorkUnitId::new(),
            WorkState::Completed,
            WorkState::Confirmed,
            Actor::owner("o1"),
        )
        .with_aux(TransitionAux::report("fine"));
        let patch = TransitionEngine::build_patch(&request);
        assert!(patch.confirmed_at.is_some());
        assert_eq!(patch.manager_report.as_deref(), Some("fine"));
        assert!(patch.completed_at.is_none());
    }

    #[test]
    fn test_patch_for_open_is_state_only() {
        let request = TransitionRequest::new(
            WorkUnitId::new(),
            WorkState::Draft,
            WorkState::Open,
            Actor::owner("o1"),
        );
        assert_eq!(
            TransitionEngine::build_patch(&request),
            WorkUnitPatch::state(WorkState::Open)
        );
    }
}
