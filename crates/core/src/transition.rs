//! Work unit transition table and guard.
//!
//! The lifecycle is fixed:
//! ```text
//! draft → open → assigned → accepted → in_progress → completed → confirmed
//!                    ↑          │
//!                    └── open ←─┘ (crew rejects)
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::id::{UserId, WorkUnitId};
use crate::role::{Actor, Role};
use crate::state::WorkState;

/// Data a transition carries besides the state pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionAux {
    /// Crew to assign; required when moving to `assigned`
    pub assigned_crew_ids: Vec<UserId>,

    /// Report text; required when moving to `confirmed`
    pub manager_report: Option<String>,
}

impl TransitionAux {
    /// Aux data for an assignment.
    pub fn crew(crew: Vec<UserId>) -> Self {
        Self {
            assigned_crew_ids: crew,
            manager_report: None,
        }
    }

    /// Aux data for a confirmation.
    pub fn report(report: impl Into<String>) -> Self {
        Self {
            assigned_crew_ids: Vec::new(),
            manager_report: Some(report.into()),
        }
    }
}

/// A request to move one unit from one state to another. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    /// Unit to move
    pub work_unit_id: WorkUnitId,

    /// The state the caller just loaded
    pub from: WorkState,

    /// Target state
    pub to: WorkState,
    /// Who is asking
    pub actor: Actor,
    /// Crew or report data the target needs
    pub aux: TransitionAux,
}

impl TransitionRequest {
    /// Create a request with empty aux data.
    pub fn new(work_unit_id: WorkUnitId, from: WorkState, to: WorkState, actor: Actor) -> Self {
        Self {
            work_unit_id,
            from,
            to,
            actor,
            aux: TransitionAux::default(),
        }
    }

    /// Attach aux data.
    pub fn with_aux(mut self, aux: TransitionAux) -> Self {
        self.aux = aux;
        self
    }
}

/// Why the guard refused a transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardRejected {
    /// The (from, to, role) triple is not in the table
    #[error("transition {from} -> {to} is not permitted for role {role}")]
    NotPermitted {
        from: WorkState,
        to: WorkState,
        role: Role,
    },

    /// Moving to `assigned` without crew
    #[error("precondition failed: assigning requires a non-empty crew set")]
    MissingCrew,

    /// Confirming without a report
    #[error("precondition failed: confirming requires a non-empty manager report")]
    MissingManagerReport,

    /// The caller's view of the unit is out of date
    #[error("unit is {actual}, caller expected {expected}; reload and retry")]
    StaleState {
        expected: WorkState,
        actual: WorkState,
    },

    /// Crew can only be assigned once a unit has been opened
    #[error("unit is {state}; open it before assigning crew")]
    UnitNotOpen { state: WorkState },

    /// The role may not perform the operation at all
    #[error("role {role} may not {operation}")]
    RoleNotPermitted { role: Role, operation: &'static str },

    /// Crew acting on a unit they are not assigned to
    #[error("{user} is not assigned to this unit")]
    NotAssigned { user: UserId },
}

/// The fixed transition table.
pub struct TransitionTable;

impl TransitionTable {
    /// Whether `role` may move a unit from `from` to `to`.
    pub fn is_allowed(from: WorkState, to: WorkState, role: Role) -> bool {
        use Role::*;
        use WorkState::*;

        matches!(
            (from, to, role),
            (Draft, Open, Owner | Manager)
                | (Open, Assigned, Manager)
                | (Assigned, Accepted, Crew)
                | (Assigned, Open, Crew)
                | (Accepted, InProgress, Crew | System)
                | (InProgress, Completed, Crew | System)
                | (Completed, Confirmed, Manager | Owner)
        )
    }

    /// States reachable from `from` by any role.
    pub fn allowed_targets(from: WorkState) -> BTreeSet<WorkState> {
        WorkState::ALL
            .iter()
            .copied()
            .filter(|to| ALL_ROLES.iter().any(|role| Self::is_allowed(from, *to, *role)))
            .collect()
    }

    /// States reachable from `from` by `role`.
    pub fn allowed_targets_for(from: WorkState, role: Role) -> BTreeSet<WorkState> {
        WorkState::ALL
            .iter()
            .copied()
            .filter(|to| Self::is_allowed(from, *to, role))
            .collect()
    }
}

const ALL_ROLES: [Role; 4] = [Role::Owner, Role::Manager, Role::Crew, Role::System];

/// Pure predicate over a transition request.
pub struct Guard;

impl Guard {
    /// Check the table and the per-target preconditions.
    pub fn check(request: &TransitionRequest) -> Result<(), GuardRejected> {
        if !TransitionTable::is_allowed(request.from, request.to, request.actor.role) {
            return Err(GuardRejected::NotPermitted {
                from: request.from,
                to: request.to,
                role: request.actor.role,
            });
        }

        match request.to {
            WorkState::Assigned if request.aux.assigned_crew_ids.is_empty() => {
                Err(GuardRejected::MissingCrew)
            }
            WorkState::Confirmed
                if request
                    .aux
                    .manager_report
                    .as_deref()
                    .map_or(true, |r| r.trim().is_empty()) =>
            {
                Err(GuardRejected::MissingManagerReport)
            }
            _ => Ok(()),
        }
    }

    /// Crew may only act on units they are assigned to.
    ///
    /// `crew` is the unit's current assigned crew. Other roles pass.
    pub fn check_membership(actor: &Actor, crew: &[UserId]) -> Result<(), GuardRejected> {
        if actor.role == Role::Crew && !crew.contains(&actor.user_id) {
            return Err(GuardRejected::NotAssigned {
                user: actor.user_id.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(from: WorkState, to: WorkState, role: Role) -> TransitionRequest {
        TransitionRequest::new(WorkUnitId::new(), from, to, Actor::new("u1", role))
    }

    #[test]
    fn test_table_has_exactly_the_documented_edges() {
        let mut allowed = Vec::new();
        for from in WorkState::ALL {
            for to in WorkState::ALL {
                for role in ALL_ROLES {
                    if TransitionTable::is_allowed(from, to, role) {
                        allowed.push((from, to, role));
                    }
                }
            }
        }
        assert_eq!(allowed.len(), 11);
        assert!(allowed.contains(&(WorkState::Assigned, WorkState::Open, Role::Crew)));
        assert!(!allowed.contains(&(WorkState::Open, WorkState::Assigned, Role::Owner)));
    }

    #[test]
    fn test_no_edges_leave_confirmed() {
        assert!(TransitionTable::allowed_targets(WorkState::Confirmed).is_empty());
        assert_eq!(
            TransitionTable::allowed_targets(WorkState::Completed),
            BTreeSet::from([WorkState::Confirmed])
        );
    }

    #[test]
    fn test_allowed_targets_for_role() {
        assert_eq!(
            TransitionTable::allowed_targets_for(WorkState::Assigned, Role::Crew),
            BTreeSet::from([WorkState::Open, WorkState::Accepted])
        );
        assert!(TransitionTable::allowed_targets_for(WorkState::Assigned, Role::Manager).is_empty());
    }

    #[test]
    fn test_guard_rejects_unlisted_triples() {
        for from in WorkState::ALL {
            for to in WorkState::ALL {
                for role in ALL_ROLES {
                    if TransitionTable::is_allowed(from, to, role) {
                        continue;
                    }
                    let result = Guard::check(&request(from, to, role));
                    assert_eq!(
                        result,
                        Err(GuardRejected::NotPermitted { from, to, role })
                    );
                }
            }
        }
    }

    #[test]
    fn test_assign_requires_crew() {
        let req = request(WorkState::Open, WorkState::Assigned, Role::Manager);
        assert_eq!(Guard::check(&req), Err(GuardRejected::MissingCrew));

        let req = req.with_aux(TransitionAux::crew(vec!["a".into()]));
        assert_eq!(Guard::check(&req), Ok(()));
    }

    #[test]
    fn test_confirm_requires_non_blank_report() {
        let req = request(WorkState::Completed, WorkState::Confirmed, Role::Manager);
        assert_eq!(Guard::check(&req), Err(GuardRejected::MissingManagerReport));

        let blank = req.clone().with_aux(TransitionAux::report("   "));
        assert_eq!(Guard::check(&blank), Err(GuardRejected::MissingManagerReport));

        let ok = req.with_aux(TransitionAux::report("all rooms done"));
        assert_eq!(Guard::check(&ok), Ok(()));
    }

    #[test]
    fn test_system_only_drives_attendance_edges() {
        assert!(TransitionTable::is_allowed(WorkState::Accepted, WorkState::InProgress, Role::System));
        assert!(TransitionTable::is_allowed(WorkState::InProgress, WorkState::Completed, Role::System));
        assert!(!TransitionTable::is_allowed(WorkState::Completed, WorkState::Confirmed, Role::System));
    }

    #[test]
    fn test_crew_must_be_on_the_unit() {
        let crew: Vec<UserId> = vec!["a".into(), "b".into()];
        assert_eq!(Guard::check_membership(&Actor::crew("a"), &crew), Ok(()));
        assert_eq!(
            Guard::check_membership(&Actor::crew("zed"), &crew),
            Err(GuardRejected::NotAssigned { user: "zed".into() })
        );
        // managers and the system are not crew members
        assert_eq!(Guard::check_membership(&Actor::manager("m1"), &crew), Ok(()));
        assert_eq!(Guard::check_membership(&Actor::system(), &[]), Ok(()));
    }
}
