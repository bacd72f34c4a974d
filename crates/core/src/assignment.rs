//! Crew assignment rows.

use serde::{Deserialize, Serialize};

use crate::id::{AssignmentId, UserId, WorkUnitId};
use crate::Time;

/// One crew member assigned to one work unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Row id
    pub id: AssignmentId,
    /// Assigned unit
    pub work_unit_id: WorkUnitId,
    /// Assigned crew member
    pub crew_id: UserId,
    /// Manager who made the assignment
    pub assigned_by: UserId,
    /// When the row was written
    pub assigned_at: Time,
    /// Note for the crew
    pub remark: Option<String>,
}

impl Assignment {
    /// Create a new assignment row stamped now.
    pub fn new(
        work_unit_id: WorkUnitId,
        crew_id: UserId,
        assigned_by: UserId,
        remark: Option<String>,
    ) -> Self {
        Self {
            id: AssignmentId::new(),
            work_unit_id,
            crew_id,
            assigned_by,
            assigned_at: chrono::Utc::now(),
            remark,
        }
    }
}
