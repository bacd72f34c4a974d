//! Lifecycle states of a work unit.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkState {
    /// Derived from a booking, not yet published to managers
    Draft,
    /// Published, waiting for crew
    Open,
    /// Crew assigned, waiting for acceptance
    Assigned,
    /// Accepted by crew
    Accepted,
    /// Crew on site
    InProgress,
    /// Crew finished
    Completed,
    /// Report confirmed by a manager or the owner
    Confirmed,
}

impl WorkState {
    /// Every state in lifecycle order.
    pub const ALL: [WorkState; 7] = [
        WorkState::Draft,
        WorkState::Open,
        WorkState::Assigned,
        WorkState::Accepted,
        WorkState::InProgress,
        WorkState::Completed,
        WorkState::Confirmed,
    ];

    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkState::Draft => "draft",
            WorkState::Open => "open",
            WorkState::Assigned => "assigned",
            WorkState::Accepted => "accepted",
            WorkState::InProgress => "in_progress",
            WorkState::Completed => "completed",
            WorkState::Confirmed => "confirmed",
        }
    }

    /// Whether a unit in this state may be removed when its work date is
    /// dropped from the parent booking.
    pub fn is_deletable(&self) -> bool {
        matches!(self, WorkState::Draft | WorkState::Open)
    }

    /// States in which the unit cannot progress without crew.
    pub fn needs_crew(&self) -> bool {
        matches!(self, WorkState::Assigned | WorkState::Accepted | WorkState::InProgress)
    }
}

impl std::fmt::Display for WorkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown work state: {}", s))
    }
}
