//! Roles and the acting identity passed into every workflow call.

use serde::{Deserialize, Serialize};
use crate::id::UserId;

/// Role a caller acts under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Property owner; declares bookings and receives confirmation
    Owner,
    /// Assigns crew and confirms completion reports
    Manager,
    /// Performs the physical work
    Crew,
    /// Automatic transitions driven by attendance
    System,
}

impl Role {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Manager => "manager",
            Role::Crew => "crew",
            Role::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "owner" => Ok(Role::Owner),
            "manager" => Ok(Role::Manager),
            "crew" => Ok(Role::Crew),
            "system" => Ok(Role::System),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Who is performing a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Acting user
    pub user_id: UserId,
    /// Role the user acts under
    pub role: Role,
}

impl Actor {
    /// Create an actor.
    pub fn new(user_id: impl Into<UserId>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    /// The system actor used for attendance-driven transitions.
    pub fn system() -> Self {
        Self {
            user_id: UserId::system(),
            role: Role::System,
        }
    }

    /// Shorthand for an owner actor.
    pub fn owner(user_id: impl Into<UserId>) -> Self {
        Self::new(user_id, Role::Owner)
    }

    /// Shorthand for a manager actor.
    pub fn manager(user_id: impl Into<UserId>) -> Self {
        Self::new(user_id, Role::Manager)
    }

    /// Shorthand for a crew actor.
    pub fn crew(user_id: impl Into<UserId>) -> Self {
        Self::new(user_id, Role::Crew)
    }
}
