//! Crewline core data models.
//!
//! This crate defines the records shared by every layer of the cleaning
//! coordination system, together with the fixed work-unit lifecycle and the
//! pure attendance projection.

#![warn(missing_docs)]

// Core identities
mod id;
mod role;

// Scheduling
mod property;
mod booking;
mod work_unit;
mod assignment;
mod attendance;

// Lifecycle
mod state;
mod transition;

mod error;

// Re-exports
pub use id::*;
pub use role::{Actor, Role};

pub use property::Property;
pub use booking::{normalize_work_dates, BookingEntry, BookingFilter, BookingPatch, NewBooking};
pub use work_unit::{ordered_set, WorkUnit, WorkUnitFilter, WorkUnitPatch};
pub use assignment::Assignment;
pub use attendance::{
    all_checked_out, current_statuses, latest_status, AttendanceKind, AttendanceRecord,
};

pub use state::WorkState;
pub use transition::{Guard, GuardRejected, TransitionAux, TransitionRequest, TransitionTable};

pub use error::ValidationError;

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
