//! Error types for workflow operations.

use chrono::NaiveDate;
use crewline_core::{BookingEntryId, GuardRejected, Role, ValidationError, WorkUnitId};
use crewline_storage::StorageError;

/// Errors from transitions, assignments and attendance.
#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    /// The guard refused; reload state or change inputs, do not retry blindly
    #[error("guard rejected: {0}")]
    Guard(#[from] GuardRejected),

    /// A store round-trip failed; safe to retry
    #[error("persistence error: {0}")]
    Persistence(#[from] StorageError),

    /// The work unit does not exist
    #[error("work unit not found: {0}")]
    NotFound(WorkUnitId),

    /// Malformed request
    #[error("invalid request: {0}")]
    Invalid(String),
}

impl TransitionError {
    /// Map a store error for `id`, turning `NotFound` into the typed variant.
    pub(crate) fn from_storage(id: WorkUnitId, err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => TransitionError::NotFound(id),
            other => TransitionError::Persistence(other),
        }
    }
}

/// Errors from booking creation, edits and deletion.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Dates being removed still have units past `open`; nothing was changed
    #[error("work dates have units already under way: {}", join_dates(.dates))]
    UnitsInProgress { dates: Vec<NaiveDate> },

    /// Creating units failed; the edit was rolled back
    #[error("creating work units failed, edit rolled back: {source}")]
    CreateFailed { source: StorageError },

    /// Removing units failed; the edit was rolled back
    #[error("removing work units failed, edit rolled back: {source}")]
    RemoveFailed { source: StorageError },

    /// A store round-trip failed before anything needed undoing
    #[error("persistence error: {0}")]
    Persistence(#[from] StorageError),

    /// The booking entry does not exist
    #[error("booking entry not found: {0}")]
    NotFound(BookingEntryId),

    /// Dates or stay interval are inconsistent
    #[error("invalid booking: {0}")]
    Invalid(#[from] ValidationError),

    /// Role may not manage bookings
    #[error("role {0} may not manage bookings")]
    Forbidden(Role),
}

fn join_dates(dates: &[NaiveDate]) -> String {
    dates
        .iter()
        .map(NaiveDate::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
