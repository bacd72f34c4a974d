//! Validation errors raised by model constructors.

use chrono::NaiveDate;

/// Input that violates a model invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Stay ends before it starts
    #[error("stay ends ({end}) before it starts ({start})")]
    InvalidStay { start: NaiveDate, end: NaiveDate },

    /// A work date falls outside the stay
    #[error("work date {date} is outside the stay {start}..={end}")]
    WorkDateOutOfRange {
        date: NaiveDate,
        start: NaiveDate,
        end: NaiveDate,
    },
}
