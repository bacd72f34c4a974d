//! Storage trait abstraction.

use async_trait::async_trait;
use crewline_core::{
    Assignment, AssignmentId, AttendanceRecord, BookingEntry, BookingEntryId, BookingFilter,
    Property, PropertyId, WorkUnit, WorkUnitFilter, WorkUnitId, WorkUnitPatch,
};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Insert of an id that already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Backend unreachable or timed out
    #[error("Unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction for Crewline records.
///
/// Every method is a single round-trip that is atomic for the one entity it
/// touches. Nothing spans entities: callers that need several writes to hang
/// together compensate on failure themselves.
#[async_trait]
pub trait Storage: Send + Sync {
    // === Property operations ===

    /// Save a property (create or update).
    async fn save_property(&self, property: &Property) -> Result<()>;

    /// Load a property by ID.
    async fn load_property(&self, id: &PropertyId) -> Result<Option<Property>>;

    // === Booking operations ===

    /// Insert a new booking entry. Fails with `Conflict` if the id exists.
    async fn insert_booking(&self, entry: &BookingEntry) -> Result<()>;

    /// Overwrite an existing booking entry. Fails with `NotFound` if missing.
    async fn save_booking(&self, entry: &BookingEntry) -> Result<()>;

    /// Load a booking entry by ID.
    async fn load_booking(&self, id: BookingEntryId) -> Result<Option<BookingEntry>>;

    /// List booking entries matching the filter, ordered by stay start.
    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<BookingEntry>>;

    /// Delete a booking entry. Deleting a missing entry is not an error.
    async fn delete_booking(&self, id: BookingEntryId) -> Result<()>;

    // === Work unit operations ===

    /// Insert a work unit. Fails with `Conflict` if the id exists.
    async fn insert_work_unit(&self, unit: &WorkUnit) -> Result<()>;

    /// Load a work unit by ID.
    async fn load_work_unit(&self, id: WorkUnitId) -> Result<Option<WorkUnit>>;

    /// Apply a patch to a work unit and return the result. Last write wins.
    async fn update_work_unit(&self, id: WorkUnitId, patch: &WorkUnitPatch) -> Result<WorkUnit>;

    /// List work units matching the filter, ordered by work date.
    async fn list_work_units(&self, filter: &WorkUnitFilter) -> Result<Vec<WorkUnit>>;

    /// Delete a work unit. Deleting a missing unit is not an error.
    async fn delete_work_unit(&self, id: WorkUnitId) -> Result<()>;

    // === Assignment operations ===

    /// Insert an assignment row.
    async fn insert_assignment(&self, assignment: &Assignment) -> Result<()>;

    /// List assignment rows for a unit, oldest first.
    async fn list_assignments(&self, work_unit_id: WorkUnitId) -> Result<Vec<Assignment>>;

    /// Delete one assignment row. Deleting a missing row is not an error.
    async fn delete_assignment(&self, id: AssignmentId) -> Result<()>;

    /// Delete every assignment row for a unit, returning how many went.
    async fn delete_assignments_for_unit(&self, work_unit_id: WorkUnitId) -> Result<usize>;

    // === Attendance operations (append-only) ===

    /// Append an attendance record.
    async fn append_attendance(&self, record: &AttendanceRecord) -> Result<()>;

    /// Full attendance log for a unit, in insertion order.
    async fn list_attendance(&self, work_unit_id: WorkUnitId) -> Result<Vec<AttendanceRecord>>;
}
