//! Work coordination (Layer 2)
//!
//! Status transitions, attendance synchronisation, booking reconciliation
//! and crew assignment over a shared store.

#![warn(missing_docs)]

pub mod assignment;
pub mod attendance;
pub mod engine;
pub mod error;
pub mod reconciler;
pub mod saga;
pub mod service;

pub use assignment::{AssignOutcome, AssignRequest, AssignmentManager};
pub use attendance::{AttendanceReceipt, AttendanceSynchronizer, SyncOutcome};
pub use engine::{EngineConfig, TransitionEngine};
pub use error::{ReconcileError, TransitionError};
pub use reconciler::BookingReconciler;
pub use saga::{Compensation, CompensationLog};
pub use service::Workflow;
