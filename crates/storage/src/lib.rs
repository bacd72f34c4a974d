//! Storage abstraction and implementations for Crewline.
//!
//! This crate provides a trait-based storage interface with an in-memory
//! backend and a JSON file reference implementation.

#![warn(missing_docs)]

pub mod trait_;
pub mod memory;
#[cfg(feature = "json")]
pub mod json_storage;

pub use trait_::{Storage, StorageError, Result};
pub use memory::MemoryStorage;
#[cfg(feature = "json")]
pub use json_storage::JsonStorage;
