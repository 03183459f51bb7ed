//! Job record store contract and lifecycle state machine.
//!
//! This crate provides:
//! - The narrow [`JobStore`] read/write contract the pipeline persists through
//! - An in-memory store implementation for the worker and tests
//! - The [`JobStateMachine`] validating both status axes before persisting

pub mod error;
pub mod memory;
pub mod state;
pub mod store;

pub use error::{JobsError, JobsResult};
pub use memory::InMemoryJobStore;
pub use state::JobStateMachine;
pub use store::JobStore;
