//! Port contracts for task lifecycle enforcement.
//!
//! Ports define infrastructure-agnostic interfaces used by task services.

pub mod backend;
pub mod repository;

pub use backend::{
    BackendAck, StatusWrite, TaskBackend, TaskBackendError, TaskBackendResult, TaskSnapshot,
};
pub use repository::{TaskRepository, TaskRepositoryError, TaskRepositoryResult};
