//! Task lifecycle enforcement for Taskgate.
//!
//! This module tracks tasks through a fixed lifecycle, enforces dependency
//! ordering between them, guarantees that at most one task is in progress at
//! a time, and routes every status change through an effect executor that
//! either writes to the external backend (`live`) or journals the write it
//! withheld (`simulate`). The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
