//! Taskgate: lifecycle enforcement for tracked work items.
//!
//! This crate provides the safety-critical core of a task tracker: a state
//! machine over a fixed task lifecycle, a dependency resolver, a guard that
//! keeps at most one task in progress, and a dual-mode effect executor that
//! either writes status changes to an external backend or simulates them.
//!
//! # Architecture
//!
//! Taskgate follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports
//!
//! # Modules
//!
//! - [`task`]: Task registration, transitions, dependency cascade, and
//!   effect execution

pub mod task;
