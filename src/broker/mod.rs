//! Bounded worker pool with ordered results.
//!
//! This module provides the execution engine used by the lifecycle layer to fan
//! out independent create/delete calls against a cloud backend.
//!
//! # Main Components
//!
//! - [`Operation`] - Trait describing the work a batch of tasks performs
//! - [`Task`] - One indexed unit of work (payload + shared operation)
//! - [`Broker`] - Runs a batch on a fixed number of workers and returns results in submission order
//! - [`TaskError`] - Per-item failure (operation error or panic)
//!
//! # Testing
//!
//! Use [`from_fn`] to turn an async closure into an [`Operation`] without
//! declaring a struct.

pub mod core;

// Re-export core types for convenience
pub use self::core::*;
