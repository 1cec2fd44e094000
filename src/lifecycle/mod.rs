//! # Resource Lifecycle
//!
//! This module turns a declarative request ("N tenants, M users each") into
//! broker batches, and guarantees that whatever gets created is torn down again.
//!
//! ## The Setup / Cleanup Contract
//!
//! [`UserGenerator`] walks through
//! `Unconfigured -> SettingUp -> Active -> CleaningUp -> Closed`:
//!
//! 1. **Tenants** are created in one batch. Any failure aborts the setup.
//! 2. **Users** are created in a second batch, once every tenant id is known.
//! 3. **Cleanup** removes default security groups and releases legacy
//!    networks ([`network_cleanup`]), then deletes users and tenants.
//!
//! A failed setup cleans up after itself before returning
//! [`ContextError::SetupFailure`], so the caller never sees a failure with
//! resources still tracked. Cleanup itself never fails: errors are logged, and
//! local state always ends up empty.
//!
//! ## Scoped Acquisition
//!
//! [`UserGenerator::scoped`] is the acquire -> use -> release wrapper. A
//! context dropped while still holding resources hands them to a background
//! cleanup task.
//!
//! ## Observability
//!
//! [`setup_tracing`] installs the log subscriber used by the demo binary.

pub mod config;
pub mod error;
pub mod network_cleanup;
pub mod state;
pub mod tasks;
pub mod tracing;
pub mod user_generator;

pub use config::*;
pub use error::*;
pub use network_cleanup::CleanupReport;
pub use state::*;
pub use self::tracing::setup_tracing;
pub use user_generator::*;
