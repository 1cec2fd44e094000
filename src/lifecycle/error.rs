//! Error types for the provisioning context.

use crate::lifecycle::ContextState;
use thiserror::Error;

/// Errors surfaced to whoever drives the context.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContextError {
    /// The environment could not be prepared. Partial resources have already
    /// been cleaned up by the time this is returned.
    #[error("Setting up context `{ctx_name}` failed: {msg}")]
    SetupFailure { ctx_name: String, msg: String },

    /// The configuration was rejected before any remote call was made.
    #[error("Invalid context configuration: {0}")]
    InvalidConfig(String),

    /// The operation is not allowed in the current lifecycle state.
    #[error("Cannot {operation} a context that is {state}")]
    InvalidState {
        state: ContextState,
        operation: &'static str,
    },
}

impl ContextError {
    pub fn is_setup_failure(&self) -> bool {
        matches!(self, ContextError::SetupFailure { .. })
    }
}
