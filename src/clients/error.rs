//! Error type shared by every collaborator client.

use thiserror::Error;

/// Errors a cloud backend can report.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CloudError {
    /// The referenced resource does not exist (or is already gone).
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A resource with the same name or identifier already exists.
    #[error("Resource already exists: {0}")]
    Conflict(String),

    /// The service is down, throttling, or otherwise not answering.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The credentials were rejected or lack the required role.
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Any other failure reported by the remote side.
    #[error("Remote call failed: {0}")]
    Remote(String),
}
