//! Records produced and consumed by the provisioning context.
//!
//! These are plain data. Nothing here talks to a backend; the
//! [`lifecycle`](crate::lifecycle) layer creates and discards them.

pub mod endpoint;
pub mod network;
pub mod tenant;
pub mod user;

pub use endpoint::*;
pub use network::*;
pub use tenant::*;
pub use user::*;
