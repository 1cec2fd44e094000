//! The cloud collaborator boundary.
//!
//! The lifecycle layer never talks to a concrete cloud SDK. It consumes the
//! traits in [`traits`], obtains scoped instances from a [`ClientFactory`], and
//! sees every backend failure as a [`CloudError`].
//!
//! [`mock::MockCloud`] implements all of it in memory for tests and demos.

pub mod error;
pub mod mock;
pub mod traits;

pub use error::*;
pub use traits::*;
