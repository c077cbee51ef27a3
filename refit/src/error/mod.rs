//! Layered error types for refit.
//!
//! - [`RefitError`] - Top-level error returned by generated clients
//! - [`RegistryError`] - Registration and resolution failures
//! - [`ClientError`] - Transport, status and decoding failures

mod client_error;
mod refit_error;
mod registry_error;

pub use client_error::ClientError;
pub use refit_error::RefitError;
pub use registry_error::RegistryError;
