use thiserror::Error;

use super::{ClientError, RegistryError};

/// Top-level error for refit operations.
///
/// Generated clients return this through [`crate::Result`]; a trait may
/// declare its own error type instead as long as it implements
/// `From<ClientError>`.
#[derive(Debug, Error)]
pub enum RefitError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl RefitError {
    /// The HTTP status code, when the error came from a response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Client(err) => err.status_code(),
            Self::Registry(_) => None,
        }
    }
}
