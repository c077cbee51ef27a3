use thiserror::Error;

/// Errors raised while registering or resolving service clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A factory for this service is already registered.
    #[error("service '{service}' is already registered")]
    DuplicateRegistration { service: String },

    /// No generated client was registered for the requested service.
    #[error("no client registered for service '{service}'")]
    UnregisteredService { service: String },

    /// The requested type cannot be served by a generated client.
    #[error("'{service}' is not a valid service: {reason}")]
    InvalidServiceShape { service: String, reason: String },

    /// The base address is blank or not an absolute URL.
    #[error("invalid base address '{address}': {reason}")]
    InvalidBaseAddress { address: String, reason: String },
}
