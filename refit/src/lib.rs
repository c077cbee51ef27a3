//! Declarative REST clients generated from annotated traits.
//!
//! Describe a remote HTTP service as a trait, mark it with
//! [`rest_client`], and resolve a working client for a base address:
//!
//! ```rust,ignore
//! #[refit::rest_client]
//! pub trait TestService {
//!     #[get("/api/values/{id}")]
//!     async fn get_value_by_id(&self, id: i32) -> refit::Result<String>;
//!
//!     #[post("/api/values")]
//!     async fn create_value(&self, #[body] value: String) -> refit::Result<String>;
//! }
//!
//! let client = refit::resolve::<dyn TestService>("https://localhost:5000")?;
//! let value = client.get_value_by_id(3).await?;
//! ```
//!
//! ## Modules
//!
//! - [`registry`] - Service contracts, registrations and the client resolver
//! - [`transport`] - The per-client HTTP handle and its configuration
//! - [`request`] - Request primitives used by generated code
//! - [`error`] - Layered error types

pub mod error;
pub mod method;
pub mod registry;
pub mod request;
pub mod transport;

pub use async_trait::async_trait;
pub use inventory;
pub use refit_macros::rest_client;
pub use tokio_util::sync::CancellationToken;

pub use error::{ClientError, RefitError, RegistryError};
pub use method::RestMethod;
pub use registry::{
    ClientRegistration, ClientRegistry, ServiceContract, ServiceKey, ServiceShape,
    normalize_base_address,
};
pub use request::{RestRequest, encode_path_value};
pub use transport::{RestResponse, RestTransport, TransportConfig};

/// Result type for refit operations.
pub type Result<T, E = RefitError> = std::result::Result<T, E>;

/// Resolves a client for service `T` from the global registry.
///
/// ## Errors
///
/// See [`ClientRegistry::resolve`].
pub fn resolve<T: ?Sized + ServiceContract>(base_address: &str) -> Result<Box<T>> {
    ClientRegistry::global()?.resolve::<T>(base_address)
}

/// Registers a client factory for service `T` in the global registry.
///
/// ## Errors
///
/// Returns [`RegistryError::DuplicateRegistration`] if `T` is already
/// registered; every `#[rest_client]` trait is registered automatically.
pub fn register<T: ?Sized + ServiceContract>(
    factory: impl Fn(RestTransport) -> Box<T> + Send + Sync + 'static,
) -> Result<()> {
    ClientRegistry::global()?.register::<T>(factory)?;
    Ok(())
}
