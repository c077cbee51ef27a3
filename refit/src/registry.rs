//! Client registry and resolver.
//!
//! Generated code submits one [`ClientRegistration`] per service through
//! `inventory`. [`ClientRegistry::global`] gathers them into a process-wide
//! registry the first time it is used; [`ClientRegistry::new`] gives an
//! empty registry for callers that prefer to wire clients explicitly.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::{debug, trace};
use url::Url;

use crate::error::{RefitError, RegistryError};
use crate::transport::{RestTransport, TransportConfig};

/// Implemented by the generator for `dyn Service` of every service trait.
pub trait ServiceContract: 'static {
    /// Identity name: declaring module path and trait name.
    const NAME: &'static str;
    const SHAPE: ServiceShape;
    /// Base address declared with `#[rest_client(base_url = "...")]`.
    const DEFAULT_BASE_URL: Option<&'static str> = None;
}

/// Shape facts the resolver checks before building a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceShape {
    pub interface: bool,
    pub public: bool,
    pub generic: bool,
}

impl ServiceShape {
    /// ## Errors
    ///
    /// Returns [`RegistryError::InvalidServiceShape`] unless the service is a
    /// public, non-generic interface.
    pub fn validate(&self, service: &str) -> Result<(), RegistryError> {
        let reason = if !self.interface {
            "not a service trait"
        } else if !self.public {
            "service trait is not public"
        } else if self.generic {
            "generic service traits cannot be resolved"
        } else {
            return Ok(());
        };
        Err(RegistryError::InvalidServiceShape {
            service: service.to_string(),
            reason: reason.to_string(),
        })
    }
}

/// Registry key of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceKey {
    pub type_id: TypeId,
    pub name: &'static str,
    pub shape: ServiceShape,
}

impl ServiceKey {
    pub fn of<T: ?Sized + ServiceContract>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: T::NAME,
            shape: T::SHAPE,
        }
    }
}

/// Type-erased factory: returns a `Box<Box<dyn Service>>` as `Box<dyn Any>`.
pub type ErasedFactory = fn(RestTransport) -> Box<dyn Any>;

/// A registration entry submitted by generated code at process load.
pub struct ClientRegistration {
    service: fn() -> ServiceKey,
    factory: ErasedFactory,
}

impl ClientRegistration {
    pub const fn new(service: fn() -> ServiceKey, factory: ErasedFactory) -> Self {
        Self { service, factory }
    }

    pub fn service(&self) -> ServiceKey {
        (self.service)()
    }

    /// Erases a boxed client for storage in a factory.
    pub fn erase<T: ?Sized + 'static>(client: Box<T>) -> Box<dyn Any> {
        Box::new(client)
    }
}

inventory::collect!(ClientRegistration);

type SharedFactory = Arc<dyn Fn(RestTransport) -> Box<dyn Any> + Send + Sync>;

struct RegisteredFactory {
    name: &'static str,
    factory: SharedFactory,
}

/// Map from service identity to client factory.
///
/// Registration takes the write lock; resolution only reads.
pub struct ClientRegistry {
    factories: RwLock<HashMap<TypeId, RegisteredFactory>>,
    config: TransportConfig,
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let factories = self.factories.read();
        let mut names: Vec<_> = factories.values().map(|entry| entry.name).collect();
        names.sort_unstable();
        f.debug_struct("ClientRegistry")
            .field("services", &names)
            .field("config", &self.config)
            .finish()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: OnceLock<Result<ClientRegistry, RegistryError>> = OnceLock::new();

impl ClientRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::with_config(TransportConfig::default())
    }

    /// Creates an empty registry whose transports use `config`.
    pub fn with_config(config: TransportConfig) -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Builds a registry from every `#[rest_client]` registration linked
    /// into the process.
    ///
    /// ## Errors
    ///
    /// Returns [`RegistryError::DuplicateRegistration`] if two entries share
    /// an identity.
    pub fn from_inventory() -> Result<Self, RegistryError> {
        let registry = Self::new();
        for registration in inventory::iter::<ClientRegistration> {
            registry.insert(registration.service(), Arc::new(registration.factory))?;
        }
        Ok(registry)
    }

    /// The process-wide registry, built from inventory on first use and
    /// published once.
    ///
    /// ## Errors
    ///
    /// Returns the error from [`ClientRegistry::from_inventory`], on every call.
    pub fn global() -> Result<&'static ClientRegistry, RegistryError> {
        GLOBAL
            .get_or_init(Self::from_inventory)
            .as_ref()
            .map_err(Clone::clone)
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Registers a client factory for service `T`.
    ///
    /// ## Examples
    ///
    /// ```rust,ignore
    /// registry.register::<dyn TestService>(|transport| {
    ///     Box::new(TestServiceGeneratedClient::new(transport))
    /// })?;
    /// ```
    ///
    /// ## Errors
    ///
    /// Returns [`RegistryError::DuplicateRegistration`] if `T` is already registered.
    pub fn register<T: ?Sized + ServiceContract>(
        &self,
        factory: impl Fn(RestTransport) -> Box<T> + Send + Sync + 'static,
    ) -> Result<(), RegistryError> {
        self.insert(
            ServiceKey::of::<T>(),
            Arc::new(move |transport| ClientRegistration::erase(factory(transport))),
        )
    }

    fn insert(&self, key: ServiceKey, factory: SharedFactory) -> Result<(), RegistryError> {
        let mut factories = self.factories.write();
        match factories.entry(key.type_id) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateRegistration {
                service: key.name.to_string(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(RegisteredFactory {
                    name: key.name,
                    factory,
                });
                debug!(service = key.name, "registered client factory");
                Ok(())
            }
        }
    }

    /// Resolves a client for `T` bound to `base_address`.
    ///
    /// ## Errors
    ///
    /// See [`ClientRegistry::resolve_with_config`].
    pub fn resolve<T: ?Sized + ServiceContract>(&self, base_address: &str) -> Result<Box<T>, RefitError> {
        self.resolve_with_config::<T>(base_address, &self.config)
    }

    /// Resolves a client for `T` at the base address declared on the trait.
    ///
    /// ## Errors
    ///
    /// Returns [`RegistryError::InvalidBaseAddress`] if the trait declares
    /// none, otherwise as [`ClientRegistry::resolve`].
    pub fn resolve_default<T: ?Sized + ServiceContract>(&self) -> Result<Box<T>, RefitError> {
        let base_address = T::DEFAULT_BASE_URL.ok_or_else(|| RegistryError::InvalidBaseAddress {
            address: String::new(),
            reason: format!("{} declares no base_url", T::NAME),
        })?;
        self.resolve::<T>(base_address)
    }

    /// Resolves a client for `T` with an explicit transport configuration.
    ///
    /// The shape is checked first, then the address, then the registration.
    /// The registry is never modified.
    ///
    /// ## Errors
    ///
    /// - [`RegistryError::InvalidServiceShape`] if `T` is not a public, non-generic service
    /// - [`RegistryError::InvalidBaseAddress`] if the address is blank or not a URL
    /// - [`RegistryError::UnregisteredService`] if no factory is registered for `T`
    /// - [`crate::ClientError::Request`] if the HTTP client cannot be built
    pub fn resolve_with_config<T: ?Sized + ServiceContract>(
        &self,
        base_address: &str,
        config: &TransportConfig,
    ) -> Result<Box<T>, RefitError> {
        let key = ServiceKey::of::<T>();
        key.shape.validate(key.name)?;
        let base_url = normalize_base_address(base_address)?;

        let factory = self
            .factories
            .read()
            .get(&key.type_id)
            .map(|registered| Arc::clone(&registered.factory))
            .ok_or_else(|| RegistryError::UnregisteredService {
                service: key.name.to_string(),
            })?;

        trace!(service = key.name, base_url = %base_url, "resolving client");
        let transport = RestTransport::new(base_url, config)?;
        let client = factory(transport)
            .downcast::<Box<T>>()
            .map_err(|_| RegistryError::InvalidServiceShape {
                service: key.name.to_string(),
                reason: "registered factory produced a different client type".to_string(),
            })?;
        Ok(*client)
    }

    /// Returns `true` if a factory is registered for `T`.
    pub fn contains<T: ?Sized + ServiceContract>(&self) -> bool {
        self.factories.read().contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.factories.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.read().is_empty()
    }
}

/// Validates a base address and normalizes it to end in exactly one `/`.
///
/// ## Examples
///
/// ```rust
/// use refit::normalize_base_address;
///
/// let url = normalize_base_address("https://localhost:5000").unwrap();
/// assert_eq!(url.as_str(), "https://localhost:5000/");
///
/// assert!(normalize_base_address("   ").is_err());
/// ```
///
/// ## Errors
///
/// Returns [`RegistryError::InvalidBaseAddress`] if the address is blank,
/// unparsable, cannot serve as a base, or carries a query or fragment.
pub fn normalize_base_address(address: &str) -> Result<Url, RegistryError> {
    let invalid = |reason: String| RegistryError::InvalidBaseAddress {
        address: address.to_string(),
        reason,
    };

    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(invalid("base address is empty".to_string()));
    }

    let normalized = format!("{}/", trimmed.trim_end_matches('/'));
    let url = Url::parse(&normalized).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("not a base URL".to_string()));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("base address cannot carry a query or fragment".to_string()));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    trait Echo: Send + Sync {
        fn base(&self) -> String;
    }

    impl ServiceContract for dyn Echo {
        const NAME: &'static str = "registry::tests::Echo";
        const SHAPE: ServiceShape = ServiceShape {
            interface: true,
            public: true,
            generic: false,
        };
        const DEFAULT_BASE_URL: Option<&'static str> = Some("https://echo.test/api");
    }

    struct EchoClient {
        transport: RestTransport,
    }

    impl Echo for EchoClient {
        fn base(&self) -> String {
            self.transport.base_url().to_string()
        }
    }

    trait Hidden {}

    impl ServiceContract for dyn Hidden {
        const NAME: &'static str = "registry::tests::Hidden";
        const SHAPE: ServiceShape = ServiceShape {
            interface: true,
            public: false,
            generic: false,
        };
    }

    fn echo_registry() -> ClientRegistry {
        let registry = ClientRegistry::new();
        registry
            .register::<dyn Echo>(|transport| Box::new(EchoClient { transport }))
            .unwrap();
        registry
    }

    #[test]
    fn resolve_binds_normalized_address() {
        let registry = echo_registry();
        let client = registry.resolve::<dyn Echo>("https://host:5000").unwrap();
        assert_eq!(client.base(), "https://host:5000/");

        let client = registry.resolve::<dyn Echo>("https://host:5000/api//").unwrap();
        assert_eq!(client.base(), "https://host:5000/api/");
    }

    #[test]
    fn resolve_default_uses_declared_base() {
        let client = echo_registry().resolve_default::<dyn Echo>().unwrap();
        assert_eq!(client.base(), "https://echo.test/api/");
    }

    #[test]
    fn unregistered_service_fails() {
        let err = ClientRegistry::new()
            .resolve::<dyn Echo>("https://host")
            .err()
            .unwrap();
        assert!(matches!(
            err,
            RefitError::Registry(RegistryError::UnregisteredService { .. })
        ));
    }

    #[test]
    fn duplicate_registration_fails() {
        let registry = echo_registry();
        let err = registry
            .register::<dyn Echo>(|transport| Box::new(EchoClient { transport }))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateRegistration {
                service: "registry::tests::Echo".to_string()
            }
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn blank_address_is_invalid() {
        let registry = echo_registry();
        for address in ["", "   "] {
            let err = registry.resolve::<dyn Echo>(address).err().unwrap();
            assert!(matches!(
                err,
                RefitError::Registry(RegistryError::InvalidBaseAddress { .. })
            ));
        }
    }

    #[test]
    fn unparsable_address_is_invalid() {
        assert!(normalize_base_address("not a url").is_err());
        assert!(normalize_base_address("mailto:someone@example.com").is_err());
    }

    #[test]
    fn query_or_fragment_in_address_is_invalid() {
        for address in ["https://host?x=1", "https://host/api?", "https://host/api#top"] {
            let err = normalize_base_address(address).unwrap_err();
            assert!(
                matches!(err, RegistryError::InvalidBaseAddress { .. }),
                "{address} should be rejected"
            );
        }

        let err = echo_registry()
            .resolve::<dyn Echo>("https://host?x=1")
            .err()
            .unwrap();
        assert!(matches!(
            err,
            RefitError::Registry(RegistryError::InvalidBaseAddress { .. })
        ));
    }

    #[test]
    fn shape_is_checked_before_lookup() {
        let err = ClientRegistry::new()
            .resolve::<dyn Hidden>("https://host")
            .err()
            .unwrap();
        assert!(matches!(
            err,
            RefitError::Registry(RegistryError::InvalidServiceShape { .. })
        ));
    }

    #[test]
    fn resolving_never_registers() {
        let registry = echo_registry();
        for _ in 0..3 {
            registry.resolve::<dyn Echo>("https://host").unwrap();
        }
        assert_eq!(registry.len(), 1);
        assert!(registry.contains::<dyn Echo>());
        assert!(!registry.contains::<dyn Hidden>());
    }

    #[test]
    fn resolve_default_without_declared_base_fails() {
        let registry = ClientRegistry::new();
        let err = registry.resolve_default::<dyn Hidden>().err().unwrap();
        assert!(matches!(
            err,
            RefitError::Registry(RegistryError::InvalidBaseAddress { .. })
        ));
    }

    #[test]
    #[traced_test]
    fn registration_is_logged() {
        let _registry = echo_registry();
        assert!(logs_contain("registered client factory"));
    }
}
