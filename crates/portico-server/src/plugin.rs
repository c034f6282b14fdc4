//! Plugin registration and resolution.
//!
//! Endpoints, authentication providers, and failure handlers are looked up
//! by type identifier in a [`PluginRegistry`]. Resolution distinguishes five
//! failure modes so operators can tell a typo from a missing capability:
//!
//! - the configuration names no type at all
//! - the type identifier is unknown
//! - the type is known but lacks the requested capability
//! - the type provides the capability but offers no default constructor
//! - the constructor itself fails
//!
//! The first four are [`ConfigurationError`]s; only the last one surfaces
//! the plugin's own failure, via [`BootError::Construction`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use portico_core::{BootError, Capability, ConfigurationError, PluginError};

use crate::auth::AuthProvider;
use crate::endpoint::{Endpoint, StatusEndpoint};
use crate::error_handler::{DefaultErrorHandler, ErrorHandler};

type Factory<T> = Arc<dyn Fn() -> Result<T, PluginError> + Send + Sync>;

/// How a capability is available on a registered type.
enum FactorySlot<T> {
    /// The type does not provide this capability.
    Absent,
    /// The type provides the capability but has no default constructor.
    Declared,
    /// The type can be constructed on demand.
    Constructible(Factory<T>),
}

impl<T> Default for FactorySlot<T> {
    fn default() -> Self {
        Self::Absent
    }
}

impl<T> Clone for FactorySlot<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Absent => Self::Absent,
            Self::Declared => Self::Declared,
            Self::Constructible(factory) => Self::Constructible(Arc::clone(factory)),
        }
    }
}

impl<T> fmt::Debug for FactorySlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("Absent"),
            Self::Declared => f.write_str("Declared"),
            Self::Constructible(_) => f.write_str("Constructible"),
        }
    }
}

/// The capabilities registered for one type identifier.
#[derive(Debug, Clone, Default)]
struct PluginEntry {
    endpoint: FactorySlot<Arc<dyn Endpoint>>,
    auth_provider: FactorySlot<Arc<dyn AuthProvider>>,
    error_handler: FactorySlot<Arc<dyn ErrorHandler>>,
}

/// Registry mapping type identifiers to plugin factories.
///
/// A single identifier may carry several capabilities. The built-in registry
/// from [`PluginRegistry::builtin`] ships the default failure handler and the
/// status endpoint; embedders extend a copy of it via the `register_*` and
/// `declare_*` methods.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    entries: HashMap<String, PluginEntry>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry preloaded with the built-in plugin types.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_endpoint(StatusEndpoint::TYPE_ID, || Ok(StatusEndpoint::new()));
        registry.register_error_handler(DefaultErrorHandler::TYPE_ID, || {
            Ok(DefaultErrorHandler::new())
        });
        registry
    }

    /// Returns the shared built-in registry.
    #[must_use]
    pub fn builtin() -> &'static Self {
        static BUILTIN: OnceLock<PluginRegistry> = OnceLock::new();
        BUILTIN.get_or_init(Self::with_builtins)
    }

    fn entry(&mut self, type_id: impl Into<String>) -> &mut PluginEntry {
        self.entries.entry(type_id.into()).or_default()
    }

    /// Registers an endpoint type with a default constructor.
    pub fn register_endpoint<E, F>(&mut self, type_id: impl Into<String>, factory: F) -> &mut Self
    where
        E: Endpoint + 'static,
        F: Fn() -> Result<E, PluginError> + Send + Sync + 'static,
    {
        self.entry(type_id).endpoint = FactorySlot::Constructible(Arc::new(move || {
            factory().map(|endpoint| Arc::new(endpoint) as Arc<dyn Endpoint>)
        }));
        self
    }

    /// Declares an endpoint type that has no default constructor.
    ///
    /// Resolving it fails with a missing-default-constructor error naming the
    /// type, rather than an unknown-type error.
    pub fn declare_endpoint(&mut self, type_id: impl Into<String>) -> &mut Self {
        self.entry(type_id).endpoint = FactorySlot::Declared;
        self
    }

    /// Registers an authentication provider type with a default constructor.
    pub fn register_auth_provider<P, F>(
        &mut self,
        type_id: impl Into<String>,
        factory: F,
    ) -> &mut Self
    where
        P: AuthProvider + 'static,
        F: Fn() -> Result<P, PluginError> + Send + Sync + 'static,
    {
        self.entry(type_id).auth_provider = FactorySlot::Constructible(Arc::new(move || {
            factory().map(|provider| Arc::new(provider) as Arc<dyn AuthProvider>)
        }));
        self
    }

    /// Declares an authentication provider type without a default constructor.
    pub fn declare_auth_provider(&mut self, type_id: impl Into<String>) -> &mut Self {
        self.entry(type_id).auth_provider = FactorySlot::Declared;
        self
    }

    /// Registers a failure handler type with a default constructor.
    pub fn register_error_handler<H, F>(
        &mut self,
        type_id: impl Into<String>,
        factory: F,
    ) -> &mut Self
    where
        H: ErrorHandler + 'static,
        F: Fn() -> Result<H, PluginError> + Send + Sync + 'static,
    {
        self.entry(type_id).error_handler = FactorySlot::Constructible(Arc::new(move || {
            factory().map(|handler| Arc::new(handler) as Arc<dyn ErrorHandler>)
        }));
        self
    }

    /// Declares a failure handler type without a default constructor.
    pub fn declare_error_handler(&mut self, type_id: impl Into<String>) -> &mut Self {
        self.entry(type_id).error_handler = FactorySlot::Declared;
        self
    }

    /// Returns `true` if any capability is registered under the identifier.
    #[must_use]
    pub fn contains(&self, type_id: &str) -> bool {
        self.entries.contains_key(type_id)
    }

    /// Resolves an endpoint instance for the given type identifier.
    pub fn resolve_endpoint(&self, type_id: Option<&str>) -> Result<Arc<dyn Endpoint>, BootError> {
        self.resolve_with(type_id, Capability::Endpoint, |entry| &entry.endpoint)
    }

    /// Resolves an authentication provider for the given type identifier.
    pub fn resolve_auth_provider(
        &self,
        type_id: Option<&str>,
    ) -> Result<Arc<dyn AuthProvider>, BootError> {
        self.resolve_with(type_id, Capability::AuthProvider, |entry| {
            &entry.auth_provider
        })
    }

    /// Resolves a failure handler for the given type identifier.
    pub fn resolve_error_handler(
        &self,
        type_id: Option<&str>,
    ) -> Result<Arc<dyn ErrorHandler>, BootError> {
        self.resolve_with(type_id, Capability::ErrorHandler, |entry| {
            &entry.error_handler
        })
    }

    fn resolve_with<T>(
        &self,
        type_id: Option<&str>,
        capability: Capability,
        slot: impl Fn(&PluginEntry) -> &FactorySlot<T>,
    ) -> Result<T, BootError> {
        let type_id = match type_id {
            Some(id) if !id.trim().is_empty() => id,
            _ => return Err(ConfigurationError::missing_type(capability).into()),
        };
        let entry = self
            .entries
            .get(type_id)
            .ok_or_else(|| ConfigurationError::type_not_found(type_id))?;
        match slot(entry) {
            FactorySlot::Absent => {
                Err(ConfigurationError::capability_mismatch(type_id, capability).into())
            }
            FactorySlot::Declared => {
                Err(ConfigurationError::missing_default_constructor(type_id).into())
            }
            FactorySlot::Constructible(factory) => {
                factory().map_err(|source| BootError::construction(type_id, source))
            }
        }
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        types.sort_unstable();
        f.debug_struct("PluginRegistry")
            .field("types", &types)
            .finish()
    }
}
