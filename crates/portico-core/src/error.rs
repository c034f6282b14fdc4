//! Error types for the Portico boot path.
//!
//! This module provides [`BootError`], the single error type surfaced by a
//! failed boot attempt, together with the more specific errors it wraps:
//!
//! - [`ConfigurationError`] - malformed or unresolvable configuration, never retried
//! - [`PluginError`] - failures raised by plugin factories and capability hooks
//! - [`RuntimeCloseError`] - a failure while closing an owned runtime; logged,
//!   never allowed to mask the error that triggered the close

use std::fmt;
use std::net::SocketAddr;

use thiserror::Error;

/// Result type alias using [`BootError`].
pub type BootResult<T> = Result<T, BootError>;

/// The capabilities a registered plugin type can provide.
///
/// A single type identifier may provide several capabilities; resolution
/// always asks for exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Serves requests under a base path.
    Endpoint,
    /// Produces authenticators for auth chains.
    AuthProvider,
    /// Renders pipeline failures into responses.
    ErrorHandler,
}

impl Capability {
    /// Returns the human-readable capability name used in diagnostics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Endpoint => "endpoint",
            Self::AuthProvider => "authentication provider",
            Self::ErrorHandler => "error handler",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration errors detected while resolving the server configuration
/// into runnable parts.
///
/// All variants are fatal to the boot attempt that raised them.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A configuration entry that requires a type identifier has none.
    #[error("{capability} configuration is missing the 'type' field")]
    MissingType {
        /// The capability the entry was being resolved for.
        capability: Capability,
    },

    /// No plugin is registered under the given type identifier.
    #[error("no plugin registered for type '{type_id}'")]
    TypeNotFound {
        /// The unresolvable type identifier.
        type_id: String,
    },

    /// A plugin is registered under the identifier but does not provide the
    /// requested capability.
    #[error("type '{type_id}' does not provide the {capability} capability")]
    CapabilityMismatch {
        /// The resolved type identifier.
        type_id: String,
        /// The capability that was requested.
        capability: Capability,
    },

    /// The plugin provides the capability but was registered without a
    /// no-argument constructor.
    #[error("type '{type_id}' must offer a default constructor")]
    MissingDefaultConstructor {
        /// The resolved type identifier.
        type_id: String,
    },

    /// A configuration field holds a value outside its permitted range.
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue {
        /// The offending field.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigurationError {
    /// Creates a missing-type error for the given capability.
    #[must_use]
    pub const fn missing_type(capability: Capability) -> Self {
        Self::MissingType { capability }
    }

    /// Creates a type-not-found error.
    #[must_use]
    pub fn type_not_found(type_id: impl Into<String>) -> Self {
        Self::TypeNotFound {
            type_id: type_id.into(),
        }
    }

    /// Creates a capability-mismatch error.
    #[must_use]
    pub fn capability_mismatch(type_id: impl Into<String>, capability: Capability) -> Self {
        Self::CapabilityMismatch {
            type_id: type_id.into(),
            capability,
        }
    }

    /// Creates a missing-default-constructor error.
    #[must_use]
    pub fn missing_default_constructor(type_id: impl Into<String>) -> Self {
        Self::MissingDefaultConstructor {
            type_id: type_id.into(),
        }
    }

    /// Creates an invalid-value error for a configuration field.
    #[must_use]
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// An error raised by a plugin factory or capability hook.
///
/// Carries an optional underlying cause. When a cause is present its message
/// is what boot diagnostics surface, mirroring how plugin authors expect the
/// root failure to be reported rather than the wrapper text.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct PluginError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl PluginError {
    /// Creates a plugin error from a message alone.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a plugin error wrapping an underlying cause.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the wrapper message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the message surfaced to boot diagnostics: the underlying
    /// cause's message when one is present, the wrapper message otherwise.
    #[must_use]
    pub fn surfaced_message(&self) -> String {
        self.source
            .as_ref()
            .map_or_else(|| self.message.clone(), std::string::ToString::to_string)
    }
}

/// A failure while closing an owned runtime during error handling or stop.
///
/// Close failures are logged by the lifecycle manager and never replace the
/// error that triggered the close.
#[derive(Debug, Error)]
#[error("failed to close runtime: {message}")]
pub struct RuntimeCloseError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl RuntimeCloseError {
    /// Creates a close error from a message alone.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a close error wrapping an underlying cause.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

/// Standard error type for a failed boot attempt.
///
/// Every boot step failure surfaces as one of these variants; the lifecycle
/// manager short-circuits remaining steps as soon as the first is raised.
///
/// # Example
///
/// ```
/// use portico_core::{BootError, Capability, ConfigurationError};
///
/// fn resolve(type_id: &str) -> Result<(), BootError> {
///     if type_id.is_empty() {
///         return Err(ConfigurationError::missing_type(Capability::Endpoint).into());
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug, Error)]
pub enum BootError {
    /// The configuration could not be resolved into runnable parts.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// A resolved plugin factory failed to produce its instance.
    #[error("failed to construct '{type_id}': {}", .source.surfaced_message())]
    Construction {
        /// The type identifier whose construction failed.
        type_id: String,
        /// The factory failure.
        #[source]
        source: PluginError,
    },

    /// The server configuration file could not be loaded or parsed.
    #[error("failed to load configuration: {source}")]
    ConfigLoad {
        /// The loader failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that could not be bound.
        addr: SocketAddr,
        /// The socket-level cause.
        #[source]
        source: std::io::Error,
    },

    /// Any other boot step failure.
    #[error("{message}")]
    Other {
        /// Human-readable failure message.
        message: String,
    },
}

impl BootError {
    /// Creates a construction error for the given type identifier.
    #[must_use]
    pub fn construction(type_id: impl Into<String>, source: PluginError) -> Self {
        Self::Construction {
            type_id: type_id.into(),
            source,
        }
    }

    /// Creates a config-load error from the loader failure.
    #[must_use]
    pub fn config_load(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::ConfigLoad {
            source: source.into(),
        }
    }

    /// Creates a bind error for the given address.
    #[must_use]
    pub fn bind(addr: SocketAddr, source: std::io::Error) -> Self {
        Self::Bind { addr, source }
    }

    /// Creates a boot error from a plain message.
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Returns `true` for configuration errors, which are never retried.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_type_names_the_capability() {
        let error = ConfigurationError::missing_type(Capability::Endpoint);
        assert_eq!(
            error.to_string(),
            "endpoint configuration is missing the 'type' field"
        );

        let error = ConfigurationError::missing_type(Capability::AuthProvider);
        assert!(error.to_string().starts_with("authentication provider"));
    }

    #[test]
    fn missing_default_constructor_message() {
        let error = ConfigurationError::missing_default_constructor("acme.CustomHandler");
        assert_eq!(
            error.to_string(),
            "type 'acme.CustomHandler' must offer a default constructor"
        );
    }

    #[test]
    fn construction_surfaces_the_cause_message() {
        let cause = std::io::Error::new(std::io::ErrorKind::Other, "missing credentials file");
        let error = BootError::construction(
            "acme.Endpoint",
            PluginError::with_source("factory failed", cause),
        );
        assert_eq!(
            error.to_string(),
            "failed to construct 'acme.Endpoint': missing credentials file"
        );
    }

    #[test]
    fn construction_without_cause_surfaces_own_message() {
        let error =
            BootError::construction("acme.Endpoint", PluginError::new("no registry available"));
        assert_eq!(
            error.to_string(),
            "failed to construct 'acme.Endpoint': no registry available"
        );
    }

    #[test]
    fn configuration_errors_convert_into_boot_errors() {
        let error: BootError = ConfigurationError::type_not_found("acme.Missing").into();
        assert!(error.is_configuration());
        assert!(error.to_string().contains("acme.Missing"));
    }

    #[test]
    fn invalid_value_names_field_and_reason() {
        let error = ConfigurationError::invalid_value("worker_pool_size", "must be at least 1");
        assert_eq!(
            error.to_string(),
            "invalid value for 'worker_pool_size': must be at least 1"
        );
    }

    #[test]
    fn plugin_error_source_chain_is_preserved() {
        let cause = std::io::Error::new(std::io::ErrorKind::NotFound, "store offline");
        let error = PluginError::with_source("session store unavailable", cause);
        assert_eq!(error.message(), "session store unavailable");
        assert_eq!(error.surfaced_message(), "store offline");
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn runtime_close_error_never_replaces_boot_error_display() {
        let close = RuntimeCloseError::new("worker pool refused to drain");
        assert_eq!(
            close.to_string(),
            "failed to close runtime: worker pool refused to drain"
        );
    }
}
