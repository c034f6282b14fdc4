//! Configuration schema types.
//!
//! This module defines the server configuration consumed by the route
//! assembler, the per-endpoint descriptors it mounts, and the auth chain
//! entries those descriptors may carry.

use std::net::{SocketAddr, ToSocketAddrs};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ConfigError;

/// How the correlation id attached to every request is obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrategy {
    /// Reuse the `X-Correlation-Id` request header when present, generate
    /// one otherwise.
    #[default]
    RequestHeader,
    /// Always generate a fresh UUID, ignoring any inbound header.
    GenerateUuid,
}

/// Declarative session handling mode.
///
/// The effective store is decided by combining this mode with the runtime's
/// cluster capability; see the session store selector in the server crate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// No session handling at all.
    #[default]
    None,
    /// Sessions held in local memory, lost when the instance stops.
    Local,
    /// Sessions shared across the cluster.
    Clustered,
}

/// Root server configuration.
///
/// Every field has a default, so an absent configuration file yields a
/// runnable (if empty) server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Interface the HTTP server binds to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the HTTP server binds to. A process-level port override wins
    /// over this value.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds a request may run before the timeout stage fails it.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Status code the timeout stage responds with.
    #[serde(default = "default_timeout_status_code")]
    pub timeout_status_code: u16,

    /// How correlation ids are obtained.
    #[serde(default)]
    pub correlation_strategy: CorrelationStrategy,

    /// Declarative session handling mode.
    #[serde(default)]
    pub session_handling: SessionMode,

    /// Name of the session cookie, when sessions are enabled.
    #[serde(default = "default_session_cookie_name")]
    pub session_cookie_name: String,

    /// Type identifier of the failure-rendering handler. Absent or blank
    /// selects the built-in default handler.
    #[serde(default)]
    pub error_handler: Option<String>,

    /// Process-wide default authentication chain.
    ///
    /// Absent means "no default" and is distinct from an empty list, which
    /// is an explicit pass-through.
    #[serde(default)]
    pub auth_chain: Option<Vec<AuthHandlerConfig>>,

    /// Endpoints to mount, in mounting order.
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

impl ServerConfig {
    /// Validates field ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for a zero timeout, a status
    /// code outside `100..=599`, or a blank session cookie name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_seconds == 0 {
            return Err(ConfigError::invalid_value(
                "timeout_seconds",
                "must be at least 1",
            ));
        }
        if !(100..=599).contains(&self.timeout_status_code) {
            return Err(ConfigError::invalid_value(
                "timeout_status_code",
                format!("{} is not a valid HTTP status code", self.timeout_status_code),
            ));
        }
        if self.session_cookie_name.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "session_cookie_name",
                "must not be empty",
            ));
        }
        Ok(())
    }

    /// Resolves host and port into a bindable socket address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when the host does not resolve.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| {
                ConfigError::invalid_value("host", format!("cannot resolve '{}'", self.host))
            })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_seconds: default_timeout_seconds(),
            timeout_status_code: default_timeout_status_code(),
            correlation_strategy: CorrelationStrategy::default(),
            session_handling: SessionMode::default(),
            session_cookie_name: default_session_cookie_name(),
            error_handler: None,
            auth_chain: None,
            endpoints: Vec::new(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_timeout_status_code() -> u16 {
    504
}

fn default_session_cookie_name() -> String {
    "portico-web.session".to_string()
}

/// One endpoint descriptor.
///
/// Only the recognized fields are typed; everything else lands in
/// `additional` and is handed verbatim to the endpoint implementation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EndpointConfig {
    /// Registered type identifier of the endpoint implementation.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_id: Option<String>,

    /// Base path the endpoint is mounted under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,

    /// Whether the endpoint is mounted. Unset defers to the
    /// implementation's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Endpoint-specific authentication chain. Absent falls back to the
    /// implementation default, then the process-wide default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_chain: Option<Vec<AuthHandlerConfig>>,

    /// Implementation-specific settings, passed through unmodified.
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

impl EndpointConfig {
    /// Creates a descriptor for the given type identifier with everything
    /// else unset.
    #[must_use]
    pub fn new(type_id: impl Into<String>) -> Self {
        Self {
            type_id: Some(type_id.into()),
            ..Self::default()
        }
    }

    /// Merges this descriptor over the implementation's defaults.
    ///
    /// Explicit values win field by field; `additional` is merged per key
    /// with explicit keys winning. An absent `auth_chain` falls back to the
    /// defaults' chain without ever materializing an empty one.
    #[must_use]
    pub fn merged_with_defaults(&self, defaults: &Self) -> Self {
        let mut additional = defaults.additional.clone();
        for (key, value) in &self.additional {
            additional.insert(key.clone(), value.clone());
        }

        Self {
            type_id: self.type_id.clone().or_else(|| defaults.type_id.clone()),
            base_path: self
                .base_path
                .clone()
                .or_else(|| defaults.base_path.clone()),
            enabled: self.enabled.or(defaults.enabled),
            auth_chain: self
                .auth_chain
                .clone()
                .or_else(|| defaults.auth_chain.clone()),
            additional,
        }
    }

    /// Returns the base path normalized to end with `/`, defaulting to the
    /// root path.
    #[must_use]
    pub fn normalized_base_path(&self) -> String {
        normalize_base_path(self.base_path.as_deref().unwrap_or("/"))
    }
}

/// One member of an ordered authentication chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuthHandlerConfig {
    /// Registered type identifier of the provider.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_id: Option<String>,

    /// Provider-specific options.
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl AuthHandlerConfig {
    /// Creates a chain entry for the given provider type with no options.
    #[must_use]
    pub fn new(type_id: impl Into<String>) -> Self {
        Self {
            type_id: Some(type_id.into()),
            options: Map::new(),
        }
    }
}

/// Normalizes a mount path so it ends with exactly one trailing `/`.
///
/// `/api` becomes `/api/`; `/api/` is returned unchanged.
#[must_use]
pub fn normalize_base_path(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn defaults_are_runnable() {
        let config = ServerConfig::default();
        config.validate().expect("defaults must validate");
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.timeout_seconds, 30);
        assert_eq!(config.timeout_status_code, 504);
        assert_eq!(config.session_cookie_name, "portico-web.session");
        assert_eq!(config.session_handling, SessionMode::None);
        assert_eq!(
            config.correlation_strategy,
            CorrelationStrategy::RequestHeader
        );
        assert!(config.error_handler.is_none());
        assert!(config.auth_chain.is_none());
        assert!(config.endpoints.is_empty());
    }

    #[test]
    fn empty_toml_parses_to_defaults() {
        let config: ServerConfig = toml::from_str("").expect("empty config parses");
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn endpoint_descriptor_parses_type_and_extras() {
        let config: ServerConfig = toml::from_str(
            r#"
            session_handling = "local"

            [[endpoints]]
            type = "portico.StatusEndpoint"
            base_path = "/status"
            uncached = true
            "#,
        )
        .expect("config parses");

        assert_eq!(config.session_handling, SessionMode::Local);
        let endpoint = &config.endpoints[0];
        assert_eq!(endpoint.type_id.as_deref(), Some("portico.StatusEndpoint"));
        assert_eq!(endpoint.base_path.as_deref(), Some("/status"));
        assert_eq!(endpoint.enabled, None);
        assert_eq!(endpoint.additional["uncached"], Value::Bool(true));
    }

    #[test]
    fn auth_chain_absent_and_empty_are_distinct_after_parsing() {
        let absent: ServerConfig = toml::from_str("").expect("parses");
        assert!(absent.auth_chain.is_none());

        let empty: ServerConfig = toml::from_str("auth_chain = []").expect("parses");
        assert_eq!(empty.auth_chain, Some(Vec::new()));
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let mut config = ServerConfig::default();
        config.timeout_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.timeout_status_code = 42;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.session_cookie_name = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_root_fields_are_rejected() {
        let result: Result<ServerConfig, _> = toml::from_str("listen_backlog = 5");
        assert!(result.is_err());
    }

    #[test]
    fn socket_addr_combines_host_and_port() {
        let mut config = ServerConfig::default();
        config.host = "127.0.0.1".to_string();
        config.port = 9191;
        let addr = config.socket_addr().expect("resolvable");
        assert_eq!(addr.to_string(), "127.0.0.1:9191");
    }

    #[test]
    fn merge_prefers_explicit_values_field_by_field() {
        let mut defaults = EndpointConfig::new("portico.StatusEndpoint");
        defaults.base_path = Some("/status".to_string());
        defaults.enabled = Some(true);
        defaults
            .additional
            .insert("uncached".to_string(), Value::Bool(false));
        defaults
            .additional
            .insert("page_size".to_string(), Value::from(50));

        let mut explicit = EndpointConfig::default();
        explicit.base_path = Some("/health".to_string());
        explicit
            .additional
            .insert("uncached".to_string(), Value::Bool(true));

        let merged = explicit.merged_with_defaults(&defaults);
        assert_eq!(merged.type_id.as_deref(), Some("portico.StatusEndpoint"));
        assert_eq!(merged.base_path.as_deref(), Some("/health"));
        assert_eq!(merged.enabled, Some(true));
        assert_eq!(merged.additional["uncached"], Value::Bool(true));
        assert_eq!(merged.additional["page_size"], Value::from(50));
    }

    #[test]
    fn merge_never_materializes_an_absent_auth_chain() {
        let defaults = EndpointConfig::new("portico.StatusEndpoint");
        let descriptor = EndpointConfig::default();

        let merged = descriptor.merged_with_defaults(&defaults);
        assert!(merged.auth_chain.is_none());

        // An explicit empty chain survives merging as empty, not absent.
        let mut explicit = EndpointConfig::default();
        explicit.auth_chain = Some(Vec::new());
        let merged = explicit.merged_with_defaults(&defaults);
        assert_eq!(merged.auth_chain, Some(Vec::new()));
    }

    #[test]
    fn merge_falls_back_to_default_auth_chain() {
        let mut defaults = EndpointConfig::new("portico.StatusEndpoint");
        defaults.auth_chain = Some(vec![AuthHandlerConfig::new("portico.BasicAuth")]);

        let merged = EndpointConfig::default().merged_with_defaults(&defaults);
        let chain = merged.auth_chain.expect("default chain applies");
        assert_eq!(chain[0].type_id.as_deref(), Some("portico.BasicAuth"));
    }

    #[test]
    fn normalized_base_path_defaults_to_root() {
        let endpoint = EndpointConfig::default();
        assert_eq!(endpoint.normalized_base_path(), "/");

        let mut endpoint = EndpointConfig::default();
        endpoint.base_path = Some("/api".to_string());
        assert_eq!(endpoint.normalized_base_path(), "/api/");
    }

    #[test]
    fn json_and_toml_parse_the_same_descriptor() {
        let json: ServerConfig = serde_json::from_str(
            r#"{"endpoints": [{"type": "portico.StatusEndpoint", "base_path": "/status"}]}"#,
        )
        .expect("json parses");
        let toml: ServerConfig = toml::from_str(
            r#"
            [[endpoints]]
            type = "portico.StatusEndpoint"
            base_path = "/status"
            "#,
        )
        .expect("toml parses");
        assert_eq!(json, toml);
    }

    proptest! {
        #[test]
        fn normalize_always_yields_trailing_slash(path in "/[a-z0-9/]{0,12}") {
            let normalized = normalize_base_path(&path);
            prop_assert!(normalized.ends_with('/'));
            prop_assert!(normalized.starts_with(&path));
        }

        #[test]
        fn normalize_is_idempotent(path in "/[a-z0-9/]{0,12}") {
            let once = normalize_base_path(&path);
            prop_assert_eq!(normalize_base_path(&once), once.clone());
        }
    }
}
