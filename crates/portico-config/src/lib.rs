//! # Portico Config
//!
//! Typed server configuration for the Portico HTTP front-end.
//!
//! The configuration drives the whole bootstrap: which endpoints are mounted
//! where, how requests are authenticated, how sessions are handled, and how
//! the pipeline behaves. It is parsed once per boot attempt and immutable
//! afterwards.
//!
//! - [`ServerConfig`] - the root configuration consumed by the route assembler
//! - [`EndpointConfig`] - one endpoint descriptor, merged with its
//!   implementation's defaults at mount time
//! - [`AuthHandlerConfig`] - one member of an ordered authentication chain
//! - [`ConfigLoader`] - TOML/JSON file loading with typed errors
//!
//! # Example
//!
//! ```
//! use portico_config::ServerConfig;
//!
//! let config: ServerConfig = toml::from_str(
//!     r#"
//!     port = 9090
//!
//!     [[endpoints]]
//!     type = "portico.StatusEndpoint"
//!     base_path = "/status"
//!     "#,
//! )
//! .expect("valid configuration");
//!
//! assert_eq!(config.port, 9090);
//! assert_eq!(config.endpoints.len(), 1);
//! ```

#![doc(html_root_url = "https://docs.rs/portico-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod loader;
mod model;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use model::{
    normalize_base_path, AuthHandlerConfig, CorrelationStrategy, EndpointConfig, ServerConfig,
    SessionMode,
};
