//! # Portico
//!
//! **Configuration-driven HTTP front-end bootstrap with pluggable endpoints**
//!
//! Portico boots an HTTP front end out of its working directory: it loads
//! the server configuration, resolves endpoint plugins from a registry,
//! assembles their routes behind a fixed stage pipeline, composes per-mount
//! authentication chains, and tracks who is responsible for closing the
//! runtime everything runs on.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use portico::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut portico = Portico::start(PorticoOptions::default()).await?;
//!     tokio::signal::ctrl_c().await?;
//!     portico.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Boot sequence
//!
//! Every boot attempt runs the same named steps, failing fast on the first
//! error:
//!
//! ```text
//! load-configuration → create-router → compose-auth-chain
//!     → mount-endpoints → start-server
//! ```

#![doc(html_root_url = "https://docs.rs/portico/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use portico_core as core;

// Re-export configuration types
pub use portico_config as config;

// Re-export server types
pub use portico_server as server;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use portico::prelude::*;
/// ```
pub mod prelude {
    pub use portico_core::{
        BootError, BoxFuture, ConfigurationError, PluginError, PorticoOptions, Runtime,
        RuntimeHandle, RuntimeOwnership, RuntimeSupplier,
    };

    pub use portico_config::{AuthHandlerConfig, EndpointConfig, ServerConfig, SessionMode};

    pub use portico_server::{
        AuthError, AuthProvider, Authenticator, Endpoint, EndpointRouter, ErrorHandler, Failure,
        LifecycleState, PluginRegistry, Portico, PorticoBuilder, Request, RequestContext,
        RequestHook, Response, ResponseExt, Stage,
    };
}
