//! # Portico Server
//!
//! HTTP front-end bootstrap for the Portico framework.
//!
//! This crate turns a validated configuration into a running HTTP server:
//!
//! - [`Portico`] - boot entry point and process lifecycle
//! - [`PluginRegistry`] - endpoint, auth-provider, and error-handler resolution
//! - [`RouteAssembler`] - fixed pipeline stages plus ordered endpoint mounts
//! - [`ComposedAuthenticator`] - auth chains composed from configuration
//! - [`HttpServer`] / [`ServerHandle`] - socket lifecycle over hyper
//!
//! ## Example
//!
//! ```rust,ignore
//! use portico_core::PorticoOptions;
//! use portico_server::Portico;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), portico_core::BootError> {
//!     let mut options = PorticoOptions::default();
//!     options.server_port = Some(8080);
//!
//!     let mut portico = Portico::start(options).await?;
//!     tokio::signal::ctrl_c().await.ok();
//!     portico.stop().await.ok();
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/portico-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod assemble;
mod auth;
mod context;
mod endpoint;
mod error_handler;
mod hooks;
mod lifecycle;
mod plugin;
mod router;
mod server;
mod session;
mod stage;
pub mod stages;
mod types;

pub use assemble::RouteAssembler;
pub use auth::{compose_auth_chain, AuthError, AuthProvider, Authenticator, ComposedAuthenticator};
pub use context::RequestContext;
pub use endpoint::{Endpoint, EndpointRouter, StatusEndpoint};
pub use error_handler::{create_error_handler, DefaultErrorHandler, ErrorHandler};
pub use hooks::{RequestHook, RequestHooks};
pub use lifecycle::{LifecycleState, Portico, PorticoBuilder};
pub use plugin::PluginRegistry;
pub use router::{Router, RouterBuilder};
pub use server::{HttpServer, ServerHandle};
pub use session::{
    create_session_store, select_store_kind, Session, SessionStore, SessionStoreKind,
};
pub use stage::{Next, Stage};
pub use types::{Failure, Request, Response, ResponseExt};
