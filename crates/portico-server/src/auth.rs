//! Authentication providers and chain composition.
//!
//! An auth chain is an ordered list of provider configurations. Composition
//! distinguishes four shapes:
//!
//! - no chain configured: no authentication decision is made at all
//! - an empty chain: every request passes
//! - one handler: that handler decides alone
//! - several handlers: tried left to right, the first acceptance wins and
//!   the last rejection is reported
//!
//! Any resolution failure aborts composition; a partially built chain is
//! never returned.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

use portico_config::AuthHandlerConfig;
use portico_core::{BootError, BoxFuture, PluginError, RuntimeHandle};

use crate::plugin::PluginRegistry;
use crate::types::Request;

/// Why an authenticator rejected a request.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The request carries no credentials at all.
    #[error("request carries no credentials")]
    MissingCredentials,

    /// The request carries credentials that did not check out.
    #[error("invalid credentials: {reason}")]
    InvalidCredentials {
        /// Why the credentials were rejected.
        reason: String,
    },
}

impl AuthError {
    /// Creates a missing-credentials rejection.
    #[must_use]
    pub const fn missing_credentials() -> Self {
        Self::MissingCredentials
    }

    /// Creates an invalid-credentials rejection.
    #[must_use]
    pub fn invalid_credentials(reason: impl Into<String>) -> Self {
        Self::InvalidCredentials {
            reason: reason.into(),
        }
    }
}

/// Decides whether a request is allowed through.
pub trait Authenticator: Send + Sync {
    /// Returns the handler name used in logs.
    fn name(&self) -> &str;

    /// Checks the request's credentials.
    fn authenticate<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<(), AuthError>>;
}

/// A plugin type producing authenticators for auth chains.
pub trait AuthProvider: Send + Sync {
    /// Builds an authenticator from the chain entry's options.
    fn create_auth_handler(
        &self,
        runtime: &RuntimeHandle,
        options: &Map<String, Value>,
    ) -> Result<Arc<dyn Authenticator>, PluginError>;
}

impl fmt::Debug for dyn AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("dyn AuthProvider")
    }
}

/// The composed result of an auth chain configuration.
#[derive(Clone)]
pub enum ComposedAuthenticator {
    /// An empty chain; every request passes.
    PassThrough,
    /// A one-entry chain; the handler decides alone.
    Single(Arc<dyn Authenticator>),
    /// Several handlers tried in order; first acceptance wins.
    Chain(Vec<Arc<dyn Authenticator>>),
}

impl ComposedAuthenticator {
    /// Runs the composed decision against a request.
    ///
    /// For a chain, handlers run left to right until one accepts. When all
    /// of them reject, the last rejection is the one reported.
    pub async fn authenticate(&self, request: &Request) -> Result<(), AuthError> {
        match self {
            Self::PassThrough => Ok(()),
            Self::Single(handler) => handler.authenticate(request).await,
            Self::Chain(handlers) => {
                let mut last_rejection = None;
                for handler in handlers {
                    match handler.authenticate(request).await {
                        Ok(()) => return Ok(()),
                        Err(error) => {
                            tracing::debug!(
                                handler = handler.name(),
                                %error,
                                "authentication handler rejected the request"
                            );
                            last_rejection = Some(error);
                        }
                    }
                }
                Err(last_rejection.unwrap_or_else(|| {
                    AuthError::invalid_credentials(
                        "no authentication handler accepted the request",
                    )
                }))
            }
        }
    }
}

impl fmt::Debug for ComposedAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PassThrough => f.write_str("PassThrough"),
            Self::Single(handler) => f.debug_tuple("Single").field(&handler.name()).finish(),
            Self::Chain(handlers) => {
                let names: Vec<&str> = handlers.iter().map(|handler| handler.name()).collect();
                f.debug_tuple("Chain").field(&names).finish()
            }
        }
    }
}

/// Composes an auth chain configuration into a runnable authenticator.
///
/// Returns `Ok(None)` when no chain is configured, so callers can tell
/// "no decision" apart from "everything passes". Each entry is resolved and
/// constructed in order; the first failure aborts the whole composition.
pub fn compose_auth_chain(
    chain: Option<&[AuthHandlerConfig]>,
    registry: &PluginRegistry,
    runtime: &RuntimeHandle,
) -> Result<Option<ComposedAuthenticator>, BootError> {
    let chain = match chain {
        Some(chain) => chain,
        None => return Ok(None),
    };
    if chain.is_empty() {
        return Ok(Some(ComposedAuthenticator::PassThrough));
    }

    let mut handlers = Vec::with_capacity(chain.len());
    for handler_config in chain {
        let type_id = handler_config.type_id.as_deref();
        let provider = registry.resolve_auth_provider(type_id)?;
        let handler = provider
            .create_auth_handler(runtime, &handler_config.options)
            .map_err(|source| BootError::construction(type_id.unwrap_or_default(), source))?;
        handlers.push(handler);
    }

    Ok(Some(if handlers.len() == 1 {
        ComposedAuthenticator::Single(handlers.swap_remove(0))
    } else {
        ComposedAuthenticator::Chain(handlers)
    }))
}
