//! Endpoint plugins and the routers they produce.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use http::StatusCode;
use portico_config::EndpointConfig;
use portico_core::{BoxFuture, PluginError, RuntimeHandle};

use crate::context::RequestContext;
use crate::types::{Failure, Request, Response, ResponseExt};

/// A plugin type that serves requests under a mounted base path.
///
/// Endpoints are resolved by type identifier at boot, handed their merged
/// configuration, and asked to build the router that will serve every
/// request below their base path.
pub trait Endpoint: Send + Sync {
    /// Returns the endpoint's default configuration.
    ///
    /// Explicit configuration wins field by field over these defaults when
    /// the two are merged at mount time.
    fn default_config(&self) -> EndpointConfig;

    /// Builds the router serving requests under `base_path`.
    ///
    /// `config` is the merged endpoint configuration. A returned error
    /// aborts the whole mounting pass.
    fn create_endpoint_router(
        &self,
        runtime: &RuntimeHandle,
        base_path: &str,
        config: &EndpointConfig,
    ) -> Result<EndpointRouter, PluginError>;
}

impl fmt::Debug for dyn Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("dyn Endpoint")
    }
}

type EndpointHandler =
    dyn Fn(&RequestContext, Request) -> BoxFuture<'static, Result<Response, Failure>> + Send + Sync;

/// The request handler an endpoint mounts under its base path.
///
/// Handlers read what they need from the request context up front and
/// return an owned future, so the dispatch pipeline never lends the
/// context across an await point.
#[derive(Clone)]
pub struct EndpointRouter {
    handler: Arc<EndpointHandler>,
}

impl EndpointRouter {
    /// Creates a router from a handler function.
    #[must_use]
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&RequestContext, Request) -> BoxFuture<'static, Result<Response, Failure>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            handler: Arc::new(handler),
        }
    }

    /// Handles one request routed below the endpoint's base path.
    pub async fn handle(
        &self,
        ctx: &RequestContext,
        request: Request,
    ) -> Result<Response, Failure> {
        (self.handler)(ctx, request).await
    }
}

impl fmt::Debug for EndpointRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointRouter").finish_non_exhaustive()
    }
}

/// Built-in endpoint reporting instance status as JSON.
///
/// Mounted at `/status/` by default; answers only the mount root.
#[derive(Debug, Clone, Default)]
pub struct StatusEndpoint;

impl StatusEndpoint {
    /// The registry type identifier of the status endpoint.
    pub const TYPE_ID: &'static str = "portico.StatusEndpoint";

    /// Creates the status endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Endpoint for StatusEndpoint {
    fn default_config(&self) -> EndpointConfig {
        let mut config = EndpointConfig::new(Self::TYPE_ID);
        config.base_path = Some("/status/".to_owned());
        config.enabled = Some(true);
        config
    }

    fn create_endpoint_router(
        &self,
        runtime: &RuntimeHandle,
        _base_path: &str,
        _config: &EndpointConfig,
    ) -> Result<EndpointRouter, PluginError> {
        let started_at = Instant::now();
        let clustered = runtime.is_clustered();

        Ok(EndpointRouter::new(move |ctx, request| {
            let route = ctx.route_path().unwrap_or("").to_owned();
            let path = request.uri().path().to_owned();
            let correlation_id = ctx.correlation_id().map(str::to_owned);
            let uptime_seconds = started_at.elapsed().as_secs();

            Box::pin(async move {
                if !route.is_empty() && route != "/" {
                    return Err(Failure::not_found(&path));
                }

                let mut body = serde_json::json!({
                    "status": "UP",
                    "uptime_seconds": uptime_seconds,
                    "clustered": clustered,
                });
                if let Some(id) = correlation_id {
                    body["correlation_id"] = id.into();
                }
                Ok(Response::json(StatusCode::OK, &body))
            })
        }))
    }
}
