//! Router assembly from server configuration.
//!
//! [`RouteAssembler`] turns a resolved [`ServerConfig`] into the stage
//! pipeline and the ordered mount list. Mounting is fail-fast: the first
//! endpoint that cannot be resolved or constructed aborts the whole pass,
//! and nothing after it is touched.

use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use portico_config::{EndpointConfig, ServerConfig};
use portico_core::{BootError, ConfigurationError, RuntimeHandle};

use crate::auth::{compose_auth_chain, ComposedAuthenticator};
use crate::error_handler::create_error_handler;
use crate::hooks::RequestHooks;
use crate::plugin::PluginRegistry;
use crate::router::{Mount, RouterBuilder};
use crate::session::create_session_store;
use crate::stages::{
    CacheControlStage, CorrelationStage, InstanceInfoStage, RequestLoggerStage, SessionStage,
    TimeoutStage,
};

/// Assembles the request pipeline for one boot attempt.
pub struct RouteAssembler {
    runtime: RuntimeHandle,
    registry: Arc<PluginRegistry>,
    config: ServerConfig,
    instance_name: String,
}

impl RouteAssembler {
    /// Creates an assembler for the given configuration.
    #[must_use]
    pub fn new(
        runtime: RuntimeHandle,
        registry: Arc<PluginRegistry>,
        config: ServerConfig,
        instance_name: impl Into<String>,
    ) -> Self {
        Self {
            runtime,
            registry,
            config,
            instance_name: instance_name.into(),
        }
    }

    /// Returns the configuration the assembler was built from.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Builds the root router with the fixed stage pipeline.
    ///
    /// Stage order is part of the contract: the request logger is outermost,
    /// correlation runs before anything that logs per-request state, the
    /// timeout bounds everything below it, and the session stage runs last
    /// so sessions exist before any mount-level authentication.
    pub async fn create_router(&self) -> Result<RouterBuilder, BootError> {
        let error_handler = create_error_handler(
            &self.registry,
            &self.runtime,
            self.config.error_handler.as_deref(),
        )
        .await?;
        let mut builder = RouterBuilder::new(error_handler);

        builder.push_stage(Arc::new(RequestLoggerStage::new()));
        builder.push_stage(Arc::new(CorrelationStage::new(
            self.config.correlation_strategy,
        )));

        let timeout_status =
            StatusCode::from_u16(self.config.timeout_status_code).map_err(|_| {
                ConfigurationError::invalid_value(
                    "timeout_status_code",
                    format!(
                        "{} is not a valid HTTP status code",
                        self.config.timeout_status_code
                    ),
                )
            })?;
        builder.push_stage(Arc::new(TimeoutStage::new(
            Duration::from_secs(self.config.timeout_seconds),
            timeout_status,
        )));

        builder.push_stage(Arc::new(CacheControlStage::new()));
        builder.push_stage(Arc::new(InstanceInfoStage::new(&self.instance_name)));

        if let Some(store) = create_session_store(&self.runtime, self.config.session_handling) {
            builder.push_stage(Arc::new(SessionStage::new(
                Arc::new(store),
                self.config.session_cookie_name.clone(),
            )));
        }

        Ok(builder)
    }

    /// Mounts every configured endpoint onto the builder, in order.
    ///
    /// Each endpoint goes through the same pass: resolve the implementation,
    /// merge its defaults under the explicit configuration, skip it when
    /// disabled, normalize the base path, build the endpoint router, settle
    /// the effective auth chain, and register the mount. The first failure
    /// aborts with everything after it untouched.
    ///
    /// An empty endpoint list is allowed; the instance comes up serving
    /// nothing but the pipeline itself.
    pub fn mount_endpoints(
        &self,
        builder: &mut RouterBuilder,
        default_auth: Option<&ComposedAuthenticator>,
        hooks: &RequestHooks,
    ) -> Result<(), BootError> {
        if self.config.endpoints.is_empty() {
            tracing::warn!("no endpoints configured");
            return Ok(());
        }

        for endpoint_config in &self.config.endpoints {
            self.mount_endpoint(builder, endpoint_config, default_auth, hooks)?;
        }
        Ok(())
    }

    fn mount_endpoint(
        &self,
        builder: &mut RouterBuilder,
        endpoint_config: &EndpointConfig,
        default_auth: Option<&ComposedAuthenticator>,
        hooks: &RequestHooks,
    ) -> Result<(), BootError> {
        let type_id = endpoint_config.type_id.as_deref();
        let endpoint = self.registry.resolve_endpoint(type_id)?;
        let type_id = type_id.unwrap_or_default();

        let merged = endpoint_config.merged_with_defaults(&endpoint.default_config());

        if !merged.enabled.unwrap_or(true) {
            tracing::info!(endpoint = %type_id, "endpoint is disabled, skipping");
            return Ok(());
        }

        let base_path = merged.normalized_base_path();

        let endpoint_router = endpoint
            .create_endpoint_router(&self.runtime, &base_path, &merged)
            .map_err(|source| BootError::construction(type_id, source))?;

        let auth = match merged.auth_chain.as_deref() {
            Some(chain) => compose_auth_chain(Some(chain), &self.registry, &self.runtime)?,
            None => default_auth.cloned(),
        };

        tracing::info!(endpoint = %type_id, base_path = %base_path, "mounting endpoint");
        builder.mount(Mount::new(
            base_path,
            type_id.to_owned(),
            auth,
            hooks.clone(),
            endpoint_router,
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use bytes::Bytes;
    use http::header::SET_COOKIE;
    use http_body_util::Full;
    use portico_config::{AuthHandlerConfig, SessionMode};
    use portico_core::{
        BoxFuture, PluginError, Runtime, RuntimeCloseError, RuntimeOwnership,
    };
    use serde_json::{Map, Value};

    use crate::auth::{AuthError, AuthProvider, Authenticator};
    use crate::endpoint::{Endpoint, EndpointRouter};
    use crate::stages::{CACHE_CONTROL_DIRECTIVE, CORRELATION_HEADER, INSTANCE_INFO_HEADER};
    use crate::types::{Request, Response, ResponseExt};

    struct FixedRuntime;

    impl Runtime for FixedRuntime {
        fn is_clustered(&self) -> bool {
            false
        }

        fn close(&self) -> BoxFuture<'_, Result<(), RuntimeCloseError>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn runtime() -> RuntimeHandle {
        RuntimeHandle::new(Arc::new(FixedRuntime), RuntimeOwnership::External)
    }

    struct EchoEndpoint {
        default_base: &'static str,
    }

    impl Endpoint for EchoEndpoint {
        fn default_config(&self) -> EndpointConfig {
            let mut config = EndpointConfig::new("test.Echo");
            config.base_path = Some(self.default_base.to_owned());
            config.enabled = Some(true);
            config
        }

        fn create_endpoint_router(
            &self,
            _runtime: &RuntimeHandle,
            _base_path: &str,
            _config: &EndpointConfig,
        ) -> Result<EndpointRouter, PluginError> {
            Ok(EndpointRouter::new(|ctx, _request| {
                let body = format!("echo:{}", ctx.route_path().unwrap_or(""));
                Box::pin(async move { Ok(Response::text(StatusCode::OK, &body)) })
            }))
        }
    }

    fn registry() -> PluginRegistry {
        let mut registry = PluginRegistry::with_builtins();
        registry.register_endpoint("test.Echo", || {
            Ok(EchoEndpoint {
                default_base: "/echo/",
            })
        });
        registry
    }

    fn assembler(config: ServerConfig, registry: PluginRegistry) -> RouteAssembler {
        RouteAssembler::new(runtime(), Arc::new(registry), config, "test-instance")
    }

    fn request(path: &str) -> Request {
        http::Request::builder()
            .uri(path)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[tokio::test]
    async fn pipeline_headers_decorate_successful_responses() {
        let mut config = ServerConfig::default();
        config.endpoints = vec![EndpointConfig::new("test.Echo")];
        let assembler = assembler(config, registry());

        let mut builder = assembler.create_router().await.unwrap();
        assembler.mount_endpoints(&mut builder, None, &RequestHooks::new()).unwrap();
        let router = builder.finish();

        let response = router.dispatch(request("/echo/widgets")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("cache-control").unwrap(),
            CACHE_CONTROL_DIRECTIVE
        );
        assert_eq!(
            response.headers().get(INSTANCE_INFO_HEADER).unwrap(),
            "test-instance"
        );
        assert!(response.headers().get(CORRELATION_HEADER).is_some());
    }

    #[tokio::test]
    async fn unmatched_requests_render_the_failure_envelope() {
        let assembler = assembler(ServerConfig::default(), registry());
        let builder = assembler.create_router().await.unwrap();
        let router = builder.finish();

        let response = router.dispatch(request("/missing")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        // Failure responses are rendered outside the chain, so decoration
        // stages never touch them.
        assert!(response.headers().get("cache-control").is_none());
    }

    #[tokio::test]
    async fn explicit_base_path_overrides_the_endpoint_default() {
        let mut config = ServerConfig::default();
        let mut endpoint = EndpointConfig::new("test.Echo");
        endpoint.base_path = Some("/custom".to_owned());
        config.endpoints = vec![endpoint];
        let assembler = assembler(config, registry());

        let mut builder = assembler.create_router().await.unwrap();
        assembler.mount_endpoints(&mut builder, None, &RequestHooks::new()).unwrap();
        let router = builder.finish();

        assert_eq!(
            router.dispatch(request("/custom/x")).await.status(),
            StatusCode::OK
        );
        assert_eq!(
            router.dispatch(request("/echo/x")).await.status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn disabled_endpoints_are_skipped_without_failing() {
        let mut config = ServerConfig::default();
        let mut endpoint = EndpointConfig::new("test.Echo");
        endpoint.enabled = Some(false);
        config.endpoints = vec![endpoint];
        let assembler = assembler(config, registry());

        let mut builder = assembler.create_router().await.unwrap();
        assembler.mount_endpoints(&mut builder, None, &RequestHooks::new()).unwrap();
        assert_eq!(builder.mount_count(), 0);
    }

    #[tokio::test]
    async fn empty_endpoint_list_is_allowed() {
        let assembler = assembler(ServerConfig::default(), registry());
        let mut builder = assembler.create_router().await.unwrap();
        assembler.mount_endpoints(&mut builder, None, &RequestHooks::new()).unwrap();
        assert_eq!(builder.mount_count(), 0);
    }

    #[tokio::test]
    async fn mounting_fails_fast_on_the_first_bad_endpoint() {
        let constructed = Arc::new(AtomicUsize::new(0));

        let mut registry = registry();
        let counter = Arc::clone(&constructed);
        registry.register_endpoint("test.Later", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(EchoEndpoint {
                default_base: "/later/",
            })
        });

        let mut config = ServerConfig::default();
        config.endpoints = vec![
            EndpointConfig::new("test.Echo"),
            EndpointConfig::new("test.Unknown"),
            EndpointConfig::new("test.Later"),
        ];
        let assembler = assembler(config, registry);

        let mut builder = assembler.create_router().await.unwrap();
        let err = assembler
            .mount_endpoints(&mut builder, None, &RequestHooks::new())
            .unwrap_err();

        assert!(err.to_string().contains("test.Unknown"));
        assert_eq!(builder.mount_count(), 1);
        assert_eq!(constructed.load(Ordering::SeqCst), 0);
    }

    struct HeaderTokenAuthenticator;

    impl Authenticator for HeaderTokenAuthenticator {
        fn name(&self) -> &str {
            "header-token"
        }

        fn authenticate<'a>(
            &'a self,
            request: &'a Request,
        ) -> BoxFuture<'a, Result<(), AuthError>> {
            Box::pin(async move {
                match request.headers().get("x-token") {
                    Some(_) => Ok(()),
                    None => Err(AuthError::missing_credentials()),
                }
            })
        }
    }

    struct HeaderTokenProvider;

    impl AuthProvider for HeaderTokenProvider {
        fn create_auth_handler(
            &self,
            _runtime: &RuntimeHandle,
            _options: &Map<String, Value>,
        ) -> Result<Arc<dyn Authenticator>, PluginError> {
            Ok(Arc::new(HeaderTokenAuthenticator))
        }
    }

    #[tokio::test]
    async fn process_default_auth_covers_endpoints_without_their_own() {
        let mut registry = registry();
        registry.register_auth_provider("test.HeaderToken", || Ok(HeaderTokenProvider));

        let mut config = ServerConfig::default();
        config.endpoints = vec![EndpointConfig::new("test.Echo")];
        let assembler = assembler(config, registry);

        let default_auth = compose_auth_chain(
            Some(&[AuthHandlerConfig::new("test.HeaderToken")]),
            &assembler.registry,
            &assembler.runtime,
        )
        .unwrap();

        let mut builder = assembler.create_router().await.unwrap();
        assembler
            .mount_endpoints(&mut builder, default_auth.as_ref(), &RequestHooks::new())
            .unwrap();
        let router = builder.finish();

        assert_eq!(
            router.dispatch(request("/echo/x")).await.status(),
            StatusCode::UNAUTHORIZED
        );

        let authorized = http::Request::builder()
            .uri("/echo/x")
            .header("x-token", "secret")
            .body(Full::new(Bytes::new()))
            .unwrap();
        assert_eq!(router.dispatch(authorized).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn explicit_empty_chain_overrides_the_process_default() {
        let mut registry = registry();
        registry.register_auth_provider("test.HeaderToken", || Ok(HeaderTokenProvider));

        let mut config = ServerConfig::default();
        let mut endpoint = EndpointConfig::new("test.Echo");
        endpoint.auth_chain = Some(Vec::new());
        config.endpoints = vec![endpoint];
        let assembler = assembler(config, registry);

        let default_auth = compose_auth_chain(
            Some(&[AuthHandlerConfig::new("test.HeaderToken")]),
            &assembler.registry,
            &assembler.runtime,
        )
        .unwrap();

        let mut builder = assembler.create_router().await.unwrap();
        assembler
            .mount_endpoints(&mut builder, default_auth.as_ref(), &RequestHooks::new())
            .unwrap();
        let router = builder.finish();

        // No token, but the endpoint's own empty chain passes everything.
        assert_eq!(
            router.dispatch(request("/echo/x")).await.status(),
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn local_sessions_issue_cookies() {
        let mut config = ServerConfig::default();
        config.session_handling = SessionMode::Local;
        config.endpoints = vec![EndpointConfig::new("test.Echo")];
        let assembler = assembler(config, registry());

        let mut builder = assembler.create_router().await.unwrap();
        assembler.mount_endpoints(&mut builder, None, &RequestHooks::new()).unwrap();
        let router = builder.finish();

        let response = router.dispatch(request("/echo/")).await;
        let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("portico-web.session="));
    }

    #[tokio::test]
    async fn stage_order_is_part_of_the_contract() {
        let mut config = ServerConfig::default();
        config.session_handling = SessionMode::Local;
        let assembler = assembler(config, registry());

        let builder = assembler.create_router().await.unwrap();
        assert_eq!(
            builder.stage_names(),
            [
                "logger",
                "correlation",
                "timeout",
                "cache_control",
                "instance_info",
                "session",
            ]
        );
    }

    #[tokio::test]
    async fn session_stage_is_absent_without_session_handling() {
        let assembler = assembler(ServerConfig::default(), registry());

        let builder = assembler.create_router().await.unwrap();
        assert!(!builder.stage_names().contains(&"session"));
    }

    #[tokio::test]
    async fn invalid_timeout_status_code_fails_router_creation() {
        let mut config = ServerConfig::default();
        config.timeout_status_code = 42;
        let assembler = assembler(config, registry());

        let err = assembler.create_router().await.unwrap_err();
        assert!(err.is_configuration());
    }

    struct CountingHook {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl crate::hooks::RequestHook for CountingHook {
        fn name(&self) -> &str {
            "counting"
        }

        fn on_request<'a>(
            &'a self,
            _ctx: &'a crate::context::RequestContext,
            request: &'a Request,
        ) -> BoxFuture<'a, Result<(), crate::types::Failure>> {
            Box::pin(async move {
                self.calls.lock().unwrap().push(request.uri().path().to_owned());
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn hooks_run_for_every_mounted_endpoint() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let hooks = RequestHooks::new().with_hook(Arc::new(CountingHook {
            calls: Arc::clone(&calls),
        }));

        let mut config = ServerConfig::default();
        config.endpoints = vec![EndpointConfig::new("test.Echo")];
        let assembler = assembler(config, registry());

        let mut builder = assembler.create_router().await.unwrap();
        assembler.mount_endpoints(&mut builder, None, &hooks).unwrap();
        let router = builder.finish();

        router.dispatch(request("/echo/a")).await;
        router.dispatch(request("/unmatched")).await;

        // Hooks only see routed requests.
        assert_eq!(*calls.lock().unwrap(), vec!["/echo/a".to_owned()]);
    }
}
