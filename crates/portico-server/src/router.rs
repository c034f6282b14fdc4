//! Root router assembly and request dispatch.
//!
//! A [`Router`] is assembled once at boot from an ordered stage list and an
//! ordered mount list, then serves every request until shutdown. Mounts are
//! matched in registration order, so overlapping base paths resolve to the
//! endpoint registered first.

use std::fmt;
use std::sync::Arc;

use portico_core::BoxFuture;

use crate::auth::ComposedAuthenticator;
use crate::context::RequestContext;
use crate::endpoint::EndpointRouter;
use crate::error_handler::ErrorHandler;
use crate::hooks::RequestHooks;
use crate::stage::{build_chain, Next, Stage};
use crate::types::{Failure, Request, Response};

/// One endpoint mounted under a normalized base path.
#[derive(Debug)]
pub(crate) struct Mount {
    base_path: String,
    type_id: String,
    auth: Option<ComposedAuthenticator>,
    hooks: RequestHooks,
    endpoint: EndpointRouter,
}

impl Mount {
    /// Creates a mount. `base_path` must already be normalized to start and
    /// end with `/`.
    pub(crate) fn new(
        base_path: String,
        type_id: String,
        auth: Option<ComposedAuthenticator>,
        hooks: RequestHooks,
        endpoint: EndpointRouter,
    ) -> Self {
        Self {
            base_path,
            type_id,
            auth,
            hooks,
            endpoint,
        }
    }

    /// Returns `true` when the request path falls under this mount.
    ///
    /// The base path without its trailing slash also matches, so
    /// `/widgets` reaches an endpoint mounted at `/widgets/`.
    fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.base_path)
            || path == &self.base_path[..self.base_path.len() - 1]
    }

    /// Returns the path below the mount, without a leading slash.
    fn relative_path<'p>(&self, path: &'p str) -> &'p str {
        path.get(self.base_path.len()..).unwrap_or("")
    }
}

/// Terminal stage routing requests to the first matching mount.
struct DispatchStage {
    mounts: Vec<Mount>,
}

impl Stage for DispatchStage {
    fn name(&self) -> &'static str {
        "dispatch"
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, Failure>> {
        Box::pin(async move {
            let path = request.uri().path().to_owned();
            let mount = match self.mounts.iter().find(|mount| mount.matches(&path)) {
                Some(mount) => mount,
                None => return next.run(ctx, request).await,
            };

            tracing::debug!(
                endpoint = %mount.type_id,
                path = %path,
                "dispatching to mounted endpoint"
            );
            ctx.set_route(
                mount.base_path.clone(),
                mount.relative_path(&path).to_owned(),
            );

            if let Some(auth) = &mount.auth {
                if let Err(error) = auth.authenticate(&request).await {
                    return Err(Failure::unauthorized(error.to_string()));
                }
            }

            mount.hooks.run(ctx, &request).await?;
            mount.endpoint.handle(ctx, request).await
        })
    }
}

/// Accumulates stages and mounts before the router is frozen.
pub struct RouterBuilder {
    stages: Vec<Arc<dyn Stage>>,
    error_handler: Arc<dyn ErrorHandler>,
    mounts: Vec<Mount>,
}

impl RouterBuilder {
    /// Creates a builder rendering failures with the given handler.
    #[must_use]
    pub fn new(error_handler: Arc<dyn ErrorHandler>) -> Self {
        Self {
            stages: Vec::new(),
            error_handler,
            mounts: Vec::new(),
        }
    }

    /// Appends a stage; stages run in insertion order, first is outermost.
    pub fn push_stage(&mut self, stage: Arc<dyn Stage>) -> &mut Self {
        self.stages.push(stage);
        self
    }

    /// Appends a mount; mounts match in insertion order.
    pub(crate) fn mount(&mut self, mount: Mount) -> &mut Self {
        self.mounts.push(mount);
        self
    }

    /// Returns the number of registered mounts.
    #[must_use]
    pub fn mount_count(&self) -> usize {
        self.mounts.len()
    }

    /// Returns the configured stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Freezes the builder into a servable router.
    ///
    /// Dispatch runs after every configured stage; requests matching no
    /// mount fall through to a not-found failure.
    #[must_use]
    pub fn finish(mut self) -> Router {
        self.stages.push(Arc::new(DispatchStage {
            mounts: self.mounts,
        }));
        Router {
            stages: self.stages,
            error_handler: self.error_handler,
        }
    }
}

impl fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stages: Vec<&str> = self.stages.iter().map(|stage| stage.name()).collect();
        f.debug_struct("RouterBuilder")
            .field("stages", &stages)
            .field("mounts", &self.mounts.len())
            .finish_non_exhaustive()
    }
}

/// The frozen request pipeline serving one instance.
pub struct Router {
    stages: Vec<Arc<dyn Stage>>,
    error_handler: Arc<dyn ErrorHandler>,
}

impl Router {
    /// Serves one buffered request through the full pipeline.
    ///
    /// Never fails: pipeline failures are rendered into responses by the
    /// failure handler, which sits outside the stage chain.
    pub async fn dispatch(&self, request: Request) -> Response {
        let mut ctx = RequestContext::new();
        let terminal = Next::terminal(|_ctx, request: Request| {
            let path = request.uri().path().to_owned();
            Box::pin(async move { Err(Failure::not_found(&path)) })
        });
        let chain = build_chain(&self.stages, terminal);

        match chain.run(&mut ctx, request).await {
            Ok(response) => response,
            Err(failure) => self.error_handler.render(&ctx, &failure),
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stages: Vec<&str> = self.stages.iter().map(|stage| stage.name()).collect();
        f.debug_struct("Router")
            .field("stages", &stages)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::{BodyExt, Full};
    use portico_core::BoxFuture;

    use crate::auth::{AuthError, Authenticator};
    use crate::error_handler::DefaultErrorHandler;
    use crate::hooks::RequestHook;
    use crate::types::ResponseExt;

    fn request(path: &str) -> Request {
        http::Request::builder()
            .uri(path)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    fn builder() -> RouterBuilder {
        RouterBuilder::new(Arc::new(DefaultErrorHandler::new()))
    }

    fn labeled_endpoint(label: &'static str) -> EndpointRouter {
        EndpointRouter::new(move |ctx, _request| {
            let body = format!("{label}:{}", ctx.route_path().unwrap_or(""));
            Box::pin(async move { Ok(Response::text(StatusCode::OK, &body)) })
        })
    }

    async fn body_text(response: Response) -> String {
        let bytes = BodyExt::collect(response.into_body())
            .await
            .unwrap()
            .to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn first_registered_mount_wins_on_overlap() {
        let mut builder = builder();
        builder.mount(Mount::new(
            "/api/".to_owned(),
            "test.Broad".to_owned(),
            None,
            RequestHooks::new(),
            labeled_endpoint("broad"),
        ));
        builder.mount(Mount::new(
            "/api/v2/".to_owned(),
            "test.Narrow".to_owned(),
            None,
            RequestHooks::new(),
            labeled_endpoint("narrow"),
        ));
        let router = builder.finish();

        let response = router.dispatch(request("/api/v2/things")).await;
        assert_eq!(body_text(response).await, "broad:v2/things");
    }

    #[tokio::test]
    async fn base_path_without_trailing_slash_matches() {
        let mut builder = builder();
        builder.mount(Mount::new(
            "/widgets/".to_owned(),
            "test.Widgets".to_owned(),
            None,
            RequestHooks::new(),
            labeled_endpoint("widgets"),
        ));
        let router = builder.finish();

        let response = router.dispatch(request("/widgets")).await;
        assert_eq!(body_text(response).await, "widgets:");
    }

    #[tokio::test]
    async fn unmatched_paths_render_not_found() {
        let router = builder().finish();

        let response = router.dispatch(request("/nowhere")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let json: serde_json::Value =
            serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["error"]["code"], 404);
    }

    struct DenyAll;

    impl Authenticator for DenyAll {
        fn name(&self) -> &str {
            "deny-all"
        }

        fn authenticate<'a>(
            &'a self,
            _request: &'a Request,
        ) -> BoxFuture<'a, Result<(), AuthError>> {
            Box::pin(async { Err(AuthError::missing_credentials()) })
        }
    }

    #[tokio::test]
    async fn auth_rejection_renders_unauthorized() {
        let mut builder = builder();
        builder.mount(Mount::new(
            "/secured/".to_owned(),
            "test.Secured".to_owned(),
            Some(ComposedAuthenticator::Single(Arc::new(DenyAll))),
            RequestHooks::new(),
            labeled_endpoint("secured"),
        ));
        let router = builder.finish();

        let response = router.dispatch(request("/secured/data")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    struct OrderProbe {
        label: &'static str,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Authenticator for OrderProbe {
        fn name(&self) -> &str {
            self.label
        }

        fn authenticate<'a>(
            &'a self,
            _request: &'a Request,
        ) -> BoxFuture<'a, Result<(), AuthError>> {
            Box::pin(async move {
                self.calls.lock().unwrap().push(self.label);
                Ok(())
            })
        }
    }

    impl RequestHook for OrderProbe {
        fn name(&self) -> &str {
            self.label
        }

        fn on_request<'a>(
            &'a self,
            _ctx: &'a RequestContext,
            _request: &'a Request,
        ) -> BoxFuture<'a, Result<(), Failure>> {
            Box::pin(async move {
                self.calls.lock().unwrap().push(self.label);
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn auth_runs_before_hooks_before_the_endpoint() {
        let calls = Arc::new(Mutex::new(Vec::new()));

        let auth = ComposedAuthenticator::Single(Arc::new(OrderProbe {
            label: "auth",
            calls: Arc::clone(&calls),
        }));
        let hooks = RequestHooks::new().with_hook(Arc::new(OrderProbe {
            label: "hook",
            calls: Arc::clone(&calls),
        }));
        let endpoint_calls = Arc::clone(&calls);
        let endpoint = EndpointRouter::new(move |_ctx, _request| {
            endpoint_calls.lock().unwrap().push("endpoint");
            Box::pin(async { Ok(Response::text(StatusCode::OK, "done")) })
        });

        let mut builder = builder();
        builder.mount(Mount::new(
            "/ordered/".to_owned(),
            "test.Ordered".to_owned(),
            Some(auth),
            hooks,
            endpoint,
        ));
        let router = builder.finish();

        router.dispatch(request("/ordered/")).await;
        assert_eq!(*calls.lock().unwrap(), vec!["auth", "hook", "endpoint"]);
    }
}
