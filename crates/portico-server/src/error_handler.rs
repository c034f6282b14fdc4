//! Failure rendering.
//!
//! Every [`Failure`] escaping the stage pipeline is rendered into a response
//! by exactly one handler, resolved once at boot. The handler sits outside
//! the pipeline, so even failures raised by the outermost stage get rendered.

use std::fmt;
use std::sync::Arc;

use portico_core::{BootError, BoxFuture, PluginError, RuntimeHandle};

use crate::context::RequestContext;
use crate::plugin::PluginRegistry;
use crate::types::{Failure, Response, ResponseExt};

/// Renders pipeline failures into HTTP responses.
pub trait ErrorHandler: Send + Sync {
    /// One-time setup before the handler serves its first failure.
    ///
    /// The default does nothing. A returned error fails the boot attempt.
    fn initialize<'a>(
        &'a self,
        _runtime: &'a RuntimeHandle,
    ) -> BoxFuture<'a, Result<(), PluginError>> {
        Box::pin(async { Ok(()) })
    }

    /// Renders one failure. Must not itself fail.
    fn render(&self, ctx: &RequestContext, failure: &Failure) -> Response;
}

impl fmt::Debug for dyn ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("dyn ErrorHandler")
    }
}

/// Built-in failure handler rendering a JSON error envelope.
///
/// Server-side failures are logged at error level, client-side rejections
/// at debug. The envelope carries the correlation id when the request has
/// one, so operators can join the response to its log lines.
#[derive(Debug, Clone, Default)]
pub struct DefaultErrorHandler;

impl DefaultErrorHandler {
    /// The registry type identifier of the default handler.
    pub const TYPE_ID: &'static str = "portico.DefaultErrorHandler";

    /// Creates the default handler.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ErrorHandler for DefaultErrorHandler {
    fn render(&self, ctx: &RequestContext, failure: &Failure) -> Response {
        let status = failure.status();
        if status.is_server_error() {
            tracing::error!(
                status = status.as_u16(),
                message = failure.message(),
                "request failed"
            );
        } else {
            tracing::debug!(
                status = status.as_u16(),
                message = failure.message(),
                "request rejected"
            );
        }

        let mut error = serde_json::json!({
            "code": status.as_u16(),
            "message": failure.message(),
        });
        if let Some(id) = ctx.correlation_id() {
            error["correlation_id"] = id.into();
        }
        Response::json(status, &serde_json::json!({ "error": error }))
    }
}

/// Resolves and initializes the failure handler for a boot attempt.
///
/// An absent or blank type identifier selects the built-in default handler.
/// Initialization failures surface as construction errors naming the type.
pub async fn create_error_handler(
    registry: &PluginRegistry,
    runtime: &RuntimeHandle,
    type_id: Option<&str>,
) -> Result<Arc<dyn ErrorHandler>, BootError> {
    let effective = match type_id {
        Some(id) if !id.trim().is_empty() => id,
        _ => DefaultErrorHandler::TYPE_ID,
    };
    let handler = registry.resolve_error_handler(Some(effective))?;
    handler
        .initialize(runtime)
        .await
        .map_err(|source| BootError::construction(effective, source))?;
    Ok(handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use http::StatusCode;
    use http_body_util::BodyExt;
    use portico_core::{Runtime, RuntimeCloseError, RuntimeOwnership};

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

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = BodyExt::collect(response.into_body())
            .await
            .unwrap()
            .to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn envelope_carries_code_and_message() {
        let handler = DefaultErrorHandler::new();
        let ctx = RequestContext::new();
        let failure = Failure::not_found("/missing");

        let response = handler.render(&ctx, &failure);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], 404);
        assert_eq!(json["error"]["message"], "no route matched '/missing'");
        assert!(json["error"].get("correlation_id").is_none());
    }

    #[tokio::test]
    async fn envelope_includes_the_correlation_id_when_present() {
        let handler = DefaultErrorHandler::new();
        let mut ctx = RequestContext::new();
        ctx.set_correlation_id("req-7".to_owned());

        let json = body_json(handler.render(&ctx, &Failure::internal("backend exploded"))).await;
        assert_eq!(json["error"]["correlation_id"], "req-7");
        assert_eq!(json["error"]["code"], 500);
    }

    #[tokio::test]
    async fn absent_and_blank_types_select_the_default_handler() {
        let registry = PluginRegistry::with_builtins();
        let runtime = runtime();

        assert!(create_error_handler(&registry, &runtime, None).await.is_ok());
        assert!(create_error_handler(&registry, &runtime, Some("  "))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn custom_handlers_are_initialized_before_use() {
        struct InitTracking {
            initialized: Arc<AtomicBool>,
        }

        impl ErrorHandler for InitTracking {
            fn initialize<'a>(
                &'a self,
                _runtime: &'a RuntimeHandle,
            ) -> BoxFuture<'a, Result<(), PluginError>> {
                Box::pin(async move {
                    self.initialized.store(true, Ordering::SeqCst);
                    Ok(())
                })
            }

            fn render(&self, _ctx: &RequestContext, failure: &Failure) -> Response {
                Response::text(failure.status(), "handled")
            }
        }

        let initialized = Arc::new(AtomicBool::new(false));
        let mut registry = PluginRegistry::new();
        let flag = Arc::clone(&initialized);
        registry.register_error_handler("acme.Handler", move || {
            Ok(InitTracking {
                initialized: Arc::clone(&flag),
            })
        });

        create_error_handler(&registry, &runtime(), Some("acme.Handler"))
            .await
            .unwrap();
        assert!(initialized.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn initialization_failure_names_the_type() {
        struct FailingInit;

        impl ErrorHandler for FailingInit {
            fn initialize<'a>(
                &'a self,
                _runtime: &'a RuntimeHandle,
            ) -> BoxFuture<'a, Result<(), PluginError>> {
                Box::pin(async { Err(PluginError::new("backing store unreachable")) })
            }

            fn render(&self, _ctx: &RequestContext, failure: &Failure) -> Response {
                Response::text(failure.status(), "handled")
            }
        }

        let mut registry = PluginRegistry::new();
        registry.register_error_handler("acme.Failing", || Ok(FailingInit));

        let err = create_error_handler(&registry, &runtime(), Some("acme.Failing"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to construct 'acme.Failing': backing store unreachable"
        );
    }
}
