//! Request logging stage.

use portico_core::BoxFuture;

use crate::context::RequestContext;
use crate::stage::{Next, Stage};
use crate::types::{Failure, Request, Response};

/// Stage logging one line per completed request.
///
/// Runs outermost among the fixed stages so the logged duration covers the
/// whole chain beneath it. Failures pass through untouched; they are logged
/// where they are rendered.
#[derive(Debug, Clone, Default)]
pub struct RequestLoggerStage;

impl RequestLoggerStage {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Stage for RequestLoggerStage {
    fn name(&self) -> &'static str {
        "logger"
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, Failure>> {
        Box::pin(async move {
            let method = request.method().clone();
            let path = request.uri().path().to_string();
            tracing::debug!(method = %method, path = %path, "request received");

            let result = next.run(ctx, request).await;

            let elapsed_ms = ctx.elapsed().as_millis();
            match &result {
                Ok(response) => {
                    tracing::info!(
                        method = %method,
                        path = %path,
                        status = %response.status(),
                        elapsed_ms = elapsed_ms,
                        "request completed"
                    );
                }
                Err(failure) => {
                    tracing::info!(
                        method = %method,
                        path = %path,
                        status = %failure.status(),
                        elapsed_ms = elapsed_ms,
                        "request failed"
                    );
                }
            }

            result
        })
    }
}
