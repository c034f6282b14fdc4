//! Request timeout stage.

use std::time::Duration;

use http::StatusCode;
use portico_core::BoxFuture;

use crate::context::RequestContext;
use crate::stage::{Next, Stage};
use crate::types::{Failure, Request, Response};

/// Stage failing requests that run longer than the configured deadline.
///
/// The deadline covers everything beneath this stage: later stages, the
/// matched endpoint, and the not-found terminal. A timeout surfaces as a
/// [`Failure`] with the configured status code, rendered like every other
/// failure by the handler at the pipeline root.
#[derive(Debug, Clone)]
pub struct TimeoutStage {
    timeout: Duration,
    status: StatusCode,
}

impl TimeoutStage {
    /// Creates the stage with the given deadline and timeout status code.
    #[must_use]
    pub const fn new(timeout: Duration, status: StatusCode) -> Self {
        Self { timeout, status }
    }

    /// Returns the configured deadline.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Stage for TimeoutStage {
    fn name(&self) -> &'static str {
        "timeout"
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, Failure>> {
        Box::pin(async move {
            match tokio::time::timeout(self.timeout, next.run(ctx, request)).await {
                Ok(result) => result,
                Err(_elapsed) => Err(Failure::new(
                    self.status,
                    format!("request exceeded the {}s deadline", self.timeout.as_secs()),
                )),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::Full;

    use crate::types::ResponseExt;

    fn request() -> Request {
        http::Request::builder()
            .uri("/slow")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[tokio::test]
    async fn fast_requests_pass_through() {
        let stage = TimeoutStage::new(Duration::from_secs(5), StatusCode::GATEWAY_TIMEOUT);
        let mut ctx = RequestContext::new();

        let next = Next::terminal(|_ctx, _request| {
            Box::pin(async { Ok(Response::text(StatusCode::OK, "fast")) })
        });

        let response = stage.handle(&mut ctx, request(), next).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_requests_fail_with_the_configured_status() {
        let stage = TimeoutStage::new(Duration::from_secs(1), StatusCode::GATEWAY_TIMEOUT);
        let mut ctx = RequestContext::new();

        let next = Next::terminal(|_ctx, _request| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(Response::text(StatusCode::OK, "too late"))
            })
        });

        let failure = stage.handle(&mut ctx, request(), next).await.unwrap_err();
        assert_eq!(failure.status(), StatusCode::GATEWAY_TIMEOUT);
        assert!(failure.message().contains("1s"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_status_code_is_configurable() {
        let stage = TimeoutStage::new(Duration::from_secs(1), StatusCode::SERVICE_UNAVAILABLE);
        let mut ctx = RequestContext::new();

        let next = Next::terminal(|_ctx, _request| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(Response::text(StatusCode::OK, "too late"))
            })
        });

        let failure = stage.handle(&mut ctx, request(), next).await.unwrap_err();
        assert_eq!(failure.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
