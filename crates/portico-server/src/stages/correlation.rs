//! Correlation id stage.
//!
//! Every request gets a correlation id for log and error correlation. The
//! configured [`CorrelationStrategy`] decides where it comes from: reused
//! from the `X-Correlation-Id` request header when present, or always
//! generated fresh.

use portico_config::CorrelationStrategy;
use portico_core::BoxFuture;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::stage::{Next, Stage};
use crate::types::{Failure, Request, Response};

/// The header carrying the correlation id in both directions.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Stage stamping the correlation id on the request context.
///
/// The id is also echoed on the response so clients can reference it.
#[derive(Debug, Clone)]
pub struct CorrelationStage {
    strategy: CorrelationStrategy,
}

impl CorrelationStage {
    /// Creates the stage for the given strategy.
    #[must_use]
    pub const fn new(strategy: CorrelationStrategy) -> Self {
        Self { strategy }
    }

    fn correlation_id(&self, request: &Request) -> String {
        match self.strategy {
            CorrelationStrategy::RequestHeader => request
                .headers()
                .get(CORRELATION_HEADER)
                .and_then(|value| value.to_str().ok())
                .filter(|value| !value.trim().is_empty())
                .map_or_else(generate_id, str::to_string),
            CorrelationStrategy::GenerateUuid => generate_id(),
        }
    }
}

fn generate_id() -> String {
    Uuid::now_v7().to_string()
}

impl Stage for CorrelationStage {
    fn name(&self) -> &'static str {
        "correlation"
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, Failure>> {
        Box::pin(async move {
            let correlation_id = self.correlation_id(&request);
            ctx.set_correlation_id(correlation_id.clone());

            let mut result = next.run(ctx, request).await;

            if let Ok(response) = &mut result {
                if let Ok(value) = correlation_id.parse() {
                    response.headers_mut().insert(CORRELATION_HEADER, value);
                }
            }

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::Full;

    use crate::types::ResponseExt;

    fn request_with_header(id: &str) -> Request {
        http::Request::builder()
            .uri("/test")
            .header(CORRELATION_HEADER, id)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    fn plain_request() -> Request {
        http::Request::builder()
            .uri("/test")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    fn ok_terminal() -> Next<'static> {
        Next::terminal(|_ctx, _request| {
            Box::pin(async { Ok(Response::text(StatusCode::OK, "OK")) })
        })
    }

    #[tokio::test]
    async fn request_header_strategy_reuses_the_inbound_id() {
        let stage = CorrelationStage::new(CorrelationStrategy::RequestHeader);
        let mut ctx = RequestContext::new();

        let response = stage
            .handle(&mut ctx, request_with_header("corr-123"), ok_terminal())
            .await
            .unwrap();

        assert_eq!(ctx.correlation_id(), Some("corr-123"));
        assert_eq!(
            response.headers().get(CORRELATION_HEADER).unwrap(),
            "corr-123"
        );
    }

    #[tokio::test]
    async fn request_header_strategy_generates_when_absent() {
        let stage = CorrelationStage::new(CorrelationStrategy::RequestHeader);
        let mut ctx = RequestContext::new();

        stage
            .handle(&mut ctx, plain_request(), ok_terminal())
            .await
            .unwrap();

        let id = ctx.correlation_id().expect("id stamped");
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn generate_strategy_ignores_the_inbound_header() {
        let stage = CorrelationStage::new(CorrelationStrategy::GenerateUuid);
        let mut ctx = RequestContext::new();

        stage
            .handle(&mut ctx, request_with_header("corr-123"), ok_terminal())
            .await
            .unwrap();

        let id = ctx.correlation_id().expect("id stamped");
        assert_ne!(id, "corr-123");
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn blank_inbound_header_is_treated_as_absent() {
        let stage = CorrelationStage::new(CorrelationStrategy::RequestHeader);
        let mut ctx = RequestContext::new();

        stage
            .handle(&mut ctx, request_with_header("  "), ok_terminal())
            .await
            .unwrap();

        let id = ctx.correlation_id().expect("id stamped");
        assert!(Uuid::parse_str(id).is_ok());
    }
}
