//! Cache-defeating response headers.

use http::header::{HeaderValue, CACHE_CONTROL};
use portico_core::BoxFuture;

use crate::context::RequestContext;
use crate::stage::{Next, Stage};
use crate::types::{Failure, Request, Response};

/// The directive set on every successful response.
pub const CACHE_CONTROL_DIRECTIVE: &str = "no-cache, no-store, must-revalidate";

/// Stage marking every response as uncacheable.
///
/// Front-end responses are assembled per request and must never be served
/// stale by intermediaries.
#[derive(Debug, Clone, Default)]
pub struct CacheControlStage;

impl CacheControlStage {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Stage for CacheControlStage {
    fn name(&self) -> &'static str {
        "cache_control"
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, Failure>> {
        Box::pin(async move {
            let mut result = next.run(ctx, request).await;

            if let Ok(response) = &mut result {
                response.headers_mut().insert(
                    CACHE_CONTROL,
                    HeaderValue::from_static(CACHE_CONTROL_DIRECTIVE),
                );
            }

            result
        })
    }
}
