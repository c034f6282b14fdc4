//! Instance identification header.

use http::HeaderValue;
use portico_core::BoxFuture;

use crate::context::RequestContext;
use crate::stage::{Next, Stage};
use crate::types::{Failure, Request, Response};

/// The response header naming the serving instance.
pub const INSTANCE_INFO_HEADER: &str = "x-instance-info";

/// Stage tagging responses with the name of the instance that served them.
///
/// Useful behind load balancers to tell which instance answered.
#[derive(Debug, Clone)]
pub struct InstanceInfoStage {
    value: Option<HeaderValue>,
}

impl InstanceInfoStage {
    /// Creates the stage for the given instance name.
    ///
    /// Names that are not valid header values disable the header; the
    /// request still flows through unchanged.
    #[must_use]
    pub fn new(instance_name: &str) -> Self {
        let value = HeaderValue::from_str(instance_name).ok();
        if value.is_none() {
            tracing::warn!(
                instance_name = %instance_name,
                "instance name is not a valid header value, instance-info header disabled"
            );
        }
        Self { value }
    }
}

impl Stage for InstanceInfoStage {
    fn name(&self) -> &'static str {
        "instance_info"
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, Failure>> {
        Box::pin(async move {
            let mut result = next.run(ctx, request).await;

            if let (Ok(response), Some(value)) = (&mut result, &self.value) {
                response
                    .headers_mut()
                    .insert(INSTANCE_INFO_HEADER, value.clone());
            }

            result
        })
    }
}
