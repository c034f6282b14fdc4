//! Per-request hooks running between authentication and dispatch.

use std::fmt;
use std::sync::Arc;

use portico_core::BoxFuture;

use crate::context::RequestContext;
use crate::types::{Failure, Request};

/// Inspection hook invoked for every request routed to an endpoint.
///
/// Hooks run after the mount's authentication decision and before the
/// endpoint router. A returned [`Failure`] rejects the request without
/// reaching the endpoint.
pub trait RequestHook: Send + Sync {
    /// Returns the hook name used in logs.
    fn name(&self) -> &str;

    /// Inspects one routed request.
    fn on_request<'a>(
        &'a self,
        ctx: &'a RequestContext,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<(), Failure>>;
}

/// An ordered collection of request hooks.
#[derive(Clone, Default)]
pub struct RequestHooks {
    hooks: Vec<Arc<dyn RequestHook>>,
}

impl RequestHooks {
    /// Creates an empty hook collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a hook; hooks run in insertion order.
    pub fn add(&mut self, hook: Arc<dyn RequestHook>) -> &mut Self {
        self.hooks.push(hook);
        self
    }

    /// Builder form of [`add`](Self::add).
    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn RequestHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Returns `true` when no hooks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Returns the number of registered hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Runs every hook in order, stopping at the first rejection.
    pub async fn run(&self, ctx: &RequestContext, request: &Request) -> Result<(), Failure> {
        for hook in &self.hooks {
            if let Err(failure) = hook.on_request(ctx, request).await {
                tracing::debug!(hook = hook.name(), %failure, "request hook rejected the request");
                return Err(failure);
            }
        }
        Ok(())
    }
}

impl fmt::Debug for RequestHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.hooks.iter().map(|hook| hook.name()).collect();
        f.debug_struct("RequestHooks").field("hooks", &names).finish()
    }
}
