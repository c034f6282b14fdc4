//! The pipeline stage trait and chain plumbing.
//!
//! Requests travel through an ordered sequence of [`Stage`]s assembled once
//! at boot. Stage order is a correctness invariant, not a tuning knob: the
//! failure-rendering handler sits outside the chain, the session stage runs
//! before any authentication, and the terminal stage answers not-found.
//!
//! # Example
//!
//! ```ignore
//! use portico_server::{BoxFuture, Failure, Next, Request, RequestContext, Response, Stage};
//!
//! struct NoopStage;
//!
//! impl Stage for NoopStage {
//!     fn name(&self) -> &'static str {
//!         "noop"
//!     }
//!
//!     fn handle<'a>(
//!         &'a self,
//!         ctx: &'a mut RequestContext,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Result<Response, Failure>> {
//!         Box::pin(async move { next.run(ctx, request).await })
//!     }
//! }
//! ```

use portico_core::BoxFuture;

use crate::context::RequestContext;
use crate::types::{Failure, Request, Response};

/// One unit of request processing with a defined relative order.
///
/// A stage receives the mutable request context, the buffered request, and a
/// [`Next`] continuation. It must either run the continuation exactly once
/// or short-circuit with its own result; a returned [`Failure`] skips every
/// remaining stage and goes straight to the failure-rendering handler.
pub trait Stage: Send + Sync {
    /// Returns the stage name used in logs.
    fn name(&self) -> &'static str;

    /// Processes the request through this stage.
    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, Failure>>;
}

/// Continuation invoking the rest of the pipeline.
///
/// Consumed by [`run`](Next::run), so a stage can only continue once; not
/// running it short-circuits the pipeline with the stage's own result.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    /// More stages to process.
    Chain {
        stage: &'a dyn Stage,
        next: Box<Next<'a>>,
    },
    /// End of the chain.
    Terminal(TerminalFn<'a>),
}

type TerminalFn<'a> =
    Box<dyn FnOnce(&mut RequestContext, Request) -> BoxFuture<'static, Result<Response, Failure>> + Send + 'a>;

impl<'a> Next<'a> {
    /// Creates a `Next` that runs the given stage before the rest.
    #[must_use]
    pub fn new(stage: &'a dyn Stage, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                stage,
                next: Box::new(next),
            },
        }
    }

    /// Creates the terminal `Next` at the end of the chain.
    #[must_use]
    pub fn terminal<F>(f: F) -> Self
    where
        F: FnOnce(&mut RequestContext, Request) -> BoxFuture<'static, Result<Response, Failure>>
            + Send
            + 'a,
    {
        Self {
            inner: NextInner::Terminal(Box::new(f)),
        }
    }

    /// Invokes the next stage, or the terminal at the end of the chain.
    pub async fn run(
        self,
        ctx: &mut RequestContext,
        request: Request,
    ) -> Result<Response, Failure> {
        match self.inner {
            NextInner::Chain { stage, next } => stage.handle(ctx, request, *next).await,
            NextInner::Terminal(terminal) => terminal(ctx, request).await,
        }
    }
}

/// Builds the chain for an ordered stage list ending in the given terminal.
///
/// Stages run in slice order; the first element is the outermost.
pub(crate) fn build_chain<'a>(stages: &'a [std::sync::Arc<dyn Stage>], terminal: Next<'a>) -> Next<'a> {
    let mut next = terminal;
    for stage in stages.iter().rev() {
        next = Next::new(stage.as_ref(), next);
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::Full;

    use crate::types::ResponseExt;

    fn empty_request(path: &str) -> Request {
        http::Request::builder()
            .uri(path)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    struct RecordingStage {
        name: &'static str,
        order: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Stage for RecordingStage {
        fn name(&self) -> &'static str {
            self.name
        }

        fn handle<'a>(
            &'a self,
            ctx: &'a mut RequestContext,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, Result<Response, Failure>> {
            Box::pin(async move {
                self.order.lock().unwrap().push(self.name);
                next.run(ctx, request).await
            })
        }
    }

    struct ShortCircuitStage;

    impl Stage for ShortCircuitStage {
        fn name(&self) -> &'static str {
            "short-circuit"
        }

        fn handle<'a>(
            &'a self,
            _ctx: &'a mut RequestContext,
            _request: Request,
            _next: Next<'a>,
        ) -> BoxFuture<'a, Result<Response, Failure>> {
            Box::pin(async { Err(Failure::unauthorized("credentials missing")) })
        }
    }

    #[tokio::test]
    async fn terminal_runs_when_chain_is_empty() {
        let mut ctx = RequestContext::new();
        let next = Next::terminal(|_ctx, _request| {
            Box::pin(async { Ok(Response::text(StatusCode::OK, "done")) })
        });

        let response = next.run(&mut ctx, empty_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn stages_run_in_slice_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(RecordingStage {
                name: "first",
                order: Arc::clone(&order),
            }),
            Arc::new(RecordingStage {
                name: "second",
                order: Arc::clone(&order),
            }),
            Arc::new(RecordingStage {
                name: "third",
                order: Arc::clone(&order),
            }),
        ];

        let terminal = Next::terminal(|_ctx, _request| {
            Box::pin(async { Ok(Response::text(StatusCode::OK, "end")) })
        });
        let chain = build_chain(&stages, terminal);

        let mut ctx = RequestContext::new();
        chain.run(&mut ctx, empty_request("/")).await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn short_circuit_skips_later_stages_and_terminal() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let terminal_ran = Arc::new(AtomicBool::new(false));

        let stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(RecordingStage {
                name: "outer",
                order: Arc::clone(&order),
            }),
            Arc::new(ShortCircuitStage),
            Arc::new(RecordingStage {
                name: "inner",
                order: Arc::clone(&order),
            }),
        ];

        let flag = Arc::clone(&terminal_ran);
        let terminal = Next::terminal(move |_ctx, _request| {
            flag.store(true, Ordering::SeqCst);
            Box::pin(async { Ok(Response::text(StatusCode::OK, "end")) })
        });

        let mut ctx = RequestContext::new();
        let result = build_chain(&stages, terminal)
            .run(&mut ctx, empty_request("/"))
            .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(*order.lock().unwrap(), vec!["outer"]);
        assert!(!terminal_ran.load(Ordering::SeqCst));
    }
}
