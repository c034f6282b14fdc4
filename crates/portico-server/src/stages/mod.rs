//! The fixed root pipeline stages.
//!
//! These stages run in a fixed order decided by the route assembler, and
//! only that order; the configuration can tune individual stages but never
//! rearrange them:
//!
//! 1. [`logger`] - request/response logging
//! 2. [`correlation`] - correlation id stamping
//! 3. [`timeout`] - per-request deadline
//! 4. [`cache_control`] - cache-defeating response headers
//! 5. [`instance_info`] - instance identification header
//! 6. [`session`] - cookie-based session handling, only when enabled
//!
//! The failure-rendering handler sits outside the chain and the not-found
//! terminal inside it; neither is a stage of its own.

pub mod cache_control;
pub mod correlation;
pub mod instance_info;
pub mod logger;
pub mod session;
pub mod timeout;

pub use cache_control::{CacheControlStage, CACHE_CONTROL_DIRECTIVE};
pub use correlation::{CorrelationStage, CORRELATION_HEADER};
pub use instance_info::{InstanceInfoStage, INSTANCE_INFO_HEADER};
pub use logger::RequestLoggerStage;
pub use session::SessionStage;
pub use timeout::TimeoutStage;
