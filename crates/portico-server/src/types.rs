//! Request, response, and failure types shared by the whole pipeline.
//!
//! Bodies are fully buffered at the server ingress, so both directions use
//! `Full<Bytes>` and no stage ever deals with streaming.

use std::fmt;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;

/// The HTTP request type flowing through the pipeline.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type produced by the pipeline.
pub type Response = http::Response<Full<Bytes>>;

/// Extension trait for building responses without repeating builder
/// boilerplate.
pub trait ResponseExt {
    /// Creates a plain-text response.
    fn text(status: StatusCode, message: &str) -> Response;

    /// Creates an `application/json` response from the given value.
    fn json(status: StatusCode, value: &serde_json::Value) -> Response;
}

impl ResponseExt for Response {
    fn text(status: StatusCode, message: &str) -> Response {
        http::Response::builder()
            .status(status)
            .header(http::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Full::new(Bytes::from(message.to_string())))
            .expect("failed to build text response")
    }

    fn json(status: StatusCode, value: &serde_json::Value) -> Response {
        http::Response::builder()
            .status(status)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(value.to_string())))
            .expect("failed to build JSON response")
    }
}

/// A failed request outcome.
///
/// Stages and endpoints report failures as values rather than responses;
/// the failure-rendering handler at the root of the pipeline turns the
/// failure into the client-facing response. This keeps rendering in exactly
/// one place, however deep in the pipeline the failure happened.
#[derive(Debug)]
pub struct Failure {
    status: StatusCode,
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Failure {
    /// Creates a failure with the given status and message.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            source: None,
        }
    }

    /// Attaches the underlying cause.
    #[must_use]
    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        self.source = Some(source.into());
        self
    }

    /// A `500 Internal Server Error` failure.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// A `404 Not Found` failure for an unrouted path.
    #[must_use]
    pub fn not_found(path: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("no route matched '{path}'"))
    }

    /// A `401 Unauthorized` failure.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    /// Returns the response status this failure renders with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the client-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.message)
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn std::error::Error + 'static))
    }
}
