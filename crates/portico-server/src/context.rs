//! Per-request context.
//!
//! A [`RequestContext`] is created for every dispatched request and flows
//! through all pipeline stages. Stages enrich it as they run: the
//! correlation stage stamps the correlation id, the session stage loads the
//! session, and the mount dispatch records which base path matched.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::time::Instant;

use crate::session::Session;

/// Context that flows through the pipeline alongside the request.
///
/// # Example
///
/// ```
/// use portico_server::RequestContext;
///
/// let mut ctx = RequestContext::new();
/// ctx.set_correlation_id("b2c3".to_string());
/// assert_eq!(ctx.correlation_id(), Some("b2c3"));
/// ```
#[derive(Debug)]
pub struct RequestContext {
    /// Correlation id stamped by the correlation stage.
    correlation_id: Option<String>,

    /// Session loaded by the session stage, when sessions are enabled.
    session: Option<Session>,

    /// Base path of the matched mount, set by the dispatch stage.
    mounted_at: Option<String>,

    /// Request path relative to the matched mount.
    route_path: Option<String>,

    /// When the request entered the pipeline.
    started_at: Instant,

    /// Type-erased extension data for stages and hooks.
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl RequestContext {
    /// Creates an empty context for a fresh request.
    #[must_use]
    pub fn new() -> Self {
        Self {
            correlation_id: None,
            session: None,
            mounted_at: None,
            route_path: None,
            started_at: Instant::now(),
            extensions: HashMap::new(),
        }
    }

    /// Returns the correlation id, once the correlation stage has run.
    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Sets the correlation id.
    ///
    /// Called by the correlation stage; later stages only read it.
    pub fn set_correlation_id(&mut self, correlation_id: String) {
        self.correlation_id = Some(correlation_id);
    }

    /// Returns the session loaded for this request, if any.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Returns the session mutably so endpoints can store data in it.
    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    /// Installs the session for this request.
    pub fn set_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    /// Removes and returns the session, used by the session stage to write
    /// it back to the store after the rest of the pipeline ran.
    pub fn take_session(&mut self) -> Option<Session> {
        self.session.take()
    }

    /// Returns the base path of the mount that matched, once routing ran.
    #[must_use]
    pub fn mounted_at(&self) -> Option<&str> {
        self.mounted_at.as_deref()
    }

    /// Returns the request path relative to the matched mount.
    #[must_use]
    pub fn route_path(&self) -> Option<&str> {
        self.route_path.as_deref()
    }

    /// Records the matched mount and the mount-relative path.
    pub fn set_route(&mut self, mounted_at: String, route_path: String) {
        self.mounted_at = Some(mounted_at);
        self.route_path = Some(route_path);
    }

    /// Returns when the request entered the pipeline.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the elapsed time since the request entered the pipeline.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Stores a typed extension value for later stages or hooks.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a typed extension value.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref())
    }

    /// Checks whether an extension of the given type was stored.
    #[must_use]
    pub fn has_extension<T: Send + Sync + 'static>(&self) -> bool {
        self.extensions.contains_key(&TypeId::of::<T>())
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
