//! Session store selection and the in-memory store.
//!
//! The declarative [`SessionMode`] from the configuration never maps
//! straight to a store: the effective kind also depends on whether the
//! runtime joined a cluster. [`select_store_kind`] is that pure decision
//! table; [`create_session_store`] combines it with construction.
//!
//! Replicating a clustered store across instances is the clustering
//! collaborator's concern; both kinds here share the same in-process map
//! and differ only in the tag the rest of the system observes.

use std::sync::Arc;

use dashmap::DashMap;
use portico_config::SessionMode;
use portico_core::RuntimeHandle;
use serde_json::{Map, Value};
use uuid::Uuid;

/// The kind of store backing session handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStoreKind {
    /// Sessions live in this instance's memory only.
    Local,
    /// Sessions are shared across the cluster.
    Clustered,
}

/// Decides the store kind for a session mode on a given runtime.
///
/// | mode      | clustered runtime | result               |
/// |-----------|-------------------|----------------------|
/// | None      | any               | `None`               |
/// | Local     | any               | `Some(Local)`        |
/// | Clustered | yes               | `Some(Clustered)`    |
/// | Clustered | no                | `Some(Local)`, warns |
///
/// The clustered-without-cluster case is a deliberate downgrade rather than
/// an error; it is logged so operators can spot the deviation.
#[must_use]
pub fn select_store_kind(mode: SessionMode, clustered: bool) -> Option<SessionStoreKind> {
    match (mode, clustered) {
        (SessionMode::None, _) => None,
        (SessionMode::Local, _) => Some(SessionStoreKind::Local),
        (SessionMode::Clustered, true) => Some(SessionStoreKind::Clustered),
        (SessionMode::Clustered, false) => {
            tracing::warn!(
                "clustered session handling requested on a non-clustered runtime, using a local store"
            );
            Some(SessionStoreKind::Local)
        }
    }
}

/// Creates the session store for the configured mode, or `None` when
/// session handling is off.
#[must_use]
pub fn create_session_store(runtime: &RuntimeHandle, mode: SessionMode) -> Option<SessionStore> {
    let kind = select_store_kind(mode, runtime.is_clustered())?;
    tracing::debug!(kind = ?kind, "creating session store");
    Some(SessionStore::new(kind))
}

/// One client session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: String,
    data: Map<String, Value>,
}

impl Session {
    /// Creates a session with the given id and no data.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: Map::new(),
        }
    }

    /// Creates a session with a generated id.
    #[must_use]
    pub fn generate() -> Self {
        Self::new(Uuid::now_v7().to_string())
    }

    /// Returns the session id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the value stored under `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Stores a value under `key`, returning the previous value.
    pub fn put(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.data.insert(key.into(), value)
    }

    /// Returns `true` when the session holds no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Concurrent map of live sessions, tagged with its kind.
#[derive(Debug)]
pub struct SessionStore {
    kind: SessionStoreKind,
    sessions: Arc<DashMap<String, Session>>,
}

impl SessionStore {
    /// Creates an empty store of the given kind.
    #[must_use]
    pub fn new(kind: SessionStoreKind) -> Self {
        Self {
            kind,
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Returns the kind this store was created as.
    #[must_use]
    pub const fn kind(&self) -> SessionStoreKind {
        self.kind
    }

    /// Creates, registers, and returns a fresh session.
    #[must_use]
    pub fn create_session(&self) -> Session {
        let session = Session::generate();
        self.sessions.insert(session.id().to_string(), session.clone());
        session
    }

    /// Returns a copy of the session with the given id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Session> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Writes a session back to the store.
    pub fn put(&self, session: Session) {
        self.sessions.insert(session.id().to_string(), session);
    }

    /// Removes the session with the given id.
    pub fn remove(&self, id: &str) {
        self.sessions.remove(id);
    }

    /// Returns the number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` when no sessions are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
