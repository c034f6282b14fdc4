//! Shared runtime handle and ownership tracking.
//!
//! Portico never owns event loops directly; it runs on a shared concurrency
//! runtime reached through the [`Runtime`] trait. What it does own is the
//! *decision* of who closes that runtime: a [`RuntimeSupplier`] declares
//! [`RuntimeOwnership`] once per boot attempt, and the lifecycle manager
//! consults that tag when a boot step fails or the instance stops.
//!
//! - [`RuntimeOwnership::Owned`] - this process created the runtime and must
//!   close it exactly once on boot failure, and again on explicit stop.
//! - [`RuntimeOwnership::External`] - the runtime was handed in and must
//!   never be closed here, whatever happens.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{BootError, RuntimeCloseError};
use crate::options::PorticoOptions;
use crate::shutdown::ShutdownSignal;

/// Owned boxed future, the type-erased shape used at Portico's trait seams.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Whether this process is responsible for closing the shared runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeOwnership {
    /// The boot attempt created the runtime and must tear it down.
    Owned,
    /// The runtime was supplied from outside and is never closed here.
    External,
}

impl RuntimeOwnership {
    /// Returns `true` when this process must close the runtime.
    #[must_use]
    pub const fn is_owned(self) -> bool {
        matches!(self, Self::Owned)
    }
}

/// The shared concurrency runtime as Portico sees it.
///
/// Implementations expose only what the bootstrap needs: the cluster
/// capability consulted by the session store selector, and a close operation
/// for owned runtimes.
pub trait Runtime: Send + Sync {
    /// Whether the runtime participates in a cluster.
    fn is_clustered(&self) -> bool;

    /// Closes the runtime, releasing its pooled resources.
    ///
    /// Implementations must tolerate repeated calls; only the first does
    /// work.
    fn close(&self) -> BoxFuture<'_, Result<(), RuntimeCloseError>>;
}

/// Clonable handle to the shared runtime, tagged with its ownership.
///
/// The tag is decided once, when the supplier hands over the runtime, and is
/// read in exactly two places: the boot-failure cleanup and the explicit
/// stop path.
#[derive(Clone)]
pub struct RuntimeHandle {
    inner: Arc<dyn Runtime>,
    ownership: RuntimeOwnership,
}

impl RuntimeHandle {
    /// Wraps a runtime with its ownership tag.
    #[must_use]
    pub fn new(inner: Arc<dyn Runtime>, ownership: RuntimeOwnership) -> Self {
        Self { inner, ownership }
    }

    /// Returns the ownership tag stamped at boot.
    #[must_use]
    pub const fn ownership(&self) -> RuntimeOwnership {
        self.ownership
    }

    /// Whether the underlying runtime participates in a cluster.
    #[must_use]
    pub fn is_clustered(&self) -> bool {
        self.inner.is_clustered()
    }

    /// Closes the underlying runtime.
    ///
    /// Callers are expected to check [`ownership`](Self::ownership) first;
    /// the handle itself does not enforce it, since tests and embedders
    /// legitimately close externally-built runtimes they control.
    ///
    /// # Errors
    ///
    /// Returns the close failure reported by the runtime.
    pub async fn close(&self) -> Result<(), RuntimeCloseError> {
        self.inner.close().await
    }
}

impl fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeHandle")
            .field("ownership", &self.ownership)
            .field("clustered", &self.inner.is_clustered())
            .finish()
    }
}

/// How a boot attempt obtains its shared runtime.
///
/// The supplier is consulted exactly once per attempt. Its
/// [`ownership`](Self::ownership) declaration defaults to
/// [`RuntimeOwnership::External`]; only suppliers that create the runtime
/// themselves override it.
pub trait RuntimeSupplier: Send + Sync {
    /// Produces the runtime this boot attempt runs on.
    fn supply<'a>(
        &'a self,
        options: &'a PorticoOptions,
    ) -> BoxFuture<'a, Result<Arc<dyn Runtime>, BootError>>;

    /// Declares who closes the supplied runtime.
    fn ownership(&self) -> RuntimeOwnership {
        RuntimeOwnership::External
    }
}

/// Shared runtime backed by the ambient tokio executor.
///
/// Closing it fires a [`ShutdownSignal`] the embedding process observes to
/// wind down its executor; the tokio runtime itself outlives the close call
/// because this very future runs on it.
pub struct TokioRuntime {
    clustered: bool,
    shutdown: ShutdownSignal,
}

impl TokioRuntime {
    /// Creates a runtime facade, flagged clustered when the instance joined
    /// a cluster.
    #[must_use]
    pub fn new(clustered: bool) -> Self {
        Self {
            clustered,
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Returns the signal fired when the runtime is closed.
    #[must_use]
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }
}

impl Runtime for TokioRuntime {
    fn is_clustered(&self) -> bool {
        self.clustered
    }

    fn close(&self) -> BoxFuture<'_, Result<(), RuntimeCloseError>> {
        Box::pin(async move {
            if self.shutdown.is_triggered() {
                return Ok(());
            }
            tracing::info!("Closing shared runtime");
            self.shutdown.trigger();
            Ok(())
        })
    }
}

/// Supplier that builds a [`TokioRuntime`] for the boot attempt.
///
/// The runtime it produces belongs to the attempt, so ownership is
/// [`RuntimeOwnership::Owned`].
#[derive(Debug, Default)]
pub struct OwnedRuntimeSupplier;

impl OwnedRuntimeSupplier {
    /// Creates the supplier.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RuntimeSupplier for OwnedRuntimeSupplier {
    fn supply<'a>(
        &'a self,
        options: &'a PorticoOptions,
    ) -> BoxFuture<'a, Result<Arc<dyn Runtime>, BootError>> {
        Box::pin(async move {
            let runtime: Arc<dyn Runtime> = Arc::new(TokioRuntime::new(options.clustered));
            Ok(runtime)
        })
    }

    fn ownership(&self) -> RuntimeOwnership {
        RuntimeOwnership::Owned
    }
}

/// Supplier handing over a pre-built runtime the caller keeps responsibility
/// for.
pub struct ExternalRuntimeSupplier {
    runtime: Arc<dyn Runtime>,
}

impl ExternalRuntimeSupplier {
    /// Wraps an existing runtime.
    #[must_use]
    pub fn new(runtime: Arc<dyn Runtime>) -> Self {
        Self { runtime }
    }
}

impl RuntimeSupplier for ExternalRuntimeSupplier {
    fn supply<'a>(
        &'a self,
        _options: &'a PorticoOptions,
    ) -> BoxFuture<'a, Result<Arc<dyn Runtime>, BootError>> {
        let runtime = Arc::clone(&self.runtime);
        Box::pin(async move { Ok(runtime) })
    }
}
