//! The HTTP server owning the listening socket.
//!
//! Requests are buffered at ingress, so everything behind the server works
//! on complete bodies. The accept loop runs in a background task owned by
//! the returned [`ServerHandle`]; stopping is idempotent and drains
//! in-flight connections with a bounded wait.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use portico_core::{BootError, ConnectionTracker, ShutdownSignal};

use crate::router::Router;
use crate::types::{Response, ResponseExt};

/// How long `stop` waits for in-flight connections to finish.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Starts HTTP servers for assembled routers.
pub struct HttpServer;

impl HttpServer {
    /// Binds the address and starts serving in a background task.
    ///
    /// # Errors
    ///
    /// Returns [`BootError::Bind`] when the socket cannot be bound.
    pub async fn start(router: Router, addr: SocketAddr) -> Result<ServerHandle, BootError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| BootError::bind(addr, source))?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| BootError::bind(addr, source))?;

        let shutdown = ShutdownSignal::new();
        let tracker = ConnectionTracker::new();
        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::new(router),
            shutdown.clone(),
            tracker.clone(),
        ));

        tracing::info!(addr = %local_addr, "HTTP server started");
        Ok(ServerHandle {
            local_addr,
            shutdown,
            tracker,
            accept_task: parking_lot::Mutex::new(Some(accept_task)),
        })
    }
}

/// Handle to a running server.
///
/// Dropping the handle does not stop the server; call
/// [`stop`](ServerHandle::stop).
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: ShutdownSignal,
    tracker: ConnectionTracker,
    accept_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl ServerHandle {
    /// Returns the address the server is actually bound to.
    ///
    /// Differs from the configured address when port `0` was requested.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns `true` once [`stop`](ServerHandle::stop) has run.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.accept_task.lock().is_none()
    }

    /// Stops accepting connections and drains in-flight ones.
    ///
    /// Safe to call any number of times; every call after the first returns
    /// immediately.
    pub async fn stop(&self) {
        let task = self.accept_task.lock().take();
        let task = match task {
            Some(task) => task,
            None => return,
        };

        self.shutdown.trigger();
        if let Err(error) = task.await {
            tracing::error!(%error, "accept loop terminated abnormally");
        }

        if tokio::time::timeout(DRAIN_TIMEOUT, self.tracker.drained())
            .await
            .is_err()
        {
            tracing::warn!(
                active = self.tracker.active_connections(),
                "connections still open after drain deadline"
            );
        }

        tracing::info!("HTTP server was stopped");
    }
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("local_addr", &self.local_addr)
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

/// Accepts connections until the shutdown signal fires.
async fn accept_loop(
    listener: TcpListener,
    router: Arc<Router>,
    shutdown: ShutdownSignal,
    tracker: ConnectionTracker,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, remote_addr)) => {
                        let router = Arc::clone(&router);
                        let token = tracker.acquire();
                        let shutdown = shutdown.clone();

                        tokio::spawn(async move {
                            if let Err(error) =
                                handle_connection(stream, router, shutdown).await
                            {
                                tracing::debug!(%remote_addr, %error, "connection ended with an error");
                            }
                            drop(token);
                        });
                    }
                    Err(error) => {
                        tracing::error!(%error, "failed to accept connection");
                    }
                }
            }

            _ = shutdown.recv() => {
                tracing::debug!("shutdown signal received, no longer accepting connections");
                break;
            }
        }
    }
}

/// Serves one connection, racing it against the shutdown signal.
async fn handle_connection(
    stream: TcpStream,
    router: Arc<Router>,
    shutdown: ShutdownSignal,
) -> Result<(), hyper::Error> {
    let io = TokioIo::new(stream);
    let service = service_fn(move |request: hyper::Request<Incoming>| {
        let router = Arc::clone(&router);
        async move { Ok::<_, Infallible>(handle_request(&router, request).await) }
    });

    let conn = http1::Builder::new().serve_connection(io, service);

    tokio::select! {
        result = conn => result,
        _ = shutdown.recv() => Ok(()),
    }
}

/// Buffers the request body and dispatches through the router.
async fn handle_request(router: &Router, request: hyper::Request<Incoming>) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(error) => {
            tracing::debug!(%error, "failed to buffer request body");
            return Response::text(StatusCode::BAD_REQUEST, "malformed request body");
        }
    };

    let request = http::Request::from_parts(parts, Full::new(bytes));
    router.dispatch(request).await
}
