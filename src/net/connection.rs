//! Endpoint serve loop and connection lifecycle.
//!
//! # Responsibilities
//! - Accept connections for one endpoint and serve each on its own task
//! - Track every connection so a graceful stop can wait for them
//! - Close connections on demand, dropping requests still in flight
//!
//! # State Transitions
//! ```text
//! Connection:  Active → Draining (graceful: finish in-flight, no keep-alive)
//!                     → Closed
//!              Active/Draining → Closed (force: dropped immediately)
//! ```
//!
//! # Design Decisions
//! - Accept errors that concern a single peer are skipped; any other
//!   accept error ends the loop and is returned to the caller
//! - A dropped connection future drops its handlers, so a forced close
//!   really stops the work instead of detaching it

use std::io;
use std::pin::pin;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::net::listener::{Acceptor, EndpointKind};

static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Stop controls shared by an endpoint's accept loop and its connections.
#[derive(Debug, Clone, Default)]
pub struct ServeControl {
    graceful: CancellationToken,
    force: CancellationToken,
    connections: TaskTracker,
}

impl ServeControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop accepting and let every connection finish its in-flight requests.
    pub fn shutdown(&self) {
        self.graceful.cancel();
    }

    /// Drop every connection now, including requests still being handled.
    pub fn force_close(&self) {
        self.graceful.cancel();
        self.force.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.graceful.is_cancelled()
    }

    /// Connections currently open.
    pub fn connections(&self) -> usize {
        self.connections.len()
    }

    /// Wait until every connection has closed.
    pub async fn closed(&self) {
        self.connections.close();
        self.connections.wait().await;
    }
}

/// Accept and serve connections until [`ServeControl::shutdown`].
///
/// Returns `Err` when the acceptor fails with an error that is not specific
/// to one peer; connections already open keep running.
pub async fn serve(
    kind: EndpointKind,
    mut acceptor: Box<dyn Acceptor>,
    router: Router,
    control: ServeControl,
) -> io::Result<()> {
    loop {
        let accepted = tokio::select! {
            biased;
            _ = control.graceful.cancelled() => return Ok(()),
            accepted = acceptor.accept() => accepted,
        };

        match accepted {
            Ok((stream, remote)) => {
                let id = ConnectionId::new();
                tracing::trace!(endpoint = %kind, connection_id = %id, remote = %remote, "Connection accepted");
                control
                    .connections
                    .spawn(serve_connection(id, stream, router.clone(), control.clone()));
            }
            Err(e) if is_connection_error(&e) => {
                tracing::debug!(endpoint = %kind, error = %e, "Peer dropped before accept");
            }
            Err(e) => {
                tracing::error!(endpoint = %kind, error = %e, "Accept failed");
                return Err(e);
            }
        }
    }
}

async fn serve_connection(
    id: ConnectionId,
    stream: TcpStream,
    router: Router,
    control: ServeControl,
) {
    let builder = Builder::new(TokioExecutor::new());
    let mut conn = pin!(builder.serve_connection_with_upgrades(
        TokioIo::new(stream),
        TowerToHyperService::new(router),
    ));
    let mut draining = false;

    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::trace!(connection_id = %id, error = %e, "Connection error");
                }
                break;
            }
            _ = control.force.cancelled() => {
                tracing::debug!(connection_id = %id, "Connection force closed");
                break;
            }
            _ = control.graceful.cancelled(), if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }

    tracing::trace!(connection_id = %id, "Connection closed");
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}
