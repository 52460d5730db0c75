//! Endpoint listeners.
//!
//! # Responsibilities
//! - Bind every enabled endpoint before any serving starts
//! - Surface bind failures synchronously at initialization
//! - Hand bound sockets to the serve loops exactly once
//!
//! # Design Decisions
//! - A port of 0 disables the endpoint; it never means "ephemeral port"
//! - Bind order is fixed (rpc, public http, admin) so logs are stable
//! - Serve loops accept through the `Acceptor` trait, so an accept error
//!   surfaces to the caller instead of being retried forever

use std::fmt;
use std::io;
use std::net::SocketAddr;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::net::{TcpListener, TcpStream};

use crate::config::ListenerConfig;

/// One of the independently enabled network surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EndpointKind {
    /// Primary RPC surface.
    Rpc,
    /// Public data-plane HTTP surface.
    Http,
    /// Administrative/diagnostic HTTP surface.
    Admin,
}

impl EndpointKind {
    pub const ALL: [EndpointKind; 3] = [EndpointKind::Rpc, EndpointKind::Http, EndpointKind::Admin];

    /// Stable name used for logs and shutdown action registration.
    pub fn name(self) -> &'static str {
        match self {
            EndpointKind::Rpc => "rpc",
            EndpointKind::Http => "http.public",
            EndpointKind::Admin => "http.admin",
        }
    }

    fn port(self, config: &ListenerConfig) -> u16 {
        match self {
            EndpointKind::Rpc => config.grpc_port,
            EndpointKind::Http => config.http_port,
            EndpointKind::Admin => config.http_admin_port,
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind an endpoint's socket.
    #[error("failed to bind {endpoint} listener at {address}: {source}")]
    Bind {
        endpoint: EndpointKind,
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Source of inbound connections for one endpoint.
pub trait Acceptor: Send + 'static {
    /// Next inbound connection. An error the serve loop cannot skip ends it.
    fn accept(&mut self) -> BoxFuture<'_, io::Result<(TcpStream, SocketAddr)>>;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

impl Acceptor for TcpListener {
    fn accept(&mut self) -> BoxFuture<'_, io::Result<(TcpStream, SocketAddr)>> {
        TcpListener::accept(self).boxed()
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }
}

type BoxAcceptor = Box<dyn Acceptor>;

/// The bound sockets of every enabled endpoint.
#[derive(Default)]
pub struct ListenerSet {
    rpc: Option<BoxAcceptor>,
    http: Option<BoxAcceptor>,
    admin: Option<BoxAcceptor>,
}

impl ListenerSet {
    /// Empty set; every endpoint disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind every endpoint whose configured port is non-zero.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let mut set = Self::new();

        for kind in EndpointKind::ALL {
            let port = kind.port(config);
            if port == 0 {
                tracing::debug!(endpoint = %kind, "Endpoint disabled");
                continue;
            }

            let address = format!("{}:{}", config.host, port);
            let listener = TcpListener::bind(&address)
                .await
                .map_err(|source| ListenerError::Bind {
                    endpoint: kind,
                    address: address.clone(),
                    source,
                })?;

            tracing::info!(endpoint = %kind, address = %address, "Listener bound");
            *set.slot(kind) = Some(Box::new(listener));
        }

        Ok(set)
    }

    /// Use an already bound socket for `kind` (socket activation, tests).
    pub fn with_listener(self, kind: EndpointKind, listener: TcpListener) -> Self {
        self.with_acceptor(kind, listener)
    }

    /// Serve `kind` from any connection source.
    pub fn with_acceptor(mut self, kind: EndpointKind, acceptor: impl Acceptor) -> Self {
        *self.slot(kind) = Some(Box::new(acceptor));
        self
    }

    pub fn is_enabled(&self, kind: EndpointKind) -> bool {
        match kind {
            EndpointKind::Rpc => self.rpc.is_some(),
            EndpointKind::Http => self.http.is_some(),
            EndpointKind::Admin => self.admin.is_some(),
        }
    }

    /// Enabled endpoints in bind order.
    pub fn enabled(&self) -> Vec<EndpointKind> {
        EndpointKind::ALL
            .into_iter()
            .filter(|kind| self.is_enabled(*kind))
            .collect()
    }

    /// Local address of a bound endpoint.
    pub fn local_addr(&self, kind: EndpointKind) -> Option<SocketAddr> {
        let listener = match kind {
            EndpointKind::Rpc => self.rpc.as_ref(),
            EndpointKind::Http => self.http.as_ref(),
            EndpointKind::Admin => self.admin.as_ref(),
        };
        listener.and_then(|l| l.local_addr().ok())
    }

    /// Move the socket out for its serve loop.
    pub fn take(&mut self, kind: EndpointKind) -> Option<Box<dyn Acceptor>> {
        self.slot(kind).take()
    }

    fn slot(&mut self, kind: EndpointKind) -> &mut Option<BoxAcceptor> {
        match kind {
            EndpointKind::Rpc => &mut self.rpc,
            EndpointKind::Http => &mut self.http,
            EndpointKind::Admin => &mut self.admin,
        }
    }
}

impl fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("enabled", &self.enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(grpc_port: u16, http_port: u16, http_admin_port: u16) -> ListenerConfig {
        ListenerConfig {
            host: "127.0.0.1".into(),
            grpc_port,
            http_port,
            http_admin_port,
        }
    }

    #[tokio::test]
    async fn zero_ports_bind_nothing() {
        let set = ListenerSet::bind(&config(0, 0, 0)).await.unwrap();
        assert!(set.enabled().is_empty());
    }

    #[tokio::test]
    async fn occupied_port_is_a_bind_failure() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = ListenerSet::bind(&config(0, 0, port)).await.unwrap_err();
        let ListenerError::Bind { endpoint, .. } = err;
        assert_eq!(endpoint, EndpointKind::Admin);
    }

    #[tokio::test]
    async fn injected_listener_is_taken_once() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut set = ListenerSet::new().with_listener(EndpointKind::Http, listener);

        assert_eq!(set.enabled(), vec![EndpointKind::Http]);
        assert_eq!(set.local_addr(EndpointKind::Http), Some(addr));
        assert!(set.take(EndpointKind::Http).is_some());
        assert!(set.take(EndpointKind::Http).is_none());
    }
}
