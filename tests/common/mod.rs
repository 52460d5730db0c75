//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use appkit::config::{AppConfig, ShutdownConfig};
use appkit::dispatcher::{BoxError, Processor};
use appkit::net::Acceptor;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::net::{TcpListener, TcpStream};

/// Processor that sleeps for `delay` and then bumps `counter`.
pub fn counting_processor(counter: &Arc<AtomicUsize>, delay: Duration) -> Processor {
    let counter = counter.clone();
    Processor::new(move |_, _| {
        let counter = counter.clone();
        async move {
            tokio::time::sleep(delay).await;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
}

/// Processor that fails after `delay`.
pub fn failing_processor(message: &'static str, delay: Duration) -> Processor {
    Processor::new(move |_, _| async move {
        tokio::time::sleep(delay).await;
        Err(BoxError::from(message))
    })
}

/// Shutdown timing suitable for tests: no grace delay, short deadline.
pub fn quick_shutdown() -> ShutdownConfig {
    ShutdownConfig {
        grace_delay_ms: 0,
        graceful_timeout_ms: 2_000,
    }
}

/// Config with every port disabled; tests inject their own listeners.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.name = "appkit-test".into();
    config.version = "9.9.9".into();
    config.env = "test".into();
    config.listener.host = "127.0.0.1".into();
    config.listener.grpc_port = 0;
    config.listener.http_port = 0;
    config.listener.http_admin_port = 0;
    config.shutdown = quick_shutdown();
    config
}

pub async fn local_listener() -> TcpListener {
    TcpListener::bind("127.0.0.1:0").await.unwrap()
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Acceptor whose socket breaks after `delay`, as when the fd is closed underneath it.
pub struct BrokenAcceptor {
    pub delay: Duration,
}

impl Acceptor for BrokenAcceptor {
    fn accept(&mut self) -> BoxFuture<'_, io::Result<(TcpStream, SocketAddr)>> {
        let delay = self.delay;
        async move {
            tokio::time::sleep(delay).await;
            Err(io::Error::other("listener socket closed"))
        }
        .boxed()
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(SocketAddr::from(([127, 0, 0, 1], 0)))
    }
}
