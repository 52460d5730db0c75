//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration and bind every enabled endpoint
//! - Start one serve loop per endpoint, each with its shutdown action
//! - Hand control to the shutdown coordinator until the process should exit
//!
//! # Design Decisions
//! - Fail fast: config and bind errors abort before any traffic is accepted
//! - A serve loop that exits before shutdown was requested is a failure
//!   and triggers the same path as a termination signal
//! - A serve task that errors, panics or is aborted also reports through
//!   the shutdown trigger, via a supervisor watching its join handle
//! - Graceful stop ends the accept loop and drains open connections;
//!   force stop drops every connection, cancelling in-flight handlers

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::admin::{setup_admin_router, AdminState};
use crate::config::{validate_config, AppConfig, ConfigError};
use crate::dispatcher::{self, payload, BoxError, Dispatcher, Event};
use crate::http::public_router;
use crate::lifecycle::shutdown::{
    CoordinatorState, RegistrationConflict, ShutdownAction, ShutdownCoordinator, ShutdownReport,
    ShutdownTrigger,
};
use crate::net::{self, Acceptor, EndpointKind, ListenerError, ListenerSet, ServeControl};
use crate::observability::metrics;

/// Error type for application startup.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("failed to install metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error(transparent)]
    Registration(#[from] RegistrationConflict),
}

/// Dispatched asynchronously once every endpoint is serving.
pub const APP_STARTED: Event = Event::from_static("app.started");

/// Payload of [`APP_STARTED`].
#[derive(Debug, Clone)]
pub struct AppStarted {
    pub name: String,
    pub version: String,
    pub env: String,
    pub endpoints: Vec<(EndpointKind, SocketAddr)>,
}

/// A service: its endpoints, its dispatcher, and its shutdown sequence.
pub struct App {
    config: AppConfig,
    listeners: ListenerSet,
    coordinator: ShutdownCoordinator,
    dispatcher: Dispatcher,
    rpc_router: Option<Router>,
    public_routes: Router,
    admin_routes: Router,
    metrics: Option<PrometheusHandle>,
}

impl App {
    /// Validate `config` and bind every enabled endpoint.
    pub async fn new(config: AppConfig) -> Result<Self, AppError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let listeners = ListenerSet::bind(&config.listener).await?;
        Self::with_listeners(config, listeners)
    }

    /// Build around already bound sockets; the configured ports are ignored.
    pub fn with_listeners(config: AppConfig, listeners: ListenerSet) -> Result<Self, AppError> {
        tracing::info!(
            name = %config.name,
            version = %config.version,
            env = %config.env,
            endpoints = ?listeners.enabled(),
            "App initialized"
        );

        let metrics = if config.observability.metrics_enabled {
            Some(metrics::init_metrics()?)
        } else {
            None
        };

        Ok(Self {
            coordinator: ShutdownCoordinator::new(config.shutdown.clone()),
            config,
            listeners,
            dispatcher: dispatcher::global(),
            rpc_router: None,
            public_routes: Router::new(),
            admin_routes: Router::new(),
            metrics,
        })
    }

    /// Use `dispatcher` instead of the process-wide default.
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Services exposed on the RPC endpoint.
    pub fn with_rpc_router(mut self, router: Router) -> Self {
        self.rpc_router = Some(router);
        self
    }

    /// Routes merged into the public HTTP endpoint.
    pub fn with_public_router(mut self, router: Router) -> Self {
        self.public_routes = self.public_routes.merge(router);
        self
    }

    /// Routes merged into the admin endpoint.
    pub fn with_admin_router(mut self, router: Router) -> Self {
        self.admin_routes = self.admin_routes.merge(router);
        self
    }

    /// Register an extra resource to stop at shutdown.
    ///
    /// Fails immediately when `name` is taken, including the names of
    /// enabled endpoints.
    pub fn with_shutdown_action(
        self,
        name: impl Into<String>,
        action: ShutdownAction,
    ) -> Result<Self, AppError> {
        let name = name.into();
        let reserved = self
            .listeners
            .enabled()
            .into_iter()
            .any(|kind| kind.name() == name);
        if reserved {
            tracing::error!(action = %name, "Shutdown action name reserved by an endpoint");
            return Err(RegistrationConflict { name }.into());
        }

        self.coordinator.register(name, action)?;
        Ok(self)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handle to start the shutdown without a signal.
    pub fn trigger(&self) -> ShutdownTrigger {
        self.coordinator.trigger()
    }

    pub fn state(&self) -> watch::Receiver<CoordinatorState> {
        self.coordinator.state()
    }

    pub fn local_addr(&self, kind: EndpointKind) -> Option<SocketAddr> {
        self.listeners.local_addr(kind)
    }

    /// Serve every enabled endpoint until shutdown, then stop them all.
    pub async fn run(mut self) -> Result<ShutdownReport, AppError> {
        let endpoints = self.listeners.enabled();
        let addrs: Vec<(EndpointKind, SocketAddr)> = endpoints
            .iter()
            .filter_map(|&kind| Some((kind, self.listeners.local_addr(kind)?)))
            .collect();

        for &kind in &endpoints {
            let Some(acceptor) = self.listeners.take(kind) else {
                continue;
            };
            let router = self.router_for(kind, &endpoints);
            let action = serve_endpoint(kind, acceptor, router, self.coordinator.trigger());
            self.coordinator.register(kind.name(), action)?;
        }

        self.coordinator.track_async(self.dispatcher.tracker().clone());

        if let Some(handle) = self.metrics.clone() {
            let interval = Duration::from_millis(self.config.observability.metrics_upkeep_ms);
            metrics::spawn_upkeep(handle, interval, self.coordinator.trigger().token());
        }

        let started = AppStarted {
            name: self.config.name.clone(),
            version: self.config.version.clone(),
            env: self.config.env.clone(),
            endpoints: addrs,
        };
        self.dispatcher.dispatch_async(APP_STARTED, payload(started));

        let report = self.coordinator.run().await;
        if report.is_clean() {
            tracing::info!(cause = ?report.cause, "App stopped");
        } else {
            tracing::error!(
                cause = ?report.cause,
                failures = report.failures.len(),
                "App stopped with failures"
            );
        }
        Ok(report)
    }

    fn router_for(&mut self, kind: EndpointKind, endpoints: &[EndpointKind]) -> Router {
        match kind {
            EndpointKind::Rpc => {
                let router = self.rpc_router.take().unwrap_or_else(|| {
                    tracing::warn!("RPC endpoint enabled without services");
                    Router::new()
                });
                router.layer(TraceLayer::new_for_http())
            }
            EndpointKind::Http => {
                public_router(&self.config, std::mem::take(&mut self.public_routes))
            }
            EndpointKind::Admin => {
                let state = AdminState {
                    name: self.config.name.clone(),
                    version: self.config.version.clone(),
                    env: self.config.env.clone(),
                    endpoints: endpoints.to_vec(),
                    dispatcher: self.dispatcher.clone(),
                    coordinator_state: self.coordinator.state(),
                    metrics: self.metrics.clone(),
                };
                setup_admin_router(state, std::mem::take(&mut self.admin_routes))
            }
        }
    }
}

/// Spawn the serve loop for one endpoint and build its shutdown action.
fn serve_endpoint(
    kind: EndpointKind,
    acceptor: Box<dyn Acceptor>,
    router: Router,
    trigger: ShutdownTrigger,
) -> ShutdownAction {
    let control = ServeControl::new();

    tracing::info!(endpoint = %kind, "Serving");
    let task = tokio::spawn(net::serve(kind, acceptor, router, control.clone()));

    let watched = control.clone();
    let supervisor = tokio::spawn(async move {
        match task.await {
            Ok(Err(e)) => trigger.fail(kind.name(), e.to_string()),
            Err(e) if e.is_panic() => trigger.fail(kind.name(), "serve loop panicked"),
            Err(_) => trigger.fail(kind.name(), "serve loop aborted"),
            Ok(Ok(())) if !watched.is_shutting_down() => {
                trigger.fail(kind.name(), "serve loop exited unexpectedly")
            }
            Ok(Ok(())) => tracing::debug!(endpoint = %kind, "Serve loop finished"),
        }
    });

    let force = control.clone();
    ShutdownAction::new(move || async move {
        control.shutdown();
        if let Err(e) = supervisor.await {
            return Err(BoxError::from(e));
        }
        control.closed().await;
        tracing::debug!(endpoint = %kind, "Connections drained");
        Ok::<(), BoxError>(())
    })
    .on_force(move || {
        tracing::warn!(endpoint = %kind, connections = force.connections(), "Force closing connections");
        force.force_close();
    })
}
