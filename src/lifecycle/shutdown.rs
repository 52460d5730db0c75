//! Shutdown coordination.
//!
//! # Responsibilities
//! - Register one named shutdown action per running endpoint/resource
//! - Wait for a termination signal, an explicit request, or an endpoint failure
//! - Run every action concurrently: grace delay, then graceful stop under
//!   its own deadline, force stop on timeout
//! - Drain tracked async work, then report every failure at once
//!
//! # State Transitions
//! ```text
//! Coordinator:  Active → ShuttingDown → Terminated
//! Action:       Running → Draining → Stopped
//!                                  → ForceStopped (deadline elapsed)
//!                                  → Failed (stop returned an error)
//! ```
//!
//! # Design Decisions
//! - Duplicate action names are rejected at registration, never overwritten
//! - Actions are independent: one failure never skips another action
//! - The deadline covers the graceful stop phase, not the grace delay

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::ShutdownConfig;
use crate::dispatcher::{AsyncTracker, BoxError};
use crate::lifecycle::signals;
use crate::observability::metrics;

type StopFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), BoxError>> + Send>;
type ForceFn = Box<dyn FnOnce() + Send>;

/// Named cleanup routine for one running resource.
pub struct ShutdownAction {
    stop: StopFn,
    force: Option<ForceFn>,
    grace_delay: Option<Duration>,
    deadline: Option<Duration>,
}

impl ShutdownAction {
    /// Action whose graceful stop is `stop`.
    pub fn new<F, Fut>(stop: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self {
            stop: Box::new(move || stop().boxed()),
            force: None,
            grace_delay: None,
            deadline: None,
        }
    }

    /// Pause before the graceful stop (defaults to `ShutdownConfig::grace_delay_ms`).
    pub fn grace_delay(mut self, delay: Duration) -> Self {
        self.grace_delay = Some(delay);
        self
    }

    /// Bound on the graceful stop (defaults to `ShutdownConfig::graceful_timeout_ms`).
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Called when the deadline elapses before the graceful stop finished.
    pub fn on_force(mut self, force: impl FnOnce() + Send + 'static) -> Self {
        self.force = Some(Box::new(force));
        self
    }
}

impl fmt::Debug for ShutdownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownAction")
            .field("grace_delay", &self.grace_delay)
            .field("deadline", &self.deadline)
            .field("force", &self.force.is_some())
            .finish()
    }
}

/// A shutdown action name was registered twice.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("shutdown action '{name}' already registered")]
pub struct RegistrationConflict {
    pub name: String,
}

/// A failure recorded in the aggregate shutdown result.
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("{name}: graceful stop exceeded {deadline:?}, force stopped")]
    Timeout { name: String, deadline: Duration },

    #[error("{name}: error during shutdown: {source}")]
    Action {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("{name}: serve loop failed: {reason}")]
    Endpoint { name: String, reason: String },
}

impl ShutdownError {
    pub fn name(&self) -> &str {
        match self {
            ShutdownError::Timeout { name, .. }
            | ShutdownError::Action { name, .. }
            | ShutdownError::Endpoint { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    Running,
    Draining,
    Stopped,
    ForceStopped,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    Active,
    ShuttingDown,
    Terminated,
}

/// What moved the coordinator out of `Active`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownCause {
    /// SIGINT/SIGTERM.
    Signal,
    /// `ShutdownTrigger::shutdown`.
    Requested,
    /// An endpoint's serve loop exited on its own.
    EndpointFailure(String),
}

#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub name: String,
    pub state: ActionState,
    pub elapsed: Duration,
}

/// Aggregate result of a shutdown.
#[derive(Debug)]
pub struct ShutdownReport {
    pub cause: ShutdownCause,
    /// One entry per registered action, in registration order.
    pub outcomes: Vec<ActionOutcome>,
    /// Endpoint failures first, then action failures in registration order.
    pub failures: Vec<ShutdownError>,
}

impl ShutdownReport {
    /// No endpoint failed and every action stopped gracefully in time.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn outcome(&self, name: &str) -> Option<&ActionOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }
}

struct Shared {
    requested: CancellationToken,
    endpoint_failures: Mutex<Vec<(String, String)>>,
    actions: Mutex<Vec<(String, ActionState)>>,
    state: watch::Sender<CoordinatorState>,
}

impl Shared {
    fn set_action_state(&self, name: &str, state: ActionState) {
        if let Some(entry) = lock(&self.actions).iter_mut().find(|(n, _)| n == name) {
            entry.1 = state;
        }
    }
}

/// Clonable handle that starts the shutdown from anywhere.
#[derive(Clone)]
pub struct ShutdownTrigger {
    shared: Arc<Shared>,
}

impl ShutdownTrigger {
    /// Request a shutdown (same path as a termination signal).
    pub fn shutdown(&self) {
        self.shared.requested.cancel();
    }

    /// Report that endpoint `name` stopped serving and start the shutdown.
    pub fn fail(&self, name: impl Into<String>, reason: impl Into<String>) {
        let name = name.into();
        let reason = reason.into();
        tracing::error!(endpoint = %name, reason = %reason, "Endpoint failed, shutting down");
        lock(&self.shared.endpoint_failures).push((name, reason));
        self.shared.requested.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.shared.requested.is_cancelled()
    }

    /// Resolves once shutdown was requested or an endpoint failed.
    pub async fn triggered(&self) {
        self.shared.requested.cancelled().await
    }

    /// Token cancelled when shutdown starts, for tasks that select on it.
    pub fn token(&self) -> CancellationToken {
        self.shared.requested.clone()
    }
}

impl fmt::Debug for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownTrigger")
            .field("triggered", &self.is_triggered())
            .finish()
    }
}

/// Runs every registered shutdown action once a shutdown is triggered.
pub struct ShutdownCoordinator {
    config: ShutdownConfig,
    actions: Mutex<Vec<(String, ShutdownAction)>>,
    trackers: Mutex<Vec<AsyncTracker>>,
    shared: Arc<Shared>,
}

impl ShutdownCoordinator {
    pub fn new(config: ShutdownConfig) -> Self {
        let (state, _) = watch::channel(CoordinatorState::Active);
        Self {
            config,
            actions: Mutex::new(Vec::new()),
            trackers: Mutex::new(Vec::new()),
            shared: Arc::new(Shared {
                requested: CancellationToken::new(),
                endpoint_failures: Mutex::new(Vec::new()),
                actions: Mutex::new(Vec::new()),
                state,
            }),
        }
    }

    /// Register `action` under `name`. A name already in use is rejected and
    /// the first registration is left untouched.
    pub fn register(
        &self,
        name: impl Into<String>,
        action: ShutdownAction,
    ) -> Result<(), RegistrationConflict> {
        let name = name.into();
        let mut actions = lock(&self.actions);
        if actions.iter().any(|(existing, _)| *existing == name) {
            tracing::error!(action = %name, "Shutdown action already registered");
            return Err(RegistrationConflict { name });
        }

        tracing::debug!(action = %name, "Shutdown action registered");
        lock(&self.shared.actions).push((name.clone(), ActionState::Running));
        actions.push((name, action));
        Ok(())
    }

    /// Wait for `tracker` to drain after every action has resolved.
    pub fn track_async(&self, tracker: AsyncTracker) {
        lock(&self.trackers).push(tracker);
    }

    pub fn is_registered(&self, name: &str) -> bool {
        lock(&self.actions).iter().any(|(existing, _)| existing == name)
    }

    /// Registered action names in registration order.
    pub fn registered(&self) -> Vec<String> {
        lock(&self.actions).iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn trigger(&self) -> ShutdownTrigger {
        ShutdownTrigger {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn state(&self) -> watch::Receiver<CoordinatorState> {
        self.shared.state.subscribe()
    }

    /// Live state of every registered action.
    pub fn action_states(&self) -> Vec<(String, ActionState)> {
        lock(&self.shared.actions).clone()
    }

    /// Wait for a termination signal, a shutdown request, or an endpoint failure.
    pub async fn wait(&self) -> ShutdownCause {
        let cause = tokio::select! {
            _ = signals::termination() => ShutdownCause::Signal,
            _ = self.shared.requested.cancelled() => {
                match lock(&self.shared.endpoint_failures).first() {
                    Some((name, _)) => ShutdownCause::EndpointFailure(name.clone()),
                    None => ShutdownCause::Requested,
                }
            }
        };
        tracing::info!(cause = ?cause, "Shutdown triggered");
        cause
    }

    /// Wait for a trigger, then shut everything down.
    pub async fn run(self) -> ShutdownReport {
        let cause = self.wait().await;
        self.shutdown(cause).await
    }

    /// Run every registered action, drain tracked async work, and report.
    pub async fn shutdown(self, cause: ShutdownCause) -> ShutdownReport {
        self.shared.requested.cancel();
        self.shared.state.send_replace(CoordinatorState::ShuttingDown);

        let actions = std::mem::take(&mut *lock(&self.actions));
        let tasks = actions.into_iter().map(|(name, action)| {
            let shared = Arc::clone(&self.shared);
            let grace_delay = action.grace_delay.unwrap_or_else(|| self.config.grace_delay());
            let deadline = action.deadline.unwrap_or_else(|| self.config.graceful_timeout());
            let task_name = name.clone();
            let handle = tokio::spawn(async move {
                run_action(&shared, &task_name, action, grace_delay, deadline).await
            });
            async move {
                match handle.await {
                    Ok(resolved) => resolved,
                    Err(join_error) => {
                        tracing::error!(action = %name, error = %join_error, "Shutdown action panicked");
                        let outcome = ActionOutcome {
                            name: name.clone(),
                            state: ActionState::Failed,
                            elapsed: Duration::ZERO,
                        };
                        let error = ShutdownError::Action {
                            name,
                            source: join_error.to_string().into(),
                        };
                        (outcome, Some(error))
                    }
                }
            }
        });
        let resolved = join_all(tasks).await;

        let trackers = std::mem::take(&mut *lock(&self.trackers));
        for tracker in trackers {
            let outstanding = tracker.outstanding();
            if outstanding > 0 {
                tracing::info!(outstanding, "Waiting for async work to drain");
            }
            tracker.drain().await;
        }

        let mut failures: Vec<ShutdownError> = lock(&self.shared.endpoint_failures)
            .drain(..)
            .map(|(name, reason)| ShutdownError::Endpoint { name, reason })
            .collect();
        let mut outcomes = Vec::with_capacity(resolved.len());
        for (outcome, error) in resolved {
            self.shared.set_action_state(&outcome.name, outcome.state);
            outcomes.push(outcome);
            failures.extend(error);
        }

        self.shared.state.send_replace(CoordinatorState::Terminated);
        if failures.is_empty() {
            tracing::info!("Shutdown complete");
        } else {
            for failure in &failures {
                tracing::error!(error = %failure, "Shutdown failure");
            }
        }

        ShutdownReport {
            cause,
            outcomes,
            failures,
        }
    }
}

impl fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("actions", &self.registered())
            .field("state", &*self.shared.state.borrow())
            .finish()
    }
}

async fn run_action(
    shared: &Shared,
    name: &str,
    action: ShutdownAction,
    grace_delay: Duration,
    deadline: Duration,
) -> (ActionOutcome, Option<ShutdownError>) {
    let started = Instant::now();
    shared.set_action_state(name, ActionState::Draining);

    if !grace_delay.is_zero() {
        tracing::info!(action = %name, delay = ?grace_delay, "Waiting for traffic to stop");
        tokio::time::sleep(grace_delay).await;
    }
    tracing::info!(action = %name, "Shutting down");

    let (state, error) = match tokio::time::timeout(deadline, (action.stop)()).await {
        Ok(Ok(())) => {
            tracing::info!(action = %name, "Gracefully stopped");
            (ActionState::Stopped, None)
        }
        Ok(Err(source)) => {
            tracing::error!(action = %name, error = %source, "Error during shutdown");
            let error = ShutdownError::Action {
                name: name.to_string(),
                source,
            };
            (ActionState::Failed, Some(error))
        }
        Err(_) => {
            if let Some(force) = action.force {
                force();
            }
            tracing::error!(action = %name, deadline = ?deadline, "Force stopped");
            let error = ShutdownError::Timeout {
                name: name.to_string(),
                deadline,
            };
            (ActionState::ForceStopped, Some(error))
        }
    };

    shared.set_action_state(name, state);
    metrics::record_shutdown_action(name, started);

    let outcome = ActionOutcome {
        name: name.to_string(),
        state,
        elapsed: started.elapsed(),
    };
    (outcome, error)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
