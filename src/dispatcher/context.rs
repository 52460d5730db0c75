//! Per-dispatch context.
//!
//! # Responsibilities
//! - Carry cancellation from the caller into every processor
//! - Carry the request id and extra log key/values for correlation
//! - Carry an optional transaction handle the fan-out runs inside
//!
//! # Design Decisions
//! - Each processor gets a child token: cancelling the dispatch reaches all
//!   processors, a processor cancelling its own token does not reach siblings
//! - Transactions are attached explicitly, never sniffed from ambient state

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::dispatcher::error::DispatchError;

/// An externally managed transaction a fan-out can be wrapped in.
///
/// `within` must commit when `work` resolves to `Ok` and roll back otherwise,
/// returning the work's result (or its own commit/rollback failure).
pub trait Transaction: Send + Sync {
    fn within(
        self: Arc<Self>,
        work: BoxFuture<'static, Result<(), DispatchError>>,
    ) -> BoxFuture<'static, Result<(), DispatchError>>;
}

/// Caller-supplied context flowing unmodified into every processor of a dispatch.
#[derive(Clone, Default)]
pub struct DispatchContext {
    token: CancellationToken,
    request_id: Option<Arc<str>>,
    log_extra: Vec<(String, String)>,
    transaction: Option<Arc<dyn Transaction>>,
}

impl DispatchContext {
    /// Root context with its own cancellation token and nothing attached.
    pub fn background() -> Self {
        Self::default()
    }

    /// Use an existing cancellation token (e.g. the request's or the app's).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<Arc<str>>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_log_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.log_extra.push((key.into(), value.into()));
        self
    }

    pub fn with_transaction(mut self, transaction: Arc<dyn Transaction>) -> Self {
        self.transaction = Some(transaction);
        self
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn log_extra(&self) -> &[(String, String)] {
        &self.log_extra
    }

    /// Whether a transaction is attached to this context.
    pub fn has_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    pub fn transaction(&self) -> Option<&Arc<dyn Transaction>> {
        self.transaction.as_ref()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once this context is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Same context with a child cancellation token.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            request_id: self.request_id.clone(),
            log_extra: self.log_extra.clone(),
            transaction: self.transaction.clone(),
        }
    }

    /// Flatten the log extras into `k=v` pairs for a single log field.
    pub(crate) fn log_extra_fields(&self) -> String {
        self.log_extra
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Debug for DispatchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchContext")
            .field("request_id", &self.request_id)
            .field("log_extra", &self.log_extra)
            .field("transaction", &self.transaction.is_some())
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_cancellation_is_one_way() {
        let parent = DispatchContext::background().with_request_id("req-1");
        let first = parent.child();
        let second = parent.child();

        first.cancel();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(!parent.is_cancelled());

        parent.cancel();
        assert!(second.is_cancelled());
        assert_eq!(second.request_id(), Some("req-1"));
    }

    #[test]
    fn log_extra_fields_are_flattened() {
        let ctx = DispatchContext::background()
            .with_log_extra("user_id", "7")
            .with_log_extra("tenant", "acme");
        assert_eq!(ctx.log_extra_fields(), "user_id=7 tenant=acme");
    }
}
