//! The caller's logical context for one call.
//!
//! A [`CallContext`] carries string values set by the caller (or by an outer
//! interceptor) and the call deadline. Interceptors read it to decide what
//! to put into outbound metadata; the innermost step of the client enforces
//! the deadline and observes the cancellation token.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Context key holding the active trace id.
///
/// Written by the trace interceptor, read by logging.
pub const TRACE_ID_KEY: &str = "trace-id";

/// Outbound metadata name carrying the caller's application name.
pub const APP_NAME_HEADER: &str = "app";

/// Outbound metadata name carrying the W3C trace context.
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Values, deadline and cancellation token of a single call.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    values: BTreeMap<String, String>,
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_value(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a value. Keys are case-insensitive.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.values
            .insert(key.as_ref().to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The absolute time after which the call is cancelled, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn set_deadline(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.set_deadline(deadline);
        self
    }

    /// Set the deadline to `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Time left before the deadline; `Some(Duration::ZERO)` once it passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Token the caller fires to abandon the call.
    ///
    /// Dropping the call future does not fire it; only an explicit
    /// [`CancellationToken::cancel`] ends the call with `Canceled`.
    pub fn cancel_token(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }

    pub fn set_cancel(&mut self, token: CancellationToken) {
        self.cancel = Some(token);
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.set_cancel(token);
        self
    }

    /// Whether the caller has already cancelled the call.
    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}
