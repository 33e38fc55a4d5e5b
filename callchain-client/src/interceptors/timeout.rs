//! Default deadline and slow-call warnings.
//!
//! Reads: the call deadline, header [`APP_NAME_HEADER`], the duration and
//! outcome of the call.
//! Writes: the call deadline, only when the caller set none; a `warn` record
//! for calls slower than the threshold, whatever their outcome.
//!
//! The deadline is only attached to the call context. Enforcing it is the job
//! of the innermost step of the client, so a timed-out call unwinds through
//! this interceptor as an ordinary `DeadlineExceeded` result.

use std::sync::Arc;
use std::time::Duration;

use callchain_core::{APP_NAME_HEADER, outcome_code};
use tokio::time::Instant;

use crate::interceptor::{Interceptor, UnaryFunc, UnaryRequest};

#[derive(Clone, Debug)]
pub struct TimeoutInterceptor {
    name: Arc<str>,
    address: Arc<str>,
    read_timeout: Duration,
    slow_threshold: Duration,
}

impl TimeoutInterceptor {
    /// A zero `read_timeout` imposes no deadline; a zero `slow_threshold`
    /// never warns.
    pub fn new(name: &str, address: &str, read_timeout: Duration, slow_threshold: Duration) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            read_timeout,
            slow_threshold,
        }
    }
}

impl Interceptor for TimeoutInterceptor {
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        let this = self.clone();
        Arc::new(move |mut request: UnaryRequest| {
            let this = this.clone();
            let next = next.clone();
            Box::pin(async move {
                let start = Instant::now();
                if request.context.deadline().is_none() && !this.read_timeout.is_zero() {
                    request.context.set_deadline(start + this.read_timeout);
                }
                let method = request.procedure.clone();
                let app = request
                    .headers
                    .get(APP_NAME_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);

                let result = next(request).await;

                let cost = start.elapsed();
                if !this.slow_threshold.is_zero() && cost > this.slow_threshold {
                    tracing::warn!(
                        name = %this.name,
                        addr = %this.address,
                        method = %method,
                        cost_ms = millis(cost),
                        threshold_ms = millis(this.slow_threshold),
                        app = app.as_deref(),
                        code = %outcome_code(&result),
                        "slow call"
                    );
                }
                result
            })
        })
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
