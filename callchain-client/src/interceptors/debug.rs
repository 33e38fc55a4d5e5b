//! Human-readable call tracing for development runs.
//!
//! Reads: outcome and duration of the call.
//! Writes: one log line per call.
//!
//! Only installed when the process runs in development mode.

use std::sync::Arc;

use callchain_core::outcome_code;
use tokio::time::Instant;

use crate::interceptor::{Interceptor, UnaryFunc, UnaryRequest};

#[derive(Clone, Debug)]
pub struct DebugInterceptor {
    name: Arc<str>,
    address: Arc<str>,
}

impl DebugInterceptor {
    pub fn new(name: &str, address: &str) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

impl Interceptor for DebugInterceptor {
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        let name = self.name.clone();
        let address = self.address.clone();
        Arc::new(move |request: UnaryRequest| {
            let name = name.clone();
            let address = address.clone();
            let next = next.clone();
            Box::pin(async move {
                let method = request.procedure.clone();
                let start = Instant::now();
                let result = next(request).await;
                let outcome = match &result {
                    Ok(_) => outcome_code(&result).to_string(),
                    Err(err) => err.to_string(),
                };
                tracing::info!(
                    "[{name}] {address} {method} -> {outcome} ({:?})",
                    start.elapsed()
                );
                result
            })
        })
    }
}
