//! Context propagation.
//!
//! Reads: call context values of the declared [`ContextKeys`].
//! Writes: one outbound header per declared key present in the context.
//!
//! Installed on every client, for unary and streaming calls alike.

use std::sync::Arc;

use callchain_core::{CallContext, ContextKeys};
use http::{HeaderMap, HeaderValue};

use crate::interceptor::{Interceptor, StreamRequest, StreamingFunc, UnaryFunc, UnaryRequest};

/// Copies declared context keys into outbound metadata.
#[derive(Clone, Debug)]
pub struct ContextPropagationInterceptor {
    keys: ContextKeys,
}

impl ContextPropagationInterceptor {
    pub fn new(keys: ContextKeys) -> Self {
        Self { keys }
    }

    fn copy(keys: &ContextKeys, context: &CallContext, headers: &mut HeaderMap) {
        for key in keys.iter() {
            let Some(value) = context.get(key.as_str()) else {
                continue;
            };
            match HeaderValue::from_str(value) {
                Ok(value) => {
                    headers.insert(key.clone(), value);
                }
                Err(_) => tracing::warn!(
                    key = %key,
                    "context value is not valid metadata, not propagated"
                ),
            }
        }
    }
}

impl Interceptor for ContextPropagationInterceptor {
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        let keys = self.keys.clone();
        Arc::new(move |mut request: UnaryRequest| {
            Self::copy(&keys, &request.context, &mut request.headers);
            next(request)
        })
    }

    fn wrap_streaming(&self, next: StreamingFunc) -> StreamingFunc {
        let keys = self.keys.clone();
        Arc::new(move |mut request: StreamRequest| {
            Self::copy(&keys, &request.context, &mut request.headers);
            next(request)
        })
    }
}
