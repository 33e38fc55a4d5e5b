//! Distributed tracing.
//!
//! Reads: context [`TRACE_ID_KEY`] (an inbound trace to continue).
//! Writes: context [`TRACE_ID_KEY`], header `traceparent`, and a
//! `rpc.client` span around everything nested inside it.
//!
//! Runs outermost so every later interceptor logs inside the span and can
//! read the trace id from the call context.

use std::sync::Arc;

use callchain_core::{CallContext, TRACE_ID_KEY, TRACEPARENT_HEADER};
use http::HeaderValue;
use tracing::Instrument;

use crate::interceptor::{Interceptor, UnaryFunc, UnaryRequest};

/// W3C trace context of one outbound call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
}

impl TraceContext {
    /// Continue the trace found in `context`, or start a new one.
    ///
    /// Every call gets a fresh span id.
    pub fn continue_or_start(context: &CallContext) -> Self {
        let trace_id = context
            .get(TRACE_ID_KEY)
            .filter(|id| is_trace_id(id))
            .map(str::to_string)
            .unwrap_or_else(|| format!("{:032x}", rand::random::<u128>()));
        let span_id = format!("{:016x}", rand::random::<u64>());
        Self { trace_id, span_id }
    }

    /// Format: {version}-{trace_id}-{parent_id}-{trace_flags}
    pub fn traceparent(&self) -> String {
        format!("00-{}-{}-01", self.trace_id, self.span_id)
    }
}

fn is_trace_id(id: &str) -> bool {
    id.len() == 32 && id.bytes().all(|b| b.is_ascii_hexdigit()) && id.bytes().any(|b| b != b'0')
}

/// Starts or continues a trace for every unary call.
#[derive(Clone, Debug)]
pub struct TraceInterceptor {
    name: Arc<str>,
    address: Arc<str>,
}

impl TraceInterceptor {
    pub fn new(name: &str, address: &str) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

impl Interceptor for TraceInterceptor {
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        let name = self.name.clone();
        let address = self.address.clone();
        Arc::new(move |mut request: UnaryRequest| {
            let trace = TraceContext::continue_or_start(&request.context);
            request.context.insert(TRACE_ID_KEY, trace.trace_id.clone());
            if let Ok(value) = HeaderValue::from_str(&trace.traceparent()) {
                request.headers.insert(TRACEPARENT_HEADER, value);
            }

            let span = tracing::info_span!(
                "rpc.client",
                rpc.target = %name,
                rpc.method = %request.procedure,
                net.peer = %address,
                trace_id = %trace.trace_id,
            );
            let next = next.clone();
            Box::pin(async move { next(request).await }.instrument(span))
        })
    }
}
