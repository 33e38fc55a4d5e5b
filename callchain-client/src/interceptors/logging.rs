//! Call logging.
//!
//! Reads: context [`TRACE_ID_KEY`], the declared context keys, the outcome
//! and the duration of the call.
//! Writes: log records only.
//!
//! Failed calls are always logged at `error`. Successful calls are logged at
//! `info` when access logging is enabled, optionally with payloads.

use std::fmt::Write as _;
use std::sync::Arc;

use bytes::Bytes;
use callchain_core::{CallContext, Code, ContextKeys, TRACE_ID_KEY};
use tokio::time::Instant;

use crate::Config;
use crate::interceptor::{Interceptor, UnaryFunc, UnaryRequest};

/// Payload bytes kept in a log record.
const MAX_LOGGED_PAYLOAD: usize = 512;

/// Which successful calls are logged and with what.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccessLog {
    pub enabled: bool,
    pub request: bool,
    pub response: bool,
}

impl AccessLog {
    pub fn from_config(config: &Config) -> Self {
        Self {
            enabled: config.enable_access_interceptor,
            request: config.enable_access_interceptor_req,
            response: config.enable_access_interceptor_res,
        }
    }
}

/// Logs failures, and successes when access logging is on.
#[derive(Clone, Debug)]
pub struct LoggingInterceptor {
    name: Arc<str>,
    address: Arc<str>,
    access: AccessLog,
    keys: ContextKeys,
}

impl LoggingInterceptor {
    pub fn new(name: &str, address: &str, access: AccessLog, keys: ContextKeys) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            access,
            keys,
        }
    }
}

/// `key=value` pairs of the declared keys present in the context.
fn propagated_fields(keys: &ContextKeys, context: &CallContext) -> String {
    let mut out = String::new();
    for key in keys.iter() {
        if let Some(value) = context.get(key.as_str()) {
            if !out.is_empty() {
                out.push(' ');
            }
            let _ = write!(out, "{key}={value}");
        }
    }
    out
}

fn payload(body: &Bytes) -> String {
    let end = body.len().min(MAX_LOGGED_PAYLOAD);
    String::from_utf8_lossy(&body[..end]).into_owned()
}

impl Interceptor for LoggingInterceptor {
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        let this = self.clone();
        Arc::new(move |request: UnaryRequest| {
            let this = this.clone();
            let next = next.clone();
            Box::pin(async move {
                let method = request.procedure.clone();
                let trace_id = request.context.get(TRACE_ID_KEY).map(str::to_string);
                let fields = propagated_fields(&this.keys, &request.context);
                let req = (this.access.enabled && this.access.request).then(|| payload(&request.body));

                let start = Instant::now();
                let result = next(request).await;
                let cost_ms = start.elapsed().as_secs_f64() * 1000.0;

                match &result {
                    Err(err) => tracing::error!(
                        name = %this.name,
                        addr = %this.address,
                        method = %method,
                        cost_ms,
                        code = %err.code(),
                        trace_id = trace_id.as_deref(),
                        ctx = %fields,
                        error = %err,
                        "client call failed"
                    ),
                    Ok(response) if this.access.enabled => {
                        let res = this.access.response.then(|| payload(&response.body));
                        tracing::info!(
                            name = %this.name,
                            addr = %this.address,
                            method = %method,
                            cost_ms,
                            code = %Code::Ok,
                            trace_id = trace_id.as_deref(),
                            ctx = %fields,
                            req = req.as_deref(),
                            res = res.as_deref(),
                            "access"
                        );
                    }
                    Ok(_) => {}
                }
                result
            })
        })
    }
}
