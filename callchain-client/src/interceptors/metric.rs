//! Client call metrics.
//!
//! Reads: outcome and duration of the call.
//! Writes: one observation per call to the process-wide recorder.
//!
//! Series:
//! - `client_handle_total{type, name, method, peer, code}`: counter
//! - `client_handle_seconds{type, name, method, peer}`: histogram
//!
//! Installed last among the built-in interceptors, so the duration covers
//! only the innermost part of the call.

use std::sync::Arc;

use callchain_core::outcome_code;
use metrics::{counter, histogram};
use tokio::time::Instant;

use crate::interceptor::{Interceptor, UnaryFunc, UnaryRequest};

const CALLS_TOTAL: &str = "client_handle_total";
const CALL_SECONDS: &str = "client_handle_seconds";
const CALL_TYPE: &str = "unary";

/// Records a count and a latency for every unary call.
#[derive(Clone, Debug)]
pub struct MetricInterceptor {
    name: String,
    peer: String,
}

impl MetricInterceptor {
    pub fn new(name: &str, address: &str) -> Self {
        Self {
            name: name.to_string(),
            peer: address.to_string(),
        }
    }

    fn observe(&self, method: String, code: &'static str, seconds: f64) {
        counter!(
            CALLS_TOTAL,
            "type" => CALL_TYPE,
            "name" => self.name.clone(),
            "method" => method.clone(),
            "peer" => self.peer.clone(),
            "code" => code
        )
        .increment(1);

        histogram!(
            CALL_SECONDS,
            "type" => CALL_TYPE,
            "name" => self.name.clone(),
            "method" => method,
            "peer" => self.peer.clone()
        )
        .record(seconds);
    }
}

impl Interceptor for MetricInterceptor {
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        let this = self.clone();
        Arc::new(move |request: UnaryRequest| {
            let this = this.clone();
            let next = next.clone();
            Box::pin(async move {
                let method = request.procedure.clone();
                let start = Instant::now();
                let result = next(request).await;
                this.observe(
                    method,
                    outcome_code(&result).as_str(),
                    start.elapsed().as_secs_f64(),
                );
                result
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::testing::{capture_unary, failing_unary};
    use bytes::Bytes;
    use callchain_core::{CallError, Code};
    use http::HeaderMap;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    fn label<'a>(labels: &'a [(String, String)], key: &str) -> Option<&'a str> {
        labels
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_records_count_and_latency_per_outcome() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let interceptor = MetricInterceptor::new("user", "127.0.0.1:9001");

        metrics::with_local_recorder(&recorder, || {
            futures::executor::block_on(async {
                let (ok, _) = capture_unary();
                let ok = interceptor.wrap_unary(ok);
                let failing = interceptor
                    .wrap_unary(failing_unary(CallError::new(Code::NotFound, "missing")));

                for _ in 0..2 {
                    ok(UnaryRequest::new("svc/Get", HeaderMap::new(), Bytes::new()))
                        .await
                        .unwrap();
                }
                failing(UnaryRequest::new("svc/Get", HeaderMap::new(), Bytes::new()))
                    .await
                    .unwrap_err();
            })
        });

        let mut ok_count = None;
        let mut not_found_count = None;
        let mut latencies = 0;
        for (key, _, _, value) in snapshotter.snapshot().into_vec() {
            let key = key.key();
            let labels: Vec<(String, String)> = key
                .labels()
                .map(|l| (l.key().to_string(), l.value().to_string()))
                .collect();
            assert_eq!(label(&labels, "type"), Some("unary"));
            assert_eq!(label(&labels, "name"), Some("user"));
            assert_eq!(label(&labels, "peer"), Some("127.0.0.1:9001"));
            assert_eq!(label(&labels, "method"), Some("svc/Get"));

            match (key.name(), value) {
                (CALLS_TOTAL, DebugValue::Counter(n)) => match label(&labels, "code") {
                    Some("ok") => ok_count = Some(n),
                    Some("not_found") => not_found_count = Some(n),
                    other => panic!("unexpected code label {other:?}"),
                },
                (CALL_SECONDS, DebugValue::Histogram(values)) => {
                    assert!(label(&labels, "code").is_none());
                    latencies += values.len();
                }
                (name, value) => panic!("unexpected series {name} {value:?}"),
            }
        }

        assert_eq!(ok_count, Some(2));
        assert_eq!(not_found_count, Some(1));
        assert_eq!(latencies, 3);
    }
}
