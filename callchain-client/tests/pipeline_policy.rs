//! End-to-end checks of the interceptor ordering policy, through the public
//! build path: settings, container, options, dialer, component.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use callchain_client::{
    BoxFuture, BuildError, CallContext, CallError, CallOptions, Code, Component, Config,
    ConfigError, Container, ContextKeys, DialTarget, Environment, ExecutionMode, FnInterceptor,
    Settings, Slot, Stage, StreamRequest, StreamResponse, TIMEOUT_HEADER, TRACEPARENT_HEADER,
    Transport, UnaryNext, UnaryRequest, UnaryResponse, with_interceptor,
    with_interceptor_before,
};
use bytes::Bytes;
use http::HeaderMap;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

/// What the transport saw and how it answers.
#[derive(Clone, Default)]
struct Recorder {
    delay: Duration,
    failure: Option<CallError>,
    seen: Arc<Mutex<Vec<UnaryRequest>>>,
    streams: Arc<Mutex<Vec<StreamRequest>>>,
}

impl Recorder {
    fn delayed(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn failing(failure: CallError) -> Self {
        Self {
            failure: Some(failure),
            ..Self::default()
        }
    }

    fn last(&self) -> UnaryRequest {
        self.seen.lock().unwrap().last().cloned().unwrap()
    }

    fn dialer(&self) -> impl Fn(&DialTarget) -> Result<Arc<dyn Transport>, BuildError> + use<> {
        let transport = self.clone();
        move |_target: &DialTarget| -> Result<Arc<dyn Transport>, BuildError> {
            Ok(Arc::new(transport.clone()))
        }
    }
}

impl Transport for Recorder {
    fn unary(&self, request: UnaryRequest) -> BoxFuture<'static, Result<UnaryResponse, CallError>> {
        self.seen.lock().unwrap().push(request.clone());
        let delay = self.delay;
        let failure = self.failure.clone();
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            match failure {
                Some(err) => Err(err),
                None => Ok(UnaryResponse::new(HeaderMap::new(), request.body)),
            }
        })
    }

    fn streaming(
        &self,
        request: StreamRequest,
    ) -> BoxFuture<'static, Result<StreamResponse, CallError>> {
        self.streams.lock().unwrap().push(request);
        Box::pin(async {
            Ok(StreamResponse::new(
                HeaderMap::new(),
                Box::pin(futures::stream::empty()),
            ))
        })
    }
}

fn environment(mode: ExecutionMode) -> Environment {
    Environment::new(
        mode,
        "order-svc",
        ContextKeys::new(["x-uid", "x-tenant"]).unwrap(),
    )
}

fn config(toml: &str) -> Config {
    let settings = Settings::from_toml_str(&format!("[grpc.user]\n{toml}")).unwrap();
    settings.unmarshal_key("grpc.user").unwrap()
}

fn build(config: Config, mode: ExecutionMode, transport: &Recorder) -> Component {
    Container::new("grpc.user", config, environment(mode))
        .build(&transport.dialer(), [])
        .unwrap()
}

fn stages(client: &Component) -> Vec<Stage> {
    client
        .pipeline()
        .slots()
        .into_iter()
        .filter_map(|slot| match slot {
            Slot::Stage(stage) => Some(stage),
            Slot::Extra(_) => None,
        })
        .collect()
}

/// One series from the local metrics recorder: name, labels, value.
type Series = (String, Vec<(String, String)>, DebugValue);

/// Run `call` to completion on a paused runtime, recording metrics locally.
fn with_metrics<F: Future>(call: F) -> (F::Output, Vec<Series>) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap();
    let output = metrics::with_local_recorder(&recorder, || runtime.block_on(call));

    let series = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(key, _, _, value)| {
            let key = key.key();
            let labels = key
                .labels()
                .map(|l| (l.key().to_string(), l.value().to_string()))
                .collect();
            (key.name().to_string(), labels, value)
        })
        .collect();
    (output, series)
}

fn label<'a>(labels: &'a [(String, String)], key: &str) -> Option<&'a str> {
    labels
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn calls_with_code(series: &[Series], code: &str) -> Option<u64> {
    series.iter().find_map(|(name, labels, value)| match value {
        DebugValue::Counter(n)
            if name == "client_handle_total" && label(labels, "code") == Some(code) =>
        {
            Some(*n)
        }
        _ => None,
    })
}

fn latencies(series: &[Series]) -> Vec<f64> {
    series
        .iter()
        .filter(|(name, _, _)| name == "client_handle_seconds")
        .flat_map(|(_, _, value)| match value {
            DebugValue::Histogram(values) => values.iter().map(|v| v.0).collect(),
            _ => Vec::new(),
        })
        .collect()
}

const EVERYTHING: &str = r#"
address = "127.0.0.1:9001"
enable_trace_interceptor = true
enable_app_name_interceptor = true
enable_timeout_interceptor = true
enable_metric_interceptor = true
read_timeout = "2s"
slow_log_threshold = "500ms"
"#;

#[test]
fn same_inputs_build_the_same_pipeline() {
    let transport = Recorder::default();
    let options = || {
        [
            with_interceptor_before(
                Stage::Timeout,
                "retry",
                FnInterceptor::unary(|req: UnaryRequest, next: UnaryNext| {
                    Box::pin(next.call(req))
                }),
            ),
            with_interceptor(
                "audit",
                FnInterceptor::unary(|req: UnaryRequest, next: UnaryNext| {
                    Box::pin(next.call(req))
                }),
            ),
        ]
    };
    let build = || {
        Container::new("grpc.user", config(EVERYTHING), environment(ExecutionMode::Development))
            .build(&transport.dialer(), options())
            .unwrap()
    };

    let first = build();
    let second = build();
    assert_eq!(first.pipeline().slots(), second.pipeline().slots());
    assert_eq!(first.pipeline().len(), 9);
}

#[test]
fn toggles_install_exactly_their_stages() {
    let transport = Recorder::default();
    for bits in 0u8..16 {
        for mode in [ExecutionMode::Production, ExecutionMode::Development] {
            let config = Config {
                enable_trace_interceptor: bits & 1 != 0,
                enable_app_name_interceptor: bits & 2 != 0,
                enable_timeout_interceptor: bits & 4 != 0,
                enable_metric_interceptor: bits & 8 != 0,
                ..Config::new("127.0.0.1:9001")
            };
            let mut expected = Vec::new();
            if config.enable_trace_interceptor {
                expected.push(Stage::Trace);
            }
            expected.push(Stage::ContextPropagation);
            expected.push(Stage::Logging);
            if mode.is_development() {
                expected.push(Stage::Debug);
            }
            if config.enable_app_name_interceptor {
                expected.push(Stage::AppName);
            }
            if config.enable_timeout_interceptor {
                expected.push(Stage::Timeout);
            }
            if config.enable_metric_interceptor {
                expected.push(Stage::Metrics);
            }

            let client = build(config, mode, &transport);
            assert_eq!(stages(&client), expected, "toggles {bits:04b} in {mode:?}");
        }
    }
}

#[test]
fn metrics_is_the_innermost_builtin() {
    let transport = Recorder::default();
    let client = Container::new("grpc.user", config(EVERYTHING), environment(ExecutionMode::Production))
        .build(
            &transport.dialer(),
            [with_interceptor(
                "audit",
                FnInterceptor::unary(|req: UnaryRequest, next: UnaryNext| {
                    Box::pin(next.call(req))
                }),
            )],
        )
        .unwrap();

    let slots = client.pipeline().slots();
    let metrics = client.pipeline().position(&Slot::Stage(Stage::Metrics)).unwrap();
    assert!(
        slots[..metrics]
            .iter()
            .all(|slot| matches!(slot, Slot::Stage(_)))
    );
    assert_eq!(slots[metrics + 1..], [Slot::extra("audit")]);
}

#[traced_test]
#[tokio::test]
async fn failures_are_logged_with_the_trace_id() {
    let transport = Recorder::failing(CallError::new(Code::Unavailable, "connection reset"));
    let client = build(
        config("address = \"127.0.0.1:9001\"\nenable_trace_interceptor = true"),
        ExecutionMode::Production,
        &transport,
    );

    let err = client
        .invoke_unary("user.v1.UserService/Get", Bytes::new(), CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err, CallError::new(Code::Unavailable, "connection reset"));

    let seen = transport.last();
    let traceparent = seen.headers.get(TRACEPARENT_HEADER).unwrap().to_str().unwrap();
    let trace_id = traceparent.split('-').nth(1).unwrap();
    assert_eq!(seen.context.get("trace-id"), Some(trace_id));
    assert!(logs_contain("client call failed"));
    assert!(logs_contain(trace_id));
}

#[tokio::test]
async fn declared_context_keys_reach_the_transport() {
    let transport = Recorder::default();
    let client = build(config(EVERYTHING), ExecutionMode::Production, &transport);

    client
        .invoke_unary(
            "user.v1.UserService/Get",
            Bytes::new(),
            CallOptions::new()
                .value("x-uid", "42")
                .value("x-tenant", "acme")
                .value("x-secret", "hidden"),
        )
        .await
        .unwrap();
    let seen = transport.last();
    assert_eq!(seen.headers.get("x-uid").unwrap(), "42");
    assert_eq!(seen.headers.get("x-tenant").unwrap(), "acme");
    assert!(seen.headers.get("x-secret").is_none());
    assert_eq!(seen.headers.get("app").unwrap(), "order-svc");

    client
        .open_stream(
            "user.v1.UserService/Watch",
            CallOptions::new().value("x-uid", "42"),
        )
        .await
        .unwrap();
    let stream = transport.streams.lock().unwrap().pop().unwrap();
    assert_eq!(stream.headers.get("x-uid").unwrap(), "42");
    assert_eq!(stream.headers.get("app").unwrap(), "order-svc");
}

#[tokio::test]
async fn context_keys_propagate_with_every_feature_disabled() {
    let transport = Recorder::default();
    let client = build(
        Config::new("127.0.0.1:9001"),
        ExecutionMode::Production,
        &transport,
    );
    assert_eq!(stages(&client), [Stage::ContextPropagation, Stage::Logging]);

    client
        .invoke_unary(
            "user.v1.UserService/Get",
            Bytes::new(),
            CallOptions::new().value("x-uid", "42").value("x-tenant", "acme"),
        )
        .await
        .unwrap();
    let seen = transport.last();
    assert_eq!(seen.headers.get("x-uid").unwrap(), "42");
    assert_eq!(seen.headers.get("x-tenant").unwrap(), "acme");
    assert!(seen.headers.get("app").is_none());
    assert!(seen.headers.get(TRACEPARENT_HEADER).is_none());
    assert!(seen.headers.get(TIMEOUT_HEADER).is_none());

    client
        .open_stream(
            "user.v1.UserService/Watch",
            CallOptions::new().value("x-tenant", "acme"),
        )
        .await
        .unwrap();
    let stream = transport.streams.lock().unwrap().pop().unwrap();
    assert_eq!(stream.headers.get("x-tenant").unwrap(), "acme");
}

#[tokio::test(start_paused = true)]
async fn read_timeout_bounds_calls_without_deadline() {
    let transport = Recorder::delayed(Duration::from_secs(10));
    let client = build(config(EVERYTHING), ExecutionMode::Production, &transport);

    let start = Instant::now();
    let err = client
        .invoke_unary("user.v1.UserService/Get", Bytes::new(), CallOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.code(), Code::DeadlineExceeded);
    assert!(start.elapsed() >= Duration::from_secs(2));
    assert!(start.elapsed() < Duration::from_secs(10));
    assert_eq!(transport.last().headers.get(TIMEOUT_HEADER).unwrap(), "2000");
}

#[test]
fn timed_out_calls_are_counted_with_their_budget() {
    let transport = Recorder::delayed(Duration::from_secs(10));
    let client = build(config(EVERYTHING), ExecutionMode::Production, &transport);

    let (result, series) = with_metrics(client.invoke_unary(
        "user.v1.UserService/Get",
        Bytes::new(),
        CallOptions::new(),
    ));

    assert_eq!(result.unwrap_err().code(), Code::DeadlineExceeded);
    assert_eq!(calls_with_code(&series, "deadline_exceeded"), Some(1));
    assert_eq!(calls_with_code(&series, "ok"), None);
    let latencies = latencies(&series);
    assert_eq!(latencies.len(), 1);
    assert!((latencies[0] - 2.0).abs() < 0.01, "latency {latencies:?}");
}

#[traced_test]
#[test]
fn cancelled_calls_unwind_through_every_stage() {
    let transport = Recorder::delayed(Duration::from_secs(1));
    let client = build(config(EVERYTHING), ExecutionMode::Development, &transport);
    let token = CancellationToken::new();

    let (result, series) = with_metrics(async {
        let call = client.invoke_unary(
            "user.v1.UserService/Get",
            Bytes::new(),
            CallOptions::new().cancel(token.clone()),
        );
        let cancel = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        };
        let (result, ()) = tokio::join!(call, cancel);
        result
    });

    assert_eq!(result.unwrap_err().code(), Code::Canceled);
    assert!(logs_contain("client call failed"));
    assert!(logs_contain("code=canceled"));
    assert_eq!(calls_with_code(&series, "canceled"), Some(1));
    let latencies = latencies(&series);
    assert_eq!(latencies.len(), 1);
    assert!((latencies[0] - 0.1).abs() < 0.01, "latency {latencies:?}");
}

#[tokio::test(start_paused = true)]
async fn caller_deadline_is_left_alone() {
    let transport = Recorder::delayed(Duration::from_secs(3));
    let client = build(config(EVERYTHING), ExecutionMode::Production, &transport);

    let deadline = Instant::now() + Duration::from_secs(5);
    let response = client
        .invoke_unary(
            "user.v1.UserService/Get",
            Bytes::from_static(b"ok"),
            CallOptions::new().context(CallContext::new().with_deadline(deadline)),
        )
        .await
        .unwrap();

    assert_eq!(response.body, Bytes::from_static(b"ok"));
    assert_eq!(transport.last().context.deadline(), Some(deadline));
    assert_eq!(transport.last().headers.get(TIMEOUT_HEADER).unwrap(), "5000");
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn slow_calls_warn_with_the_caller_identity() {
    let transport = Recorder::delayed(Duration::from_millis(600));
    let client = build(config(EVERYTHING), ExecutionMode::Production, &transport);

    client
        .invoke_unary("user.v1.UserService/Get", Bytes::new(), CallOptions::new())
        .await
        .unwrap();

    assert!(logs_contain("slow call"));
    assert!(logs_contain("order-svc"));
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn fast_calls_do_not_warn() {
    let transport = Recorder::delayed(Duration::from_millis(400));
    let client = build(config(EVERYTHING), ExecutionMode::Production, &transport);

    client
        .invoke_unary("user.v1.UserService/Get", Bytes::new(), CallOptions::new())
        .await
        .unwrap();

    assert!(!logs_contain("slow call"));
}

#[traced_test]
#[test]
fn broken_configuration_stops_the_build() {
    let settings = Settings::from_toml_str(
        r#"
        [grpc.user]
        address = ""
        enable_trace_interceptor = true

        [grpc.order]
        address = "127.0.0.1:9002"
        read_timeout = "soon"
        "#,
    )
    .unwrap();
    let env = environment(ExecutionMode::Production);

    let err = Container::load(&settings, "grpc.user", env.clone()).unwrap_err();
    assert!(matches!(err, ConfigError::MissingAddress { ref key } if key == "grpc.user"));

    let err = Container::load(&settings, "grpc.order", env.clone()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert_eq!(err.key(), Some("grpc.order"));
    assert!(logs_contain("failed to parse client config"));
    assert!(logs_contain("grpc.order"));

    let panic = std::panic::catch_unwind(AssertUnwindSafe(|| {
        Container::must_load(&settings, "grpc.order", env)
    }));
    assert!(panic.is_err());
}
