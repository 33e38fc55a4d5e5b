use std::time::Duration;

use serde::Deserialize;

/// Default time allowed for establishing the connection.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(3);

/// Feature toggles and tunables of one client target.
///
/// Deserialized from the value of the client's configuration key:
///
/// ```toml
/// [grpc.user]
/// address = "127.0.0.1:9001"
/// enable_trace_interceptor = true
/// enable_timeout_interceptor = true
/// read_timeout = "2s"
/// slow_log_threshold = "500ms"
/// ```
///
/// Every field is optional. Toggles default to off and thresholds to zero,
/// which disables them.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Target address handed to the dialer.
    pub address: String,
    /// Start or continue a distributed trace on every call.
    pub enable_trace_interceptor: bool,
    /// Send the caller's application name in the `app` metadata entry.
    pub enable_app_name_interceptor: bool,
    /// Apply `read_timeout` to calls without a deadline and warn on slow calls.
    pub enable_timeout_interceptor: bool,
    /// Record per-call latency and outcome.
    pub enable_metric_interceptor: bool,
    /// Deadline imposed on calls that carry none. Zero imposes nothing.
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
    /// Calls slower than this are logged as warnings. Zero disables it.
    #[serde(with = "humantime_serde")]
    pub slow_log_threshold: Duration,
    /// Log every successful call, not only failures.
    pub enable_access_interceptor: bool,
    /// Include the request payload in access logs.
    pub enable_access_interceptor_req: bool,
    /// Include the response payload in access logs.
    pub enable_access_interceptor_res: bool,
    #[serde(with = "humantime_serde")]
    pub dial_timeout: Duration,
    /// Dial without transport security.
    pub enable_with_insecure: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: String::new(),
            enable_trace_interceptor: false,
            enable_app_name_interceptor: false,
            enable_timeout_interceptor: false,
            enable_metric_interceptor: false,
            read_timeout: Duration::ZERO,
            slow_log_threshold: Duration::ZERO,
            enable_access_interceptor: false,
            enable_access_interceptor_req: false,
            enable_access_interceptor_res: false,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            enable_with_insecure: false,
        }
    }
}

impl Config {
    /// A config pointing at `address` with every feature off.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }
}
