//! Call options for per-request configuration.
//!
//! [`CallOptions`] carries what a single call adds on top of the client:
//! a timeout, custom headers and values of the caller's logical context.

use std::time::Duration;

use callchain_core::CallContext;
use http::{HeaderMap, HeaderName, HeaderValue};
use tokio_util::sync::CancellationToken;

/// Options for configuring individual calls.
///
/// # Example
///
/// ```ignore
/// use callchain_client::CallOptions;
/// use std::time::Duration;
///
/// let options = CallOptions::new()
///     .timeout(Duration::from_secs(5))
///     .header("authorization", "Bearer token123")
///     .value("x-uid", "42");
///
/// let response = client.invoke_unary("user.v1.UserService/Get", body, options).await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Deadline of this call, relative to the moment it is invoked.
    pub(crate) timeout: Option<Duration>,
    pub(crate) headers: HeaderMap,
    pub(crate) context: CallContext,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a deadline for this call.
    ///
    /// A call with its own deadline is left alone by the timeout interceptor.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Add a custom header for this call.
    ///
    /// # Panics
    ///
    /// Panics if the header name or value is invalid.
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        K::Error: std::fmt::Debug,
        V: TryInto<HeaderValue>,
        V::Error: std::fmt::Debug,
    {
        let name = name.try_into().expect("invalid header name");
        let value = value.try_into().expect("invalid header value");
        self.headers.insert(name, value);
        self
    }

    /// Try to add a custom header for this call.
    ///
    /// Returns `None` if the header name or value is invalid.
    pub fn try_header<K, V>(mut self, name: K, value: V) -> Option<Self>
    where
        K: TryInto<HeaderName>,
        V: TryInto<HeaderValue>,
    {
        let name = name.try_into().ok()?;
        let value = value.try_into().ok()?;
        self.headers.insert(name, value);
        Some(self)
    }

    /// Set a value in the caller's logical context.
    ///
    /// Values whose key is a declared context key are copied into outbound
    /// metadata by the context-propagation interceptor.
    pub fn value(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.context.insert(key, value);
        self
    }

    /// Let the caller abandon the call by firing `token`.
    ///
    /// A cancelled call fails with `Canceled` and unwinds through every
    /// interceptor, unlike dropping the call future.
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.context.set_cancel(token);
        self
    }

    /// Replace the logical context wholesale.
    pub fn context(mut self, context: CallContext) -> Self {
        self.context = context;
        self
    }

    pub fn get_headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Split into outbound headers and the call context, turning the timeout
    /// into an absolute deadline.
    pub(crate) fn into_parts(self) -> (HeaderMap, CallContext) {
        let context = match self.timeout {
            Some(timeout) => self.context.with_timeout(timeout),
            None => self.context,
        };
        (self.headers, context)
    }
}

/// Maximum timeout value in milliseconds (10 digits, about 115 days).
pub(crate) const MAX_TIMEOUT_MS: u128 = 9_999_999_999;

/// Convert a remaining call budget to the timeout header value.
///
/// Returns None if the budget is zero or too large to advertise.
pub(crate) fn duration_to_timeout_header(duration: Duration) -> Option<String> {
    let millis = duration.as_millis();
    if millis == 0 || millis > MAX_TIMEOUT_MS {
        return None;
    }
    Some(millis.to_string())
}
