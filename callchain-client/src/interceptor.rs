//! Interceptors wrap outbound calls.
//!
//! An interceptor receives the "next" function of the chain and returns a new
//! function that runs its own logic before and/or after calling it. Returning
//! without calling `next` aborts the call.
//!
//! Two call shapes are wrapped independently:
//! - unary calls ([`UnaryFunc`]): one request, one response
//! - streaming calls ([`StreamingFunc`]): opening a long-lived exchange
//!
//! # Example
//!
//! ```ignore
//! use callchain_client::{FnInterceptor, UnaryNext, UnaryRequest, with_interceptor};
//!
//! let audit = FnInterceptor::unary(|req: UnaryRequest, next: UnaryNext| {
//!     Box::pin(async move {
//!         tracing::info!(method = %req.procedure, "audited call");
//!         next.call(req).await
//!     })
//! });
//!
//! let client = container.build(&dialer, [with_interceptor("audit", audit)])?;
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use callchain_core::{CallContext, CallError};
use futures::stream::BoxStream;
use http::HeaderMap;

/// Type alias for a boxed future returning a result.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A unary request as seen by interceptors.
#[derive(Debug, Clone)]
pub struct UnaryRequest {
    /// The procedure being called (e.g., "package.Service/Method").
    pub procedure: String,
    /// Outbound metadata.
    pub headers: HeaderMap,
    /// Caller's logical context and deadline.
    pub context: CallContext,
    /// Encoded request message.
    pub body: Bytes,
}

impl UnaryRequest {
    pub fn new(procedure: impl Into<String>, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            procedure: procedure.into(),
            headers,
            context: CallContext::default(),
            body,
        }
    }

    pub fn with_context(mut self, context: CallContext) -> Self {
        self.context = context;
        self
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }
}

/// A unary response as seen by interceptors.
#[derive(Debug, Clone, Default)]
pub struct UnaryResponse {
    /// Response metadata.
    pub headers: HeaderMap,
    /// Encoded response message.
    pub body: Bytes,
}

impl UnaryResponse {
    pub fn new(headers: HeaderMap, body: Bytes) -> Self {
        Self { headers, body }
    }
}

/// The opening of a streaming call.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub procedure: String,
    pub headers: HeaderMap,
    pub context: CallContext,
}

impl StreamRequest {
    pub fn new(procedure: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            procedure: procedure.into(),
            headers,
            context: CallContext::default(),
        }
    }

    pub fn with_context(mut self, context: CallContext) -> Self {
        self.context = context;
        self
    }
}

/// An established streaming call: response metadata plus inbound messages.
pub struct StreamResponse {
    pub headers: HeaderMap,
    pub messages: BoxStream<'static, Result<Bytes, CallError>>,
}

impl StreamResponse {
    pub fn new(headers: HeaderMap, messages: BoxStream<'static, Result<Bytes, CallError>>) -> Self {
        Self { headers, messages }
    }
}

impl fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamResponse")
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// The signature of a unary call.
///
/// Interceptors wrap this function to add logic before and after the call.
pub type UnaryFunc =
    Arc<dyn Fn(UnaryRequest) -> BoxFuture<'static, Result<UnaryResponse, CallError>> + Send + Sync>;

/// The signature of opening a streaming call.
pub type StreamingFunc = Arc<
    dyn Fn(StreamRequest) -> BoxFuture<'static, Result<StreamResponse, CallError>> + Send + Sync,
>;

/// The "next" function in the unary chain.
///
/// Call this to proceed to the next interceptor or the actual call.
#[derive(Clone)]
pub struct UnaryNext {
    inner: UnaryFunc,
}

impl UnaryNext {
    pub(crate) fn new(inner: UnaryFunc) -> Self {
        Self { inner }
    }

    pub async fn call(self, request: UnaryRequest) -> Result<UnaryResponse, CallError> {
        (self.inner)(request).await
    }
}

/// An interceptor that can wrap unary and streaming calls.
///
/// Both methods default to passing `next` through untouched, so an
/// interceptor only implements the shapes it cares about.
pub trait Interceptor: Send + Sync {
    /// Wrap a unary call.
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        next
    }

    /// Wrap the opening of a streaming call.
    fn wrap_streaming(&self, next: StreamingFunc) -> StreamingFunc {
        next
    }
}

impl<T: Interceptor + ?Sized> Interceptor for Arc<T> {
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        (**self).wrap_unary(next)
    }

    fn wrap_streaming(&self, next: StreamingFunc) -> StreamingFunc {
        (**self).wrap_streaming(next)
    }
}

/// A function-based unary interceptor.
///
/// # Example
///
/// ```ignore
/// use callchain_client::{FnInterceptor, UnaryRequest, UnaryNext};
///
/// let logging = FnInterceptor::unary(|req: UnaryRequest, next: UnaryNext| {
///     Box::pin(async move {
///         println!("Calling: {}", req.procedure);
///         next.call(req).await
///     })
/// });
/// ```
#[derive(Clone)]
pub struct FnInterceptor<F> {
    func: F,
}

impl<F> FnInterceptor<F>
where
    F: Fn(UnaryRequest, UnaryNext) -> BoxFuture<'static, Result<UnaryResponse, CallError>>
        + Send
        + Sync
        + Clone
        + 'static,
{
    pub fn unary(func: F) -> Self {
        Self { func }
    }
}

impl<F> Interceptor for FnInterceptor<F>
where
    F: Fn(UnaryRequest, UnaryNext) -> BoxFuture<'static, Result<UnaryResponse, CallError>>
        + Send
        + Sync
        + Clone
        + 'static,
{
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        let func = self.func.clone();
        Arc::new(move |request: UnaryRequest| {
            let next = UnaryNext::new(next.clone());
            func(request, next)
        })
    }
}
