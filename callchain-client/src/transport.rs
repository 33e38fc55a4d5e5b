//! The boundary between a client and the network.
//!
//! A [`Transport`] delivers already-intercepted calls. A [`Dialer`] turns a
//! [`DialTarget`] into a transport when a client is built; connection
//! management, security and wire encoding all live behind these two traits.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use callchain_core::{CallError, Code};

use crate::config::Config;
use crate::error::BuildError;
use crate::interceptor::{BoxFuture, StreamRequest, StreamResponse, UnaryRequest, UnaryResponse};

/// Delivers calls to a remote target.
pub trait Transport: Send + Sync {
    fn unary(&self, request: UnaryRequest) -> BoxFuture<'static, Result<UnaryResponse, CallError>>;

    /// Open a streaming call. Transports without streaming support keep the
    /// default, which fails with [`Code::Unimplemented`].
    fn streaming(
        &self,
        request: StreamRequest,
    ) -> BoxFuture<'static, Result<StreamResponse, CallError>> {
        let procedure = request.procedure;
        Box::pin(async move {
            Err(CallError::new(
                Code::Unimplemented,
                format!("streaming is not supported by this transport: {procedure}"),
            ))
        })
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn unary(&self, request: UnaryRequest) -> BoxFuture<'static, Result<UnaryResponse, CallError>> {
        (**self).unary(request)
    }

    fn streaming(
        &self,
        request: StreamRequest,
    ) -> BoxFuture<'static, Result<StreamResponse, CallError>> {
        (**self).streaming(request)
    }
}

/// A unary-only transport backed by a closure.
///
/// # Example
///
/// ```ignore
/// use callchain_client::{FnTransport, UnaryRequest, UnaryResponse};
///
/// let echo = FnTransport::unary(|req: UnaryRequest| {
///     Box::pin(async move { Ok(UnaryResponse::new(req.headers, req.body)) })
/// });
/// ```
#[derive(Clone)]
pub struct FnTransport<F> {
    func: F,
}

impl<F> FnTransport<F>
where
    F: Fn(UnaryRequest) -> BoxFuture<'static, Result<UnaryResponse, CallError>>
        + Send
        + Sync
        + 'static,
{
    pub fn unary(func: F) -> Self {
        Self { func }
    }
}

impl<F> Transport for FnTransport<F>
where
    F: Fn(UnaryRequest) -> BoxFuture<'static, Result<UnaryResponse, CallError>>
        + Send
        + Sync
        + 'static,
{
    fn unary(&self, request: UnaryRequest) -> BoxFuture<'static, Result<UnaryResponse, CallError>> {
        (self.func)(request)
    }
}

impl<F> fmt::Debug for FnTransport<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTransport").finish_non_exhaustive()
    }
}

/// Where and how a client connects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DialTarget {
    /// Name of the client, used in logs.
    pub name: String,
    pub address: String,
    /// Time allowed for establishing the connection.
    pub dial_timeout: Duration,
    /// Connect without transport security.
    pub insecure: bool,
}

impl DialTarget {
    pub fn from_config(name: &str, config: &Config) -> Self {
        Self {
            name: name.to_string(),
            address: config.address.clone(),
            dial_timeout: config.dial_timeout,
            insecure: config.enable_with_insecure,
        }
    }
}

/// Produces the transport of a client being built.
///
/// Any `Fn(&DialTarget) -> Result<Arc<dyn Transport>, BuildError>` is a
/// dialer.
pub trait Dialer {
    fn dial(&self, target: &DialTarget) -> Result<Arc<dyn Transport>, BuildError>;
}

impl<F> Dialer for F
where
    F: Fn(&DialTarget) -> Result<Arc<dyn Transport>, BuildError>,
{
    fn dial(&self, target: &DialTarget) -> Result<Arc<dyn Transport>, BuildError> {
        self(target)
    }
}
