//! The built client.
//!
//! A [`Component`] binds a [`Pipeline`] to a [`Transport`]. The pipeline is
//! composed around the transport once, when the component is created; every
//! call then runs through the same composed function.
//!
//! The innermost step, between the last interceptor and the transport,
//! enforces the call deadline. It advertises the remaining budget in the
//! [`TIMEOUT_HEADER`] header and fails the call with
//! [`Code::DeadlineExceeded`](callchain_core::Code::DeadlineExceeded) once the
//! deadline passes. A call whose cancellation token fires fails with
//! [`Code::Canceled`](callchain_core::Code::Canceled) the same way, so every
//! interceptor still sees the outcome. For streaming calls both also bound
//! every message read.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use callchain_core::CallError;
use futures::StreamExt;
use futures::stream::BoxStream;
use http::HeaderValue;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{CallOptions, Config, duration_to_timeout_header};
use crate::interceptor::{
    BoxFuture, StreamRequest, StreamResponse, StreamingFunc, UnaryFunc, UnaryRequest,
    UnaryResponse,
};
use crate::pipeline::Pipeline;
use crate::transport::{DialTarget, Transport};

/// Outbound header carrying the remaining call budget in milliseconds.
pub const TIMEOUT_HEADER: &str = "x-timeout-ms";

/// A client whose calls run through an interceptor pipeline.
///
/// Cheap to clone; clones share the pipeline and the transport.
#[derive(Clone)]
pub struct Component {
    name: Arc<str>,
    config: Arc<Config>,
    target: DialTarget,
    pipeline: Pipeline,
    unary: UnaryFunc,
    streaming: StreamingFunc,
}

impl Component {
    pub fn new(
        name: &str,
        config: Config,
        target: DialTarget,
        pipeline: Pipeline,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let unary = pipeline.wrap_unary(unary_terminal(transport.clone()));
        let streaming = pipeline.wrap_streaming(streaming_terminal(transport));
        Self {
            name: name.into(),
            config: Arc::new(config),
            target,
            pipeline,
            unary,
            streaming,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Where the client was dialed, after build options were applied.
    pub fn target(&self) -> &DialTarget {
        &self.target
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Make a unary call.
    pub async fn invoke_unary(
        &self,
        procedure: &str,
        body: Bytes,
        options: CallOptions,
    ) -> Result<UnaryResponse, CallError> {
        let (headers, context) = options.into_parts();
        let request = UnaryRequest::new(procedure, headers, body).with_context(context);
        (self.unary)(request).await
    }

    /// Open a streaming call.
    pub async fn open_stream(
        &self,
        procedure: &str,
        options: CallOptions,
    ) -> Result<StreamResponse, CallError> {
        let (headers, context) = options.into_parts();
        let request = StreamRequest::new(procedure, headers).with_context(context);
        (self.streaming)(request).await
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("pipeline", &self.pipeline.slots())
            .finish_non_exhaustive()
    }
}

/// Advertise the remaining budget, or report that none is left.
fn advertise_budget(deadline: Instant, headers: &mut http::HeaderMap) -> Result<(), CallError> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Err(CallError::deadline_exceeded());
    }
    if let Some(value) =
        duration_to_timeout_header(remaining).and_then(|ms| HeaderValue::from_str(&ms).ok())
    {
        headers.insert(TIMEOUT_HEADER, value);
    }
    Ok(())
}

fn unary_terminal(transport: Arc<dyn Transport>) -> UnaryFunc {
    Arc::new(
        move |mut request: UnaryRequest| -> BoxFuture<'static, Result<UnaryResponse, CallError>> {
            if request.context.is_cancelled() {
                return Box::pin(async { Err(CallError::canceled()) });
            }
            let deadline = request.context.deadline();
            let cancel = request.context.cancel_token().cloned();
            if let Some(deadline) = deadline {
                if let Err(err) = advertise_budget(deadline, &mut request.headers) {
                    return Box::pin(async move { Err(err) });
                }
            }
            if deadline.is_none() && cancel.is_none() {
                return transport.unary(request);
            }
            Box::pin(guarded(transport.unary(request), deadline, cancel))
        },
    )
}

fn streaming_terminal(transport: Arc<dyn Transport>) -> StreamingFunc {
    Arc::new(
        move |mut request: StreamRequest| -> BoxFuture<'static, Result<StreamResponse, CallError>> {
            if request.context.is_cancelled() {
                return Box::pin(async { Err(CallError::canceled()) });
            }
            let deadline = request.context.deadline();
            let cancel = request.context.cancel_token().cloned();
            if let Some(deadline) = deadline {
                if let Err(err) = advertise_budget(deadline, &mut request.headers) {
                    return Box::pin(async move { Err(err) });
                }
            }
            if deadline.is_none() && cancel.is_none() {
                return transport.streaming(request);
            }
            let open = transport.streaming(request);
            Box::pin(async move {
                let response = guarded(open, deadline, cancel.clone()).await?;
                Ok(StreamResponse::new(
                    response.headers,
                    bounded(response.messages, deadline, cancel),
                ))
            })
        },
    )
}

/// Run `call` until it finishes, the deadline passes or the caller cancels.
///
/// A call that is ready at the same time as the deadline wins.
async fn guarded<F, T>(
    call: F,
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
) -> Result<T, CallError>
where
    F: Future<Output = Result<T, CallError>>,
{
    let expired = async {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    };
    let cancelled = async {
        match &cancel {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    };
    tokio::select! {
        biased;
        result = call => result,
        () = cancelled => Err(CallError::canceled()),
        () = expired => Err(CallError::deadline_exceeded()),
    }
}

/// End `messages` with a `DeadlineExceeded` item once `deadline` passes, or
/// with a `Canceled` item once the caller cancels.
fn bounded(
    messages: BoxStream<'static, Result<Bytes, CallError>>,
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
) -> BoxStream<'static, Result<Bytes, CallError>> {
    futures::stream::unfold(Some(messages), move |state| {
        let cancel = cancel.clone();
        async move {
            let Some(mut messages) = state else {
                return None;
            };
            let next = guarded(
                async { Ok::<_, CallError>(messages.next().await) },
                deadline,
                cancel,
            )
            .await;
            match next {
                Ok(item) => item.map(|item| (item, Some(messages))),
                Err(err) => Some((Err(err), None)),
            }
        }
    })
    .boxed()
}
