//! Config-driven RPC clients with an ordered interceptor pipeline.
//!
//! A client is described by one configuration key. Building it installs the
//! enabled built-in interceptors in a fixed order, applies caller options,
//! dials the target and returns a [`Component`] whose calls all run through
//! the same pipeline.
//!
//! ## Features
//!
//! - Distributed tracing (W3C `traceparent`)
//! - Propagation of declared context keys into outbound metadata
//! - Error and access logging through `tracing`
//! - Human-readable call lines in development mode
//! - Caller identity in the `app` metadata entry
//! - Default deadlines and slow-call warnings
//! - Per-call metrics through the `metrics` facade
//!
//! ## Example
//!
//! ```ignore
//! use callchain_client::{CallOptions, Container, Environment, Settings};
//!
//! let settings = Settings::from_toml_str(r#"
//!     [grpc.user]
//!     address = "127.0.0.1:9001"
//!     enable_trace_interceptor = true
//!     enable_timeout_interceptor = true
//!     read_timeout = "2s"
//!     slow_log_threshold = "500ms"
//! "#)?;
//!
//! let client = Container::load(&settings, "grpc.user", Environment::from_env()?)?
//!     .build(&dialer, [])?;
//!
//! let response = client
//!     .invoke_unary("user.v1.UserService/Get", body, CallOptions::new().value("x-uid", "42"))
//!     .await?;
//! ```
//!
//! ## Pipeline order
//!
//! Outermost first; each stage is only present when enabled:
//!
//! 1. trace
//! 2. context propagation (always)
//! 3. logging (always)
//! 4. debug (development mode)
//! 5. app name
//! 6. timeout
//! 7. metrics
//!
//! Caller interceptors are added with [`with_interceptor`],
//! [`with_interceptor_before`] and [`with_interceptor_after`].
//!
//! ## Deadlines
//!
//! A call's deadline comes from [`CallOptions::timeout`], from the caller's
//! [`CallContext`], or from the timeout stage's `read_timeout` when neither is
//! set. It is enforced right before the transport and reported as
//! [`Code::DeadlineExceeded`], so every interceptor observes timed-out calls
//! like any other failure.
//!
//! ## Cancellation
//!
//! A caller that wants to abandon a call passes a `CancellationToken` with
//! [`CallOptions::cancel`] and fires it. The call then fails with
//! [`Code::Canceled`] and unwinds through every interceptor, so it is logged
//! and counted. Dropping the call future instead skips all of that.

mod component;
pub mod config;
mod container;
mod error;
pub mod interceptor;
pub mod interceptors;
mod options;
pub mod pipeline;
pub mod transport;

pub use component::{Component, TIMEOUT_HEADER};
pub use config::{CallOptions, Config, Environment, ExecutionMode, Settings};
pub use container::Container;
pub use error::{BuildError, ConfigError};
pub use interceptor::{
    BoxFuture, FnInterceptor, Interceptor, StreamRequest, StreamResponse, StreamingFunc,
    UnaryFunc, UnaryNext, UnaryRequest, UnaryResponse,
};
pub use options::{
    Assembly, BuildOption, with_dial_timeout, with_insecure, with_interceptor,
    with_interceptor_after, with_interceptor_before,
};
pub use pipeline::{Pipeline, PipelineBuilder, Slot, Stage};
pub use transport::{DialTarget, Dialer, FnTransport, Transport};

// Re-export core types
pub use callchain_core::{
    APP_NAME_HEADER, CallContext, CallError, Code, ContextKeys, InvalidContextKey, TRACE_ID_KEY,
    TRACEPARENT_HEADER,
};

pub use bytes::Bytes;
