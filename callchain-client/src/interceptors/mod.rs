//! Built-in interceptors, one per pipeline stage.
//!
//! Each constructor takes only what its interceptor needs. The module docs of
//! every interceptor list the context values and metadata it reads and
//! writes, which is what the pipeline order in [`crate::pipeline`] relies on.

pub mod app_name;
pub mod debug;
pub mod logging;
pub mod metric;
pub mod propagate;
pub mod timeout;
pub mod trace;

pub use app_name::AppNameInterceptor;
pub use debug::DebugInterceptor;
pub use logging::{AccessLog, LoggingInterceptor};
pub use metric::MetricInterceptor;
pub use propagate::ContextPropagationInterceptor;
pub use timeout::TimeoutInterceptor;
pub use trace::TraceInterceptor;
