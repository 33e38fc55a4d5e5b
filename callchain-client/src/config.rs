//! Configuration for building a client.
//!
//! - [`Config`]: Feature toggles, address and tunables of one target
//! - [`Settings`]: Parsed configuration document with key lookup
//! - [`Environment`]: Process-level execution mode, app name, context keys
//! - [`CallOptions`]: Per-call timeout, headers and context values

mod call;
mod environment;
mod feature;
mod settings;

pub use call::CallOptions;
pub(crate) use call::duration_to_timeout_header;
pub use environment::{Environment, ExecutionMode};
pub use feature::Config;
pub use settings::Settings;
