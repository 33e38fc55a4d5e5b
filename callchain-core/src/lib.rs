//! Core types for callchain.
//!
//! This crate provides the types shared by every interceptor and by the
//! client assembler in `callchain-client`.
//!
//! ## Modules
//!
//! - `error`: Status codes and the call-level error type
//! - `context`: The caller's logical context (values and deadline)
//! - `keys`: The process-wide set of propagated context keys

mod context;
mod error;
mod keys;

pub use context::*;
pub use error::*;
pub use keys::*;
