//! Build-time error types.
//!
//! - [`ConfigError`]: resolving a target's configuration failed
//! - [`BuildError`]: assembling the pipeline or dialing failed
//!
//! Call-level failures are [`CallError`](callchain_core::CallError) values
//! and never surface here.

use callchain_core::InvalidContextKey;

use crate::pipeline::{Slot, Stage};

/// Resolving configuration failed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration document itself could not be parsed.
    #[error("failed to parse configuration source: {0}")]
    Source(#[source] toml::de::Error),

    /// No value is stored under the client's key.
    #[error("configuration key {key:?} not found")]
    MissingKey { key: String },

    /// The value stored under the key does not describe a client.
    #[error("failed to parse configuration key {key:?}: {source}")]
    Parse {
        key: String,
        #[source]
        source: toml::de::Error,
    },

    /// The client has nowhere to connect to.
    #[error("configuration key {key:?} has an empty address")]
    MissingAddress { key: String },

    #[error("invalid propagated context keys: {0}")]
    ContextKeys(#[from] InvalidContextKey),
}

impl ConfigError {
    /// The configuration key the error is about, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            ConfigError::MissingKey { key }
            | ConfigError::Parse { key, .. }
            | ConfigError::MissingAddress { key } => Some(key),
            ConfigError::Source(_) | ConfigError::ContextKeys(_) => None,
        }
    }
}

/// Building a client failed; no client handle was produced.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An option tried to place an interceptor next to a stage that is not
    /// part of this pipeline.
    #[error("cannot place {name:?}: the {anchor} interceptor is not installed")]
    AnchorNotFound { anchor: Stage, name: String },

    /// The same slot was registered twice.
    #[error("interceptor {0} registered twice")]
    DuplicateInterceptor(Slot),

    /// A value destined for outbound metadata is not a valid header value.
    #[error("invalid metadata value for {name:?}: {value:?}")]
    InvalidMetadata { name: &'static str, value: String },

    /// The dialer could not produce a transport.
    #[error("dial {address}: {message}")]
    Dial { address: String, message: String },
}
