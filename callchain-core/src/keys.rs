//! The set of context keys copied into outbound metadata.
//!
//! A process declares once which keys of the caller's logical context travel
//! with every outbound call (user ids, tenant ids, ...). The set is shared by
//! every client built in the process and is not configurable per client.

use std::sync::Arc;

use http::HeaderName;

/// Error returned when a declared key cannot be used as a metadata name.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid context key: {0:?}")]
pub struct InvalidContextKey(pub String);

/// An ordered, de-duplicated set of propagated context keys.
///
/// Keys are lower-cased on the way in so that they are valid metadata names
/// and match [`CallContext`](crate::CallContext) lookups.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContextKeys {
    keys: Arc<[HeaderName]>,
}

impl ContextKeys {
    /// An empty key set: nothing is propagated.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a key set from key names.
    ///
    /// Blank names are skipped and duplicates keep their first position.
    pub fn new<I, S>(keys: I) -> Result<Self, InvalidContextKey>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<HeaderName> = Vec::new();
        for key in keys {
            let key = key.as_ref().trim();
            if key.is_empty() {
                continue;
            }
            let name = HeaderName::try_from(key.to_ascii_lowercase())
                .map_err(|_| InvalidContextKey(key.to_string()))?;
            if !out.contains(&name) {
                out.push(name);
            }
        }
        Ok(Self { keys: out.into() })
    }

    /// Parse a comma separated list such as `"x-uid, x-tenant"`.
    pub fn parse(list: &str) -> Result<Self, InvalidContextKey> {
        Self::new(list.split(','))
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderName> {
        self.keys.iter()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
