use serde::de::DeserializeOwned;

use crate::error::ConfigError;

/// A parsed configuration document.
///
/// Keys are dotted paths into nested tables: `"grpc.user"` looks up the
/// `user` table inside the `grpc` table.
#[derive(Clone, Debug, Default)]
pub struct Settings {
    root: toml::Table,
}

impl Settings {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let root = source.parse::<toml::Table>().map_err(ConfigError::Source)?;
        Ok(Self { root })
    }

    /// Look up the raw value stored under a dotted key.
    pub fn get(&self, key: &str) -> Option<&toml::Value> {
        let mut parts = key.split('.');
        let mut current = self.root.get(parts.next()?)?;
        for part in parts {
            current = current.as_table()?.get(part)?;
        }
        Some(current)
    }

    /// Deserialize the value stored under `key`.
    pub fn unmarshal_key<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        let value = self.get(key).ok_or_else(|| ConfigError::MissingKey {
            key: key.to_string(),
        })?;
        value
            .clone()
            .try_into()
            .map_err(|source| ConfigError::Parse {
                key: key.to_string(),
                source,
            })
    }
}
