//! Loading a client's configuration and building the client.

use crate::component::Component;
use crate::config::{Config, Environment, Settings};
use crate::error::{BuildError, ConfigError};
use crate::options::{Assembly, BuildOption};
use crate::pipeline::PipelineBuilder;
use crate::transport::{DialTarget, Dialer};

/// A client target whose configuration has been resolved but which has not
/// been built yet.
///
/// # Example
///
/// ```ignore
/// use callchain_client::{Container, Environment, Settings, with_interceptor};
///
/// let settings = Settings::from_toml_str(&std::fs::read_to_string("config.toml")?)?;
/// let environment = Environment::from_env()?;
///
/// let client = Container::load(&settings, "grpc.user", environment)?
///     .build(&dialer, [with_interceptor("audit", audit)])?;
/// ```
#[derive(Clone, Debug)]
pub struct Container {
    name: String,
    config: Config,
    environment: Environment,
}

impl Container {
    pub fn new(name: impl Into<String>, config: Config, environment: Environment) -> Self {
        Self {
            name: name.into(),
            config,
            environment,
        }
    }

    /// Resolve the client stored under `key`. The key also names the client.
    pub fn load(
        settings: &Settings,
        key: &str,
        environment: Environment,
    ) -> Result<Self, ConfigError> {
        let config: Config = settings.unmarshal_key(key).inspect_err(|err| {
            tracing::error!(key, error = %err, "failed to parse client config");
        })?;
        if config.address.trim().is_empty() {
            let err = ConfigError::MissingAddress {
                key: key.to_string(),
            };
            tracing::error!(key, error = %err, "client config has no address");
            return Err(err);
        }
        Ok(Self::new(key, config, environment))
    }

    /// Like [`Container::load`], for entry points where a broken client
    /// configuration should stop the process.
    ///
    /// # Panics
    ///
    /// Panics if the configuration cannot be resolved.
    pub fn must_load(settings: &Settings, key: &str, environment: Environment) -> Self {
        match Self::load(settings, key, environment) {
            Ok(container) => container,
            Err(err) => panic!("client {key:?}: {err}"),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Build the client.
    ///
    /// The built-in stages are installed first, then `options` are applied in
    /// order, then the target is dialed. Any failure aborts the build.
    pub fn build<D, O>(self, dialer: &D, options: O) -> Result<Component, BuildError>
    where
        D: Dialer + ?Sized,
        O: IntoIterator<Item = BuildOption>,
    {
        if self.config.address.trim().is_empty() {
            return Err(ConfigError::MissingAddress { key: self.name }.into());
        }

        let pipeline = PipelineBuilder::from_config(&self.name, &self.config, &self.environment)?;
        let mut assembly = Assembly::new(DialTarget::from_config(&self.name, &self.config), pipeline);
        for option in options {
            option.apply(&mut assembly)?;
        }

        let (target, pipeline) = assembly.into_parts();
        let pipeline = pipeline.build();
        let transport = dialer.dial(&target).inspect_err(|err| {
            tracing::error!(name = %self.name, addr = %target.address, error = %err, "dial failed");
        })?;

        tracing::info!(
            name = %self.name,
            addr = %target.address,
            interceptors = ?pipeline.slots(),
            "client built"
        );
        Ok(Component::new(&self.name, self.config, target, pipeline, transport))
    }
}
