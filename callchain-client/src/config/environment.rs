use std::env;

use callchain_core::ContextKeys;

use crate::error::ConfigError;

/// Variable selecting the execution mode (`dev` / `development`).
pub const MODE_VAR: &str = "APP_MODE";
/// Variable naming the calling application.
pub const APP_NAME_VAR: &str = "APP_NAME";
/// Comma separated context keys propagated on every call.
pub const CONTEXT_KEYS_VAR: &str = "APP_CONTEXT_KEYS";

/// Process execution mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    Development,
    #[default]
    Production,
}

impl ExecutionMode {
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("dev") || value.eq_ignore_ascii_case("development") {
            ExecutionMode::Development
        } else {
            ExecutionMode::Production
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, ExecutionMode::Development)
    }
}

/// Process-level inputs of the pipeline builder.
///
/// These are process-wide facts. They are resolved once, at the outermost
/// entry point, and passed to every build explicitly.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Environment {
    pub mode: ExecutionMode,
    /// Identity sent by the app-name interceptor.
    pub app_name: String,
    /// Keys copied from the call context into outbound metadata.
    pub context_keys: ContextKeys,
}

impl Environment {
    pub fn new(mode: ExecutionMode, app_name: impl Into<String>, context_keys: ContextKeys) -> Self {
        Self {
            mode,
            app_name: app_name.into(),
            context_keys,
        }
    }

    /// Read the environment from process variables.
    ///
    /// `APP_NAME` falls back to the executable's file name.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mode = env::var(MODE_VAR)
            .map(|v| ExecutionMode::parse(&v))
            .unwrap_or_default();
        let app_name = env::var(APP_NAME_VAR).unwrap_or_else(|_| executable_name());
        let context_keys = match env::var(CONTEXT_KEYS_VAR) {
            Ok(list) => ContextKeys::parse(&list)?,
            Err(_) => ContextKeys::empty(),
        };
        Ok(Self::new(mode, app_name, context_keys))
    }
}

fn executable_name() -> String {
    env::current_exe()
        .ok()
        .and_then(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "unknown".to_string())
}
