//! Ordered interceptor pipelines.
//!
//! A [`PipelineBuilder`] collects interceptors under unique [`Slot`]s and
//! freezes them into a [`Pipeline`]. Position 0 is the outermost
//! interceptor: it sees the request first and the outcome last.
//!
//! [`PipelineBuilder::from_config`] installs the built-in stages in their
//! fixed order:
//!
//! | position | stage | installed when |
//! |---|---|---|
//! | 1 | [`Stage::Trace`] | `enable_trace_interceptor` |
//! | 2 | [`Stage::ContextPropagation`] | always |
//! | 3 | [`Stage::Logging`] | always |
//! | 4 | [`Stage::Debug`] | development mode |
//! | 5 | [`Stage::AppName`] | `enable_app_name_interceptor` |
//! | 6 | [`Stage::Timeout`] | `enable_timeout_interceptor` |
//! | 7 | [`Stage::Metrics`] | `enable_metric_interceptor` |
//!
//! Extra interceptors are added afterwards with [`PipelineBuilder::push`],
//! [`PipelineBuilder::insert_before`] or [`PipelineBuilder::insert_after`].
//! They never move a built-in stage relative to another.

use std::fmt;
use std::sync::Arc;

use callchain_core::APP_NAME_HEADER;
use http::HeaderValue;

use crate::config::{Config, Environment};
use crate::error::BuildError;
use crate::interceptor::{Interceptor, StreamingFunc, UnaryFunc};
use crate::interceptors::{
    AccessLog, AppNameInterceptor, ContextPropagationInterceptor, DebugInterceptor,
    LoggingInterceptor, MetricInterceptor, TimeoutInterceptor, TraceInterceptor,
};

/// A built-in pipeline stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Trace,
    ContextPropagation,
    Logging,
    Debug,
    AppName,
    Timeout,
    Metrics,
}

impl Stage {
    /// Every stage, outermost first.
    pub const ALL: [Stage; 7] = [
        Stage::Trace,
        Stage::ContextPropagation,
        Stage::Logging,
        Stage::Debug,
        Stage::AppName,
        Stage::Timeout,
        Stage::Metrics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Trace => "trace",
            Stage::ContextPropagation => "context_propagation",
            Stage::Logging => "logging",
            Stage::Debug => "debug",
            Stage::AppName => "app_name",
            Stage::Timeout => "timeout",
            Stage::Metrics => "metrics",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The identity of a pipeline entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    /// A built-in stage.
    Stage(Stage),
    /// A caller-supplied interceptor, named by the caller.
    Extra(String),
}

impl Slot {
    pub fn extra(name: impl Into<String>) -> Self {
        Slot::Extra(name.into())
    }
}

impl From<Stage> for Slot {
    fn from(stage: Stage) -> Self {
        Slot::Stage(stage)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Stage(stage) => stage.fmt(f),
            Slot::Extra(name) => write!(f, "{name:?}"),
        }
    }
}

/// One interceptor and the slot it occupies.
#[derive(Clone)]
struct PipelineEntry {
    slot: Slot,
    interceptor: Arc<dyn Interceptor>,
}

impl fmt::Debug for PipelineEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineEntry")
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

/// Collects interceptors before they are frozen into a [`Pipeline`].
#[derive(Clone, Debug, Default)]
pub struct PipelineBuilder {
    entries: Vec<PipelineEntry>,
}

impl PipelineBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the built-in stages enabled for a client named `name`.
    ///
    /// Parameters of a disabled stage are not read.
    pub fn from_config(
        name: &str,
        config: &Config,
        environment: &Environment,
    ) -> Result<Self, BuildError> {
        let address = config.address.as_str();
        let mut builder = Self::new();

        if config.enable_trace_interceptor {
            builder.install(Stage::Trace, TraceInterceptor::new(name, address))?;
        }
        builder.install(
            Stage::ContextPropagation,
            ContextPropagationInterceptor::new(environment.context_keys.clone()),
        )?;
        builder.install(
            Stage::Logging,
            LoggingInterceptor::new(
                name,
                address,
                AccessLog::from_config(config),
                environment.context_keys.clone(),
            ),
        )?;
        if environment.mode.is_development() {
            builder.install(Stage::Debug, DebugInterceptor::new(name, address))?;
        }
        if config.enable_app_name_interceptor {
            let app_name = HeaderValue::from_str(&environment.app_name).map_err(|_| {
                BuildError::InvalidMetadata {
                    name: APP_NAME_HEADER,
                    value: environment.app_name.clone(),
                }
            })?;
            builder.install(Stage::AppName, AppNameInterceptor::new(app_name))?;
        }
        if config.enable_timeout_interceptor {
            builder.install(
                Stage::Timeout,
                TimeoutInterceptor::new(
                    name,
                    address,
                    config.read_timeout,
                    config.slow_log_threshold,
                ),
            )?;
        }
        if config.enable_metric_interceptor {
            builder.install(Stage::Metrics, MetricInterceptor::new(name, address))?;
        }

        Ok(builder)
    }

    pub(crate) fn install<I>(&mut self, stage: Stage, interceptor: I) -> Result<(), BuildError>
    where
        I: Interceptor + 'static,
    {
        let entry = self.entry(Slot::Stage(stage), Arc::new(interceptor))?;
        self.entries.push(entry);
        Ok(())
    }

    /// Append an extra interceptor at the innermost position.
    pub fn push(
        &mut self,
        name: impl Into<String>,
        interceptor: Arc<dyn Interceptor>,
    ) -> Result<(), BuildError> {
        let entry = self.entry(Slot::extra(name), interceptor)?;
        self.entries.push(entry);
        Ok(())
    }

    /// Place an extra interceptor directly outside `anchor`.
    pub fn insert_before(
        &mut self,
        anchor: Stage,
        name: impl Into<String>,
        interceptor: Arc<dyn Interceptor>,
    ) -> Result<(), BuildError> {
        let name = name.into();
        let index = self.anchor_index(anchor, &name)?;
        let entry = self.entry(Slot::Extra(name), interceptor)?;
        self.entries.insert(index, entry);
        Ok(())
    }

    /// Place an extra interceptor directly inside `anchor`.
    pub fn insert_after(
        &mut self,
        anchor: Stage,
        name: impl Into<String>,
        interceptor: Arc<dyn Interceptor>,
    ) -> Result<(), BuildError> {
        let name = name.into();
        let index = self.anchor_index(anchor, &name)?;
        let entry = self.entry(Slot::Extra(name), interceptor)?;
        self.entries.insert(index + 1, entry);
        Ok(())
    }

    pub fn contains(&self, slot: &Slot) -> bool {
        self.position(slot).is_some()
    }

    pub fn position(&self, slot: &Slot) -> Option<usize> {
        self.entries.iter().position(|e| &e.slot == slot)
    }

    pub fn slots(&self) -> Vec<Slot> {
        self.entries.iter().map(|e| e.slot.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freeze the current order.
    pub fn build(self) -> Pipeline {
        Pipeline {
            entries: self.entries.into(),
        }
    }

    fn entry(
        &self,
        slot: Slot,
        interceptor: Arc<dyn Interceptor>,
    ) -> Result<PipelineEntry, BuildError> {
        if self.contains(&slot) {
            return Err(BuildError::DuplicateInterceptor(slot));
        }
        Ok(PipelineEntry { slot, interceptor })
    }

    fn anchor_index(&self, anchor: Stage, name: &str) -> Result<usize, BuildError> {
        self.position(&Slot::Stage(anchor))
            .ok_or_else(|| BuildError::AnchorNotFound {
                anchor,
                name: name.to_string(),
            })
    }
}

/// An immutable, ordered interceptor sequence.
///
/// Cloning is cheap; all clones share the same entries.
#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    entries: Arc<[PipelineEntry]>,
}

impl Pipeline {
    /// The slots in order, outermost first.
    pub fn slots(&self) -> Vec<Slot> {
        self.entries.iter().map(|e| e.slot.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn position(&self, slot: &Slot) -> Option<usize> {
        self.entries.iter().position(|e| &e.slot == slot)
    }

    pub fn contains(&self, slot: &Slot) -> bool {
        self.position(slot).is_some()
    }

    /// Wrap a unary function with every interceptor.
    ///
    /// Interceptors are applied in reverse order so that the first entry
    /// is the first to process the request.
    pub fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        let mut wrapped = next;
        for entry in self.entries.iter().rev() {
            wrapped = entry.interceptor.wrap_unary(wrapped);
        }
        wrapped
    }

    /// Wrap the opening of a streaming call with every interceptor.
    pub fn wrap_streaming(&self, next: StreamingFunc) -> StreamingFunc {
        let mut wrapped = next;
        for entry in self.entries.iter().rev() {
            wrapped = entry.interceptor.wrap_streaming(wrapped);
        }
        wrapped
    }
}
