//! Build-time options.
//!
//! A [`BuildOption`] runs once while a client is being built, after the
//! built-in interceptor stages are in place. Options are applied in the order
//! they are passed and may add interceptors or adjust how the target is
//! dialed.
//!
//! ```ignore
//! use callchain_client::{Stage, with_dial_timeout, with_interceptor, with_interceptor_after};
//!
//! let client = container.build(&dialer, [
//!     with_interceptor_after(Stage::Trace, "auth", auth),
//!     with_interceptor("audit", audit),
//!     with_dial_timeout(Duration::from_secs(1)),
//! ])?;
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::BuildError;
use crate::interceptor::Interceptor;
use crate::pipeline::{PipelineBuilder, Stage};
use crate::transport::DialTarget;

/// What an option may change while a client is built.
#[derive(Debug)]
pub struct Assembly {
    target: DialTarget,
    pipeline: PipelineBuilder,
}

impl Assembly {
    pub(crate) fn new(target: DialTarget, pipeline: PipelineBuilder) -> Self {
        Self { target, pipeline }
    }

    pub fn target(&self) -> &DialTarget {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut DialTarget {
        &mut self.target
    }

    pub fn pipeline(&self) -> &PipelineBuilder {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut PipelineBuilder {
        &mut self.pipeline
    }

    pub(crate) fn into_parts(self) -> (DialTarget, PipelineBuilder) {
        (self.target, self.pipeline)
    }
}

type ApplyFn = Box<dyn FnOnce(&mut Assembly) -> Result<(), BuildError> + Send>;

/// A single build-time adjustment.
pub struct BuildOption(ApplyFn);

impl BuildOption {
    /// An option running arbitrary code against the assembly.
    pub fn new<F>(apply: F) -> Self
    where
        F: FnOnce(&mut Assembly) -> Result<(), BuildError> + Send + 'static,
    {
        Self(Box::new(apply))
    }

    pub(crate) fn apply(self, assembly: &mut Assembly) -> Result<(), BuildError> {
        (self.0)(assembly)
    }
}

impl fmt::Debug for BuildOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BuildOption").finish_non_exhaustive()
    }
}

/// Append an interceptor inside every built-in stage.
pub fn with_interceptor<I>(name: impl Into<String>, interceptor: I) -> BuildOption
where
    I: Interceptor + 'static,
{
    let name = name.into();
    BuildOption::new(move |assembly| {
        assembly.pipeline_mut().push(name, Arc::new(interceptor))
    })
}

/// Place an interceptor directly outside the `anchor` stage.
///
/// Fails the build if `anchor` is not installed.
pub fn with_interceptor_before<I>(
    anchor: Stage,
    name: impl Into<String>,
    interceptor: I,
) -> BuildOption
where
    I: Interceptor + 'static,
{
    let name = name.into();
    BuildOption::new(move |assembly| {
        assembly
            .pipeline_mut()
            .insert_before(anchor, name, Arc::new(interceptor))
    })
}

/// Place an interceptor directly inside the `anchor` stage.
///
/// Fails the build if `anchor` is not installed.
pub fn with_interceptor_after<I>(
    anchor: Stage,
    name: impl Into<String>,
    interceptor: I,
) -> BuildOption
where
    I: Interceptor + 'static,
{
    let name = name.into();
    BuildOption::new(move |assembly| {
        assembly
            .pipeline_mut()
            .insert_after(anchor, name, Arc::new(interceptor))
    })
}

/// Override the configured dial timeout.
pub fn with_dial_timeout(timeout: Duration) -> BuildOption {
    BuildOption::new(move |assembly| {
        assembly.target_mut().dial_timeout = timeout;
        Ok(())
    })
}

/// Dial without transport security.
pub fn with_insecure() -> BuildOption {
    BuildOption::new(|assembly| {
        assembly.target_mut().insecure = true;
        Ok(())
    })
}
