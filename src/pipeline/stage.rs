//! Pipeline stages and their outcomes.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::BoxError;

/// What a pipe, preflight or handler tells the kernel to do next.
///
/// `Respond` means the response has been prepared and the pipeline must stop
/// and send it as it is.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow<T> {
    Next(T),
    Respond,
}

/// The fixed stages of the request pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Preflight,
    Routing,
    PipeIn,
    Validate,
    BuildArgs,
    Invoke,
    PipeOut,
    Pack,
    TerminateHooks,
    Send,
}

impl Stage {
    /// Error name reported when the stage fails.
    pub fn tag(&self) -> &'static str {
        match self {
            Stage::Preflight => "PREFLIGHT_EXCEPTION",
            Stage::Routing => "ROUTING_EXCEPTION",
            Stage::PipeIn => "PIPE_IN_EXCEPTION",
            Stage::Validate => "VALIDATE_EXCEPTION",
            Stage::BuildArgs => "BUILD_ARGS_EXCEPTION",
            Stage::Invoke => "INVOKE_EXCEPTION",
            Stage::PipeOut => "PIPE_OUT_EXCEPTION",
            Stage::Pack => "PACK_EXCEPTION",
            Stage::TerminateHooks => "TERMINATE_HOOK_EXCEPTION",
            Stage::Send => "SEND_EXCEPTION",
        }
    }

    /// Run one stage body, turning errors and panics into [`StageOutcome::Fail`].
    pub(crate) fn guard<T>(self, body: impl FnOnce() -> Result<Flow<T>, BoxError>) -> StageOutcome<T> {
        match panic::catch_unwind(AssertUnwindSafe(body)) {
            Ok(Ok(Flow::Next(value))) => StageOutcome::Continue(value),
            Ok(Ok(Flow::Respond)) => StageOutcome::ShortCircuit,
            Ok(Err(source)) => StageOutcome::Fail(KernelError { stage: self, source }),
            Err(payload) => StageOutcome::Fail(KernelError::panicked(self, payload)),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Result of one pipeline stage.
#[derive(Debug)]
pub enum StageOutcome<T> {
    Continue(T),
    ShortCircuit,
    Fail(KernelError),
}

/// A stage failure, tagged with the stage it happened in.
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed: {source}")]
pub struct KernelError {
    pub stage: Stage,
    #[source]
    pub source: BoxError,
}

impl KernelError {
    pub fn new(stage: Stage, source: impl Into<BoxError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }

    fn panicked(stage: Stage, payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Self::new(stage, format!("panicked: {message}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_maps_flow() {
        assert!(matches!(
            Stage::Invoke.guard(|| Ok(Flow::Next(3))),
            StageOutcome::Continue(3)
        ));
        assert!(matches!(
            Stage::Invoke.guard::<()>(|| Ok(Flow::Respond)),
            StageOutcome::ShortCircuit
        ));
    }

    #[test]
    fn test_guard_tags_errors_and_panics() {
        let StageOutcome::Fail(err) = Stage::PipeIn.guard::<()>(|| Err("nope".into())) else {
            panic!("expected failure");
        };
        assert_eq!(err.stage, Stage::PipeIn);
        assert_eq!(err.to_string(), "PIPE_IN_EXCEPTION failed: nope");

        let StageOutcome::Fail(err) = Stage::Invoke.guard::<()>(|| panic!("kaboom")) else {
            panic!("expected failure");
        };
        assert_eq!(err.stage, Stage::Invoke);
        assert!(err.source.to_string().contains("kaboom"));
    }
}
