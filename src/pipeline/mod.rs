//! Request pipeline.
//!
//! # Data Flow
//! ```text
//! Request
//!     → preflight.rs (request-wide checks)
//!     → kernel.rs    (routing, halt, MIMEIN)
//!     → pipe.rs      (inbound pipes)
//!     → kernel.rs    (validate, build args, invoke)
//!     → pipe.rs      (outbound pipes)
//!     → kernel.rs    (pack)
//!     → hooks.rs     (terminate hooks)
//!     → Response sent through a Transport
//! ```
//!
//! # Design Decisions
//! - Collaborators answer with [`Flow`]; `Flow::Respond` stops the pipeline
//! - Stage failures are isolated by [`Stage::guard`] and tagged with the stage
//! - Per-request state ([`RouteContext`], [`crate::port::PortView`]) never
//!   outlives the request

pub mod context;
pub mod hooks;
pub mod kernel;
pub mod pipe;
pub mod preflight;
pub mod stage;

pub use context::{RouteContext, Routed};
pub use hooks::{AuditLog, TerminateHook};
pub use kernel::{BootError, Kernel, KernelBuilder};
pub use pipe::{PipeIn, PipeOut, PipeRegistry};
pub use preflight::{Cors, DebugSwitch, Preflight, PreflightRegistry};
pub use stage::{Flow, KernelError, Stage, StageOutcome};
