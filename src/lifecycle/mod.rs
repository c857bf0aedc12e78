//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Halt (halt.rs):
//!     portctl halt → marker file [since, message]
//!     → HaltWatcher (notify) → HaltFlag (arc-swap)
//!     → kernel ROUTING stage answers 503
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Exit
//! ```
//!
//! # Design Decisions
//! - Halting is a file so it survives restarts and works across processes
//! - Request workers read the flag lock-free

pub mod halt;
pub mod shutdown;

pub use halt::{HaltFlag, HaltNotice, HaltWatcher};
pub use shutdown::Shutdown;
