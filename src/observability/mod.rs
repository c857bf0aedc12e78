//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with key/value fields
//!     → one debug span per request (trace id, verb, path)
//!
//! Consumers:
//!     → logging.rs (fmt subscriber, JSON or pretty, stdout)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Trace id of the response flows through every event of a request
//! - Level filter from RUST_LOG wins over configuration

pub mod logging;
