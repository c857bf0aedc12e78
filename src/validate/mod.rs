//! Input validation.
//!
//! # Data Flow
//! ```text
//! property annotations
//!     → rules.rs (PropertyDescriptor: title, type, location, rules)
//!     → wrapin.rs (named schemas of descriptors)
//!     → engine.rs (Validate trait; RuleEngine checks request values)
//! ```
//!
//! # Design Decisions
//! - Descriptors are built once at assembly time; requests only read them
//! - The engine stops at the first failure and reports it structurally
//! - Unknown rule names are ignored so custom validators can add their own

pub mod engine;
pub mod rules;
pub mod wrapin;

pub use engine::{MapSource, RuleEngine, Validate, ValidateError, ValidationFailure, ValueSource};
pub use rules::{ArgType, Location, PropertyDescriptor, PropertyError, Requirement, Rule};
pub use wrapin::{WrapInError, WrapInRegistry, WrapInSchema};
