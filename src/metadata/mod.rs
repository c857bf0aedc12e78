//! Handler metadata model.
//!
//! # Data Flow
//! ```text
//! manifest (JSON) or in-code builders
//!     → types.rs (HandlerMeta: class / methods / properties)
//!     → assembler (settings merge, route registration)
//! ```
//!
//! # Design Decisions
//! - Metadata is plain data; extracting it from source code is out of scope
//! - Annotation keys are case-insensitive and stored upper-cased
//! - Annotation parameters live beside the values under `_extra`

pub mod manifest;
pub mod types;

pub use manifest::{load_manifest, ManifestError};
pub use types::{ClassKind, ClassMeta, DocMeta, HandlerMeta, MethodMeta, ParamMeta, PropertyMeta};
