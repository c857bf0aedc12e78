//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     route expression
//!     → template.rs (split, `{name}` → `?` placeholders)
//!     → registry.rs (RegistryBuilder: one binding per (key, verb))
//!     → seal() into an immutable Registry
//!
//! Incoming Request (path, verb):
//!     → matcher.rs (exact → suffix → parameterised)
//!     → Return: Match { RouteEntry, PortDescriptor } or None
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (exact map lookups on substituted keys)
//! - Deterministic: same input always matches same route
//! - Listing and docs are read projections, never on the request path

pub mod docs;
pub mod listing;
pub mod matcher;
pub mod registry;
pub mod template;

pub use docs::{Category, DocEntry, DocGroup, Docs};
pub use listing::{ListFilter, RouteListing};
pub use matcher::{Match, RouteEntry, RouteParams};
pub use registry::{DuplicateRoute, PropertyTable, Registry, RegistryBuilder, RouteDef};
pub use template::PathTemplate;
