//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → KernelConfig (validated, immutable)
//!     → read by the assembler (domain settings) and the kernel builder
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the registry is built from it once
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CorsConfig, DomainConfig, KernelConfig, KernelSettings, ListenerConfig, ObservabilityConfig,
    PaginateConfig,
};
