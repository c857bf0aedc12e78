//! Port Kernel
//!
//! An HTTP request-dispatch core: handler metadata is assembled once into an
//! immutable route registry, and every request then walks a fixed pipeline of
//! stages that ends in exactly one transmitted response.
//!
//! # Architecture Overview
//!
//! ```text
//!                              ┌──────────────────────────────────────────────────────┐
//!     Handler metadata         │                     PORT KERNEL                       │
//!     ─────────────────────────┼─▶┌──────────┐    ┌───────────┐    ┌──────────────┐   │
//!     (manifest / builders)    │  │ metadata │───▶│ assembler │───▶│   routing    │   │
//!                              │  └──────────┘    └───────────┘    │  registry    │   │
//!                              │                                    └──────┬───────┘   │
//!                              │                                           │           │
//!     Client Request           │  ┌─────────┐    ┌──────────────────────────▼────────┐ │
//!     ─────────────────────────┼─▶│  http   │───▶│ pipeline (kernel)                  │ │
//!                              │  │ server  │    │ preflight → routing → pipe-in →    │ │
//!                              │  └─────────┘    │ validate → build-args → invoke →   │ │
//!     Client Response          │  ┌─────────┐    │ pipe-out → pack → terminate → send │ │
//!     ◀────────────────────────┼──│response │◀───└────────────────────────────────────┘ │
//!                              │  └─────────┘                                          │
//!                              │  ┌─────────────────────────────────────────────────┐ │
//!                              │  │              Cross-Cutting Concerns              │ │
//!                              │  │  ┌────────┐ ┌──────────┐ ┌──────────┐ ┌───────┐ │ │
//!                              │  │  │ config │ │ validate │ │observa-  │ │ pipes │ │ │
//!                              │  │  │        │ │          │ │ bility   │ │       │ │ │
//!                              │  │  └────────┘ └──────────┘ └──────────┘ └───────┘ │ │
//!                              │  │  ┌──────────────────────────────────────────┐   │ │
//!                              │  │  │        lifecycle (halt / shutdown)        │   │ │
//!                              │  │  └──────────────────────────────────────────┘   │ │
//!                              │  └─────────────────────────────────────────────────┘ │
//!                              └──────────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod assembler;
pub mod config;
pub mod http;
pub mod metadata;
pub mod pipeline;
pub mod port;
pub mod routing;

// Request processing
pub mod pipes;
pub mod validate;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

/// Error type of pipes, preflights, hooks, handlers and transports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub use assembler::{Assembler, Assembly, AssemblyError};
pub use config::schema::KernelConfig;
pub use http::{KernelServer, Request, Response, Transmitted};
pub use lifecycle::{HaltFlag, Shutdown};
pub use metadata::HandlerMeta;
pub use pipeline::{Kernel, KernelBuilder};
pub use port::PortTable;
pub use routing::Registry;
