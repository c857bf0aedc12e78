//! HTTP protocol model and transport adapter.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, axum request → Request)
//!     → request.rs (verb, path, headers, query, decoded body)
//!     → [kernel pipeline]
//!     → response.rs (status, MIME, body, failure state)
//!     → wrapper.rs (wrap-out / wrap-err envelopes)
//!     → mime.rs (encode body for the content type)
//!     → Send to client
//! ```

pub mod mime;
pub mod request;
pub mod response;
pub mod server;
pub mod verb;
pub mod wrapper;

pub use request::Request;
pub use response::{
    BufferedTransport, ContextKind, Failure, FailureClass, Response, Transmitted, Transport,
};
pub use server::{KernelServer, TransportError};
pub use verb::Verb;
pub use wrapper::{Wrapper, WrapperRegistry};
