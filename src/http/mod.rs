//! HTTP transport.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum router, HTTP/1.1 + HTTP/2, timeout)
//!     → request.rs (request ID, per-request span)
//!     → public routes | auth middleware → module routes | gRPC auth → health
//! ```

pub mod request;
pub mod server;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{Server, ServerError};
