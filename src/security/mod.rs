//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! auth_enabled (config)
//!     → auth.rs select() picks one AuthStrategy
//!     → grpc.rs        unary + stream interceptors (Unauthenticated on failure)
//!     → access_control.rs HTTP middleware (401 on failure)
//!     → OrgId in request extensions for handlers
//! ```
//!
//! # Design Decisions
//! - One strategy shared by all three hooks, chosen once at startup
//! - Fail closed when auth is enabled
//! - Disabled auth still yields a tenant (`fake`) so handlers never branch

pub mod access_control;
pub mod auth;
pub mod grpc;

pub use access_control::HttpAuth;
pub use auth::{select, AuthError, AuthMiddleware, AuthStrategy, OrgId, FAKE_ORG_ID, ORG_ID_HEADER};
pub use grpc::{GrpcAuthLayer, StreamAuthInterceptor, UnaryAuthInterceptor};
