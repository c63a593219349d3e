//! Trace storage server with dependency-ordered module lifecycle.

pub mod app;
pub mod config;
pub mod distributor;
pub mod http;
pub mod ingester;
pub mod lifecycle;
pub mod model;
pub mod observability;
pub mod querier;
pub mod ring;
pub mod security;

pub use app::{App, ModuleName};
pub use config::Config;
pub use lifecycle::Shutdown;
