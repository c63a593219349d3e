//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (manager.rs):
//!     Target module → registry.rs lookup → deps first, depth-first
//!     → init action against the root aggregate → mark initialised
//!
//! Shutdown (manager.rs + shutdown.rs):
//!     Signal or App::stop → shutdown.rs broadcast → transport drains
//!     → stop actions in reverse init order, failures logged
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → end App::run
//! ```
//!
//! # Design Decisions
//! - Registry is immutable and validated once (no cycles, no dangling deps)
//! - Each `Lifecycle` owns its own initialised set; no ambient state
//! - Init aborts on the first failure; stop never aborts

pub mod manager;
pub mod registry;
pub mod shutdown;
pub mod signals;

pub use manager::{InitError, Lifecycle};
pub use registry::{BoxError, ModuleDescriptor, ModuleId, Registry, RegistryError};
pub use shutdown::Shutdown;
