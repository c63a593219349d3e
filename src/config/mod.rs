//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → flags.rs (command-line overrides)
//!     → validation.rs (semantic checks)
//!     → Config (validated, immutable)
//!     → handed to App::new
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod flags;
pub mod loader;
pub mod schema;
pub mod validation;

pub use flags::Flags;
pub use loader::{load_config, ConfigError};
pub use schema::{
    Config, DistributorConfig, IngesterClientConfig, IngesterConfig, LifecyclerConfig,
    QuerierConfig, RingConfig, ServerConfig,
};
