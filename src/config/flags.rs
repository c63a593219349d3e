//! Command-line flags layered over the config file.

use std::path::PathBuf;

use clap::Parser;

use crate::app::ModuleName;
use crate::config::loader::{read_config, ConfigError};
use crate::config::schema::Config;
use crate::config::validation::validate_config;

#[derive(Debug, Parser)]
#[command(name = "tracestack")]
#[command(about = "Trace storage server", long_about = None, version)]
pub struct Flags {
    /// TOML configuration file.
    #[arg(long = "config.file")]
    pub config_file: Option<PathBuf>,

    /// Target module (default all).
    #[arg(long = "target")]
    pub target: Option<ModuleName>,

    /// Set to false to disable auth.
    #[arg(long = "auth.enabled")]
    pub auth_enabled: Option<bool>,

    #[arg(long = "server.http-listen-port")]
    pub http_listen_port: Option<u16>,

    #[arg(long = "log.level")]
    pub log_level: Option<String>,
}

impl Flags {
    /// Resolve the final configuration: file (or defaults), then flags, then validation.
    pub fn load(self) -> Result<Config, ConfigError> {
        let mut config = match &self.config_file {
            Some(path) => read_config(path)?,
            None => Config::default(),
        };
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    fn apply(self, config: &mut Config) {
        if let Some(target) = self.target {
            config.target = target;
        }
        if let Some(enabled) = self.auth_enabled {
            config.auth_enabled = enabled;
        }
        if let Some(port) = self.http_listen_port {
            config.server.http_listen_port = port;
        }
        if let Some(level) = self.log_level {
            config.server.log_level = level;
        }
    }
}
