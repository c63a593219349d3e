//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::app::ModuleName;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Module to run; its dependencies come up with it.
    pub target: ModuleName,

    /// Require `X-Scope-OrgID` on every request.
    pub auth_enabled: bool,

    pub server: ServerConfig,
    pub distributor: DistributorConfig,
    pub querier: QuerierConfig,
    pub ingester_client: IngesterClientConfig,
    pub ingester: IngesterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target: ModuleName::All,
            auth_enabled: true,
            server: ServerConfig::default(),
            distributor: DistributorConfig::default(),
            querier: QuerierConfig::default(),
            ingester_client: IngesterClientConfig::default(),
            ingester: IngesterConfig::default(),
        }
    }
}

/// Listener and transport settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind (e.g., "0.0.0.0").
    pub http_listen_address: String,

    /// Port to bind; 0 picks a free port.
    pub http_listen_port: u16,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Prefix for every exported metric.
    pub metrics_namespace: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_listen_address: "0.0.0.0".to_string(),
            http_listen_port: 3200,
            log_level: "info".to_string(),
            metrics_namespace: "tracestack".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DistributorConfig {
    /// Largest accepted span count in a single push.
    pub max_spans_per_push: usize,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            max_spans_per_push: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QuerierConfig {
    /// Deadline for a whole trace lookup, in seconds.
    pub query_timeout_secs: u64,
}

impl Default for QuerierConfig {
    fn default() -> Self {
        Self {
            query_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngesterClientConfig {
    /// Timeout for a single call to one ingester, in seconds.
    pub remote_timeout_secs: u64,
}

impl Default for IngesterClientConfig {
    fn default() -> Self {
        Self {
            remote_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngesterConfig {
    /// Live traces kept per tenant before pushes are refused.
    pub max_traces_per_user: usize,

    pub lifecycler: LifecyclerConfig,
}

impl Default for IngesterConfig {
    fn default() -> Self {
        Self {
            max_traces_per_user: 10_000,
            lifecycler: LifecyclerConfig::default(),
        }
    }
}

/// How an ingester joins the ring.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecyclerConfig {
    /// Instance id; generated when empty.
    pub id: String,

    /// Address other modules use to reach this ingester. Defaults to the
    /// server's bound address.
    pub addr: Option<String>,

    /// Tokens claimed in the ring.
    pub num_tokens: u32,

    pub ring: RingConfig,
}

impl Default for LifecyclerConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            addr: None,
            num_tokens: 128,
            ring: RingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RingConfig {
    /// Ingesters each trace is written to.
    pub replication_factor: usize,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            replication_factor: 1,
        }
    }
}
