//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, replication factor >= 1)
//! - Validate names that end up in metrics and logs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: Config → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::IpAddr;

use thiserror::Error;

use crate::config::schema::Config;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check every semantic constraint, collecting all failures.
pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.http_listen_address.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.http_listen_address",
            format!("{:?} is not an IP address", config.server.http_listen_address),
        ));
    }
    if !LOG_LEVELS.contains(&config.server.log_level.as_str()) {
        errors.push(ValidationError::new(
            "server.log_level",
            format!("must be one of {}", LOG_LEVELS.join(", ")),
        ));
    }
    if !is_metric_name(&config.server.metrics_namespace) {
        errors.push(ValidationError::new(
            "server.metrics_namespace",
            "must match [a-zA-Z_][a-zA-Z0-9_]*",
        ));
    }

    let positive = [
        ("server.request_timeout_secs", config.server.request_timeout_secs),
        ("querier.query_timeout_secs", config.querier.query_timeout_secs),
        (
            "ingester_client.remote_timeout_secs",
            config.ingester_client.remote_timeout_secs,
        ),
        (
            "distributor.max_spans_per_push",
            config.distributor.max_spans_per_push as u64,
        ),
        (
            "ingester.max_traces_per_user",
            config.ingester.max_traces_per_user as u64,
        ),
        (
            "ingester.lifecycler.num_tokens",
            u64::from(config.ingester.lifecycler.num_tokens),
        ),
        (
            "ingester.lifecycler.ring.replication_factor",
            config.ingester.lifecycler.ring.replication_factor as u64,
        ),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
