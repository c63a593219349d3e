//! tracestack server binary.
//!
//! # Architecture Overview
//!
//! ```text
//!                   ┌───────────────────────────────────────────────┐
//!   push / query    │  Server (axum: HTTP/1.1 + HTTP/2, gRPC health) │
//!  ─────────────────┼─▶ auth middleware (X-Scope-OrgID or "fake")    │
//!                   │        │                       │               │
//!                   │        ▼                       ▼               │
//!                   │   Distributor              Querier             │
//!                   │        │  token_for → Ring.get │               │
//!                   │        ▼                       ▼               │
//!                   │   IngesterClient ──HTTP──▶ Ingester(s)         │
//!                   │                                                │
//!                   │  Lifecycle: Server → Ring → Querier →          │
//!                   │             Ingester → Distributor → All       │
//!                   └───────────────────────────────────────────────┘
//! ```

use clap::Parser;

use tracestack::config::Flags;
use tracestack::observability::logging;
use tracestack::App;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Flags::parse().load()?;
    logging::init(&config.server.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        target_module = %config.target,
        auth_enabled = config.auth_enabled,
        "tracestack starting"
    );

    let mut app = App::new(config)?;
    let result = app.run().await;
    app.stop();
    result?;

    tracing::info!("shutdown complete");
    Ok(())
}
