//! OS signal handling.
//!
//! SIGINT and SIGTERM both end `App::run`; there is no reload signal.

use tokio::sync::broadcast;

/// Resolve on the first of SIGINT, SIGTERM, or a programmatic shutdown.
pub async fn wait_for_shutdown(mut programmatic: broadcast::Receiver<()>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT"),
        _ = terminate => tracing::info!("received SIGTERM"),
        _ = programmatic.recv() => tracing::info!("shutdown requested"),
    }
}
