//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Bind the listener during module init, before anything else starts
//! - Collect public and authenticated routes from other modules
//! - Expose the gRPC health service behind the gRPC auth interceptors
//! - Wire up middleware (tracing, request ID, timeout)
//! - Serve HTTP/1.1 and HTTP/2 on one port until shutdown

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use thiserror::Error;
use tokio::sync::broadcast;
use tower_http::timeout::TimeoutLayer;

use crate::config::ServerConfig;
use crate::http::request::with_request_id;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;
use crate::security::{AuthMiddleware, GrpcAuthLayer};

/// gRPC methods that open a stream and go through the stream interceptor.
const STREAMING_METHODS: &[&str] = &["/grpc.health.v1.Health/Watch"];

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("server is already running or has stopped")]
    NotBound,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// HTTP and gRPC transport shared by every module.
pub struct Server {
    config: ServerConfig,
    auth: AuthMiddleware,
    listener: Option<std::net::TcpListener>,
    local_addr: SocketAddr,
    public: Router,
    authenticated: Router,
    metrics: Option<PrometheusHandle>,
    shutdown: Shutdown,
    shutdown_rx: Option<broadcast::Receiver<()>>,
}

impl Server {
    /// Bind the listener. Nothing is served until [`Server::run`].
    pub fn new(config: &ServerConfig, auth: AuthMiddleware, shutdown: Shutdown) -> Result<Self, ServerError> {
        let addr = format!("{}:{}", config.http_listen_address, config.http_listen_port);
        let bind = |source| ServerError::Bind {
            addr: addr.clone(),
            source,
        };
        let listener = std::net::TcpListener::bind(&addr).map_err(bind)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        tracing::info!(address = %local_addr, auth = auth.http.strategy_name(), "listener bound");

        Ok(Self {
            config: config.clone(),
            auth,
            listener: Some(listener),
            local_addr,
            public: Router::new(),
            authenticated: Router::new(),
            metrics: metrics::init(&config.metrics_namespace),
            // Subscribe now so a trigger before `run` is not lost.
            shutdown_rx: Some(shutdown.subscribe()),
            shutdown,
        })
    }

    /// Add routes that require a tenant.
    pub fn register(&mut self, routes: Router) {
        self.authenticated = std::mem::take(&mut self.authenticated).merge(routes);
    }

    /// Add routes reachable without a tenant.
    pub fn register_public(&mut self, routes: Router) {
        self.public = std::mem::take(&mut self.public).merge(routes);
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Base URL other modules in this process use to reach the server.
    pub fn advertise_addr(&self) -> String {
        let mut addr = self.local_addr;
        if addr.ip().is_unspecified() {
            addr.set_ip(IpAddr::V4(Ipv4Addr::LOCALHOST));
        }
        format!("http://{addr}")
    }

    /// The complete router: public, authenticated and gRPC routes plus middleware.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        let public = Router::new()
            .route("/ready", get(ready))
            .route("/metrics", get(render_metrics))
            .with_state(self.metrics.clone())
            .merge(self.public.clone());

        let (_, health) = tonic_health::server::health_reporter();
        let grpc = tonic::service::Routes::new(health)
            .into_axum_router()
            .route_layer(GrpcAuthLayer::new(
                self.auth.grpc_unary.clone(),
                self.auth.grpc_stream.clone(),
                STREAMING_METHODS.iter().map(|m| m.to_string()),
            ));

        let router = public
            .merge(self.auth.http.apply(self.authenticated.clone()))
            .merge(grpc)
            .fallback(not_found)
            .layer(TimeoutLayer::new(Duration::from_secs(
                self.config.request_timeout_secs,
            )));
        with_request_id(router)
    }

    /// Serve until SIGINT, SIGTERM or [`Server::shutdown`].
    pub async fn run(&mut self) -> Result<(), ServerError> {
        let (listener, shutdown_rx) = match (self.listener.take(), self.shutdown_rx.take()) {
            (Some(listener), Some(rx)) => (listener, rx),
            _ => return Err(ServerError::NotBound),
        };
        let listener = tokio::net::TcpListener::from_std(listener)?;

        tracing::info!(address = %self.local_addr, "HTTP server starting");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(signals::wait_for_shutdown(shutdown_rx))
            .await?;
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Ask a running (or not yet started) server to stop.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.local_addr)
            .field("running", &self.listener.is_none())
            .finish()
    }
}

async fn ready() -> &'static str {
    "ready"
}

async fn render_metrics(State(handle): State<Option<PrometheusHandle>>) -> Response {
    match handle {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "not found")
}
