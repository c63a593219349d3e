//! Process entry object: owns every module instance and drives their lifecycle.
//!
//! # Data Flow
//! ```text
//! Config
//!     → security::select(auth_enabled)   (once, before any module)
//!     → Lifecycle::init(MODULES, target) (Server first, then Ring, ...)
//!     → App::run                         (serve until signal or shutdown)
//!     → App::stop                        (transport shutdown, then reverse stops)
//! ```

pub mod modules;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Config;
use crate::distributor::Distributor;
use crate::http::{Server, ServerError};
use crate::ingester::Ingester;
use crate::lifecycle::{InitError, Lifecycle, Shutdown};
use crate::querier::Querier;
use crate::ring::Ring;
use crate::security::{self, AuthMiddleware};

pub use modules::{ModuleName, UnknownModuleName, MODULES};

/// Root aggregate handed to every init and stop action.
///
/// Each module stores its instance in its own field; dependents read it from
/// there during their own init.
#[derive(Debug)]
pub struct Components {
    pub config: Config,
    pub auth: AuthMiddleware,
    pub shutdown: Shutdown,
    pub server: Option<Server>,
    pub ring: Option<Arc<Ring>>,
    pub distributor: Option<Arc<Distributor>>,
    pub ingester: Option<Arc<Ingester>>,
    pub querier: Option<Arc<Querier>>,
}

impl Components {
    pub fn new(config: Config, auth: AuthMiddleware) -> Self {
        Self {
            config,
            auth,
            shutdown: Shutdown::new(),
            server: None,
            ring: None,
            distributor: None,
            ingester: None,
            querier: None,
        }
    }
}

pub struct App {
    components: Components,
    lifecycle: Lifecycle<ModuleName>,
    target: ModuleName,
}

impl App {
    /// Select auth, then initialise the configured target and its dependencies.
    pub fn new(config: Config) -> Result<Self, InitError<ModuleName>> {
        let target = config.target;
        let auth = security::select(config.auth_enabled);
        let mut components = Components::new(config, auth);

        let mut lifecycle = Lifecycle::new();
        lifecycle.init(&MODULES, &mut components, target)?;
        tracing::info!(root = %target, modules = ?lifecycle.initialised(), "modules initialised");

        Ok(Self {
            components,
            lifecycle,
            target,
        })
    }

    /// Serve until SIGINT, SIGTERM or a trigger on [`App::shutdown_handle`].
    pub async fn run(&mut self) -> Result<(), ServerError> {
        match self.components.server.as_mut() {
            Some(server) => server.run().await,
            None => Err(ServerError::NotBound),
        }
    }

    /// Stop the transport, then every initialised module in reverse order.
    pub fn stop(&mut self) {
        self.components.shutdown.trigger();
        self.lifecycle.stop(&MODULES, &mut self.components, self.target);
    }

    /// Handle that ends [`App::run`] from another task.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.components.shutdown.clone()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.components.server.as_ref().map(Server::local_addr)
    }

    pub fn is_initialised(&self, module: ModuleName) -> bool {
        self.lifecycle.is_initialised(module)
    }

    pub fn components(&self) -> &Components {
        &self.components
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("target", &self.target)
            .field("initialised", &self.lifecycle.initialised())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    fn config(target: ModuleName) -> Config {
        Config {
            target,
            server: ServerConfig {
                http_listen_address: "127.0.0.1".into(),
                http_listen_port: 0,
                ..ServerConfig::default()
            },
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_all_initialises_everything_in_order() {
        use ModuleName as M;

        let app = App::new(config(M::All)).unwrap();
        assert_eq!(
            app.lifecycle.initialised(),
            [M::Server, M::Ring, M::Querier, M::Ingester, M::Distributor, M::All]
        );
        assert!(app.local_addr().is_some());
        assert_eq!(app.components().ring.as_ref().unwrap().instances().len(), 1);
    }

    #[tokio::test]
    async fn test_target_limits_closure() {
        let app = App::new(config(ModuleName::Querier)).unwrap();
        assert!(app.is_initialised(ModuleName::Querier));
        assert!(!app.is_initialised(ModuleName::Ingester));
        assert!(app.components().ingester.is_none());
    }

    #[tokio::test]
    async fn test_stop_leaves_ring_and_clears_state() {
        let mut app = App::new(config(ModuleName::All)).unwrap();
        let ring = app.components().ring.clone().unwrap();

        app.stop();
        assert!(ring.instances().is_empty());
        assert!(!app.is_initialised(ModuleName::Server));
        // Second stop is a no-op.
        app.stop();
    }

    #[tokio::test]
    async fn test_server_init_failure_names_module() {
        use ModuleName as M;

        let first = App::new(config(ModuleName::Server)).unwrap();
        let mut taken = config(ModuleName::All);
        taken.server.http_listen_port = first.local_addr().unwrap().port();

        let err = App::new(taken).unwrap_err();
        assert_eq!(err.module(), M::Server);
        assert_eq!(err.chain(), [M::All, M::Querier, M::Ring, M::Server]);
    }
}
