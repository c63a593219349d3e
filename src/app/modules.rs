//! The server's module table.
//!
//! Every module depends on `Server` so routes can be registered during init.
//! `All` has no actions of its own; it only pulls the others in.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app::Components;
use crate::distributor::{self, Distributor};
use crate::http::Server;
use crate::ingester::{self, Ingester, IngesterClient};
use crate::lifecycle::{BoxError, ModuleDescriptor, Registry};
use crate::querier::{self, Querier};
use crate::ring::{self, Ring};

/// Modules that can be targeted from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModuleName {
    Server,
    Ring,
    Distributor,
    Ingester,
    Querier,
    All,
}

impl ModuleName {
    pub const ALL: [ModuleName; 6] = [
        ModuleName::Server,
        ModuleName::Ring,
        ModuleName::Distributor,
        ModuleName::Ingester,
        ModuleName::Querier,
        ModuleName::All,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModuleName::Server => "server",
            ModuleName::Ring => "ring",
            ModuleName::Distributor => "distributor",
            ModuleName::Ingester => "ingester",
            ModuleName::Querier => "querier",
            ModuleName::All => "all",
        }
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unrecognised module name: {0:?}")]
pub struct UnknownModuleName(pub String);

impl FromStr for ModuleName {
    type Err = UnknownModuleName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModuleName::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownModuleName(s.to_string()))
    }
}

impl TryFrom<String> for ModuleName {
    type Error = UnknownModuleName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModuleName> for String {
    fn from(name: ModuleName) -> Self {
        name.as_str().to_string()
    }
}

/// A module ran before one it needs. Only possible with a broken table.
#[derive(Debug, Error)]
#[error("module {module} requires {needed}, which is not initialised")]
pub struct MissingDependency {
    module: ModuleName,
    needed: ModuleName,
}

fn server(c: &mut Components, module: ModuleName) -> Result<&mut Server, MissingDependency> {
    c.server.as_mut().ok_or(MissingDependency {
        module,
        needed: ModuleName::Server,
    })
}

fn ring_of(c: &Components, module: ModuleName) -> Result<Arc<Ring>, MissingDependency> {
    c.ring.clone().ok_or(MissingDependency {
        module,
        needed: ModuleName::Ring,
    })
}

fn init_server(c: &mut Components) -> Result<(), BoxError> {
    let server = Server::new(&c.config.server, c.auth.clone(), c.shutdown.clone())?;
    c.server = Some(server);
    Ok(())
}

fn stop_server(c: &mut Components) -> Result<(), BoxError> {
    if let Some(server) = &c.server {
        server.shutdown();
    }
    Ok(())
}

fn init_ring(c: &mut Components) -> Result<(), BoxError> {
    let ring = Arc::new(Ring::new(&c.config.ingester.lifecycler.ring));
    server(c, ModuleName::Ring)?.register_public(ring::routes(ring.clone()));
    c.ring = Some(ring);
    Ok(())
}

fn init_distributor(c: &mut Components) -> Result<(), BoxError> {
    let ring = ring_of(c, ModuleName::Distributor)?;
    let client = IngesterClient::new(&c.config.ingester_client)?;
    let distributor = Arc::new(Distributor::new(&c.config.distributor, ring, client));
    server(c, ModuleName::Distributor)?.register(distributor::http::routes(distributor.clone()));
    c.distributor = Some(distributor);
    Ok(())
}

fn init_ingester(c: &mut Components) -> Result<(), BoxError> {
    let ring = ring_of(c, ModuleName::Ingester)?;
    let advertised = server(c, ModuleName::Ingester)?.advertise_addr();
    let addr = c.config.ingester.lifecycler.addr.clone().unwrap_or(advertised);
    let ingester = Arc::new(Ingester::new(&c.config.ingester, ring, addr)?);
    server(c, ModuleName::Ingester)?.register(ingester::http::routes(ingester.clone()));
    c.ingester = Some(ingester);
    Ok(())
}

fn stop_ingester(c: &mut Components) -> Result<(), BoxError> {
    if let Some(ingester) = &c.ingester {
        ingester.shutdown();
    }
    Ok(())
}

fn init_querier(c: &mut Components) -> Result<(), BoxError> {
    let ring = ring_of(c, ModuleName::Querier)?;
    let client = IngesterClient::new(&c.config.ingester_client)?;
    let querier = Arc::new(Querier::new(&c.config.querier, ring, client));
    server(c, ModuleName::Querier)?.register(querier::http::routes(querier.clone()));
    c.querier = Some(querier);
    Ok(())
}

const NO_DEPS: [ModuleName; 0] = [];

fn build() -> Registry<ModuleName, Components> {
    use ModuleName as M;

    Registry::builder()
        .module(
            M::Server,
            ModuleDescriptor::new(NO_DEPS)
                .with_init(init_server)
                .with_stop(stop_server),
        )
        .module(M::Ring, ModuleDescriptor::new([M::Server]).with_init(init_ring))
        .module(
            M::Distributor,
            ModuleDescriptor::new([M::Ring, M::Server]).with_init(init_distributor),
        )
        .module(
            M::Ingester,
            ModuleDescriptor::new([M::Ring, M::Server])
                .with_init(init_ingester)
                .with_stop(stop_ingester),
        )
        .module(
            M::Querier,
            ModuleDescriptor::new([M::Ring, M::Server]).with_init(init_querier),
        )
        .module(
            M::All,
            ModuleDescriptor::new([M::Querier, M::Ingester, M::Distributor]),
        )
        .build()
        .expect("static module table is well-formed")
}

/// Process-wide module table, built on first use.
pub static MODULES: LazyLock<Registry<ModuleName, Components>> = LazyLock::new(build);
