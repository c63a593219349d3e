//! Module registry.
//!
//! # Responsibilities
//! - Map a module identifier to its declared dependencies
//! - Hold the optional init and stop action for each module
//! - Reject malformed tables (duplicates, dangling deps, cycles) at build time
//!
//! # Design Decisions
//! - Immutable once built; there is no registration API on a built registry
//! - Dependency order is preserved exactly as declared
//! - Cycle detection happens here, never during initialisation

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use thiserror::Error;

/// Error type returned by module actions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An init or stop action run against the root aggregate `T`.
pub type Action<T> = Box<dyn Fn(&mut T) -> Result<(), BoxError> + Send + Sync>;

/// Identifier usable as a module key.
pub trait ModuleId: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {}

impl<M> ModuleId for M where M: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {}

/// Declared dependencies and actions for one module.
pub struct ModuleDescriptor<M, T> {
    deps: Vec<M>,
    init: Option<Action<T>>,
    stop: Option<Action<T>>,
}

impl<M: ModuleId, T> ModuleDescriptor<M, T> {
    /// A descriptor with the given dependencies and no actions.
    pub fn new(deps: impl IntoIterator<Item = M>) -> Self {
        Self {
            deps: deps.into_iter().collect(),
            init: None,
            stop: None,
        }
    }

    /// Attach an init action.
    pub fn with_init<F>(mut self, init: F) -> Self
    where
        F: Fn(&mut T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.init = Some(Box::new(init));
        self
    }

    /// Attach a stop action.
    pub fn with_stop<F>(mut self, stop: F) -> Self
    where
        F: Fn(&mut T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.stop = Some(Box::new(stop));
        self
    }

    /// Dependencies in declared order.
    pub fn deps(&self) -> &[M] {
        &self.deps
    }

    pub fn init(&self) -> Option<&Action<T>> {
        self.init.as_ref()
    }

    pub fn stop(&self) -> Option<&Action<T>> {
        self.stop.as_ref()
    }
}

impl<M: fmt::Debug, T> fmt::Debug for ModuleDescriptor<M, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("deps", &self.deps)
            .field("init", &self.init.is_some())
            .field("stop", &self.stop.is_some())
            .finish()
    }
}

/// Errors detected while building a registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError<M: fmt::Debug + fmt::Display> {
    /// The same identifier was registered twice.
    #[error("module {0} registered more than once")]
    Duplicate(M),

    /// A module depends on an identifier that was never registered.
    #[error("module {module} depends on unregistered module {dependency}")]
    UnknownDependency { module: M, dependency: M },

    /// The dependency relation contains a cycle.
    #[error("dependency cycle detected: {}", format_path(.0))]
    Cycle(Vec<M>),
}

fn format_path<M: fmt::Display>(path: &[M]) -> String {
    path.iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Immutable table of module descriptors.
pub struct Registry<M, T> {
    modules: HashMap<M, ModuleDescriptor<M, T>>,
}

impl<M: ModuleId, T> Registry<M, T> {
    pub fn builder() -> RegistryBuilder<M, T> {
        RegistryBuilder {
            entries: Vec::new(),
        }
    }

    /// Look up the descriptor for `module`.
    pub fn get(&self, module: M) -> Option<&ModuleDescriptor<M, T>> {
        self.modules.get(&module)
    }

    pub fn contains(&self, module: M) -> bool {
        self.modules.contains_key(&module)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl<M: fmt::Debug, T> fmt::Debug for Registry<M, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.modules.iter()).finish()
    }
}

/// Collects descriptors and validates them into a [`Registry`].
pub struct RegistryBuilder<M, T> {
    entries: Vec<(M, ModuleDescriptor<M, T>)>,
}

impl<M: ModuleId, T> RegistryBuilder<M, T> {
    pub fn module(mut self, id: M, descriptor: ModuleDescriptor<M, T>) -> Self {
        self.entries.push((id, descriptor));
        self
    }

    /// Validate and freeze the table.
    pub fn build(self) -> Result<Registry<M, T>, RegistryError<M>> {
        let mut modules = HashMap::with_capacity(self.entries.len());
        // Registration order, so cycle reports are deterministic.
        let mut order = Vec::with_capacity(self.entries.len());
        for (id, descriptor) in self.entries {
            if modules.insert(id, descriptor).is_some() {
                return Err(RegistryError::Duplicate(id));
            }
            order.push(id);
        }

        for id in &order {
            for dep in modules[id].deps() {
                if !modules.contains_key(dep) {
                    return Err(RegistryError::UnknownDependency {
                        module: *id,
                        dependency: *dep,
                    });
                }
            }
        }

        let registry = Registry { modules };
        let mut done = HashSet::new();
        for id in order {
            let mut path = Vec::new();
            registry.check_acyclic(id, &mut path, &mut done)?;
        }
        Ok(registry)
    }
}

impl<M: ModuleId, T> Registry<M, T> {
    fn check_acyclic(
        &self,
        id: M,
        path: &mut Vec<M>,
        done: &mut HashSet<M>,
    ) -> Result<(), RegistryError<M>> {
        if done.contains(&id) {
            return Ok(());
        }
        if let Some(start) = path.iter().position(|m| *m == id) {
            let mut cycle = path[start..].to_vec();
            cycle.push(id);
            return Err(RegistryError::Cycle(cycle));
        }

        path.push(id);
        for dep in self.modules[&id].deps() {
            self.check_acyclic(*dep, path, done)?;
        }
        path.pop();
        done.insert(id);
        Ok(())
    }
}
