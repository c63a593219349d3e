//! Dependency-ordered module initialisation and shutdown.
//!
//! # Responsibilities
//! - Initialise the dependency closure of a target module, leaves first
//! - Remember which modules are up so nothing starts or stops twice
//! - Stop a closure in the reverse of the order it was started
//!
//! # Design Decisions
//! - Synchronous and single-threaded: both operations take `&mut self`
//! - Fail fast on init: first error aborts, nothing is rolled back
//! - Best effort on stop: failures are logged and shutdown continues
//! - No run-time cycle check; see [`RegistryBuilder::build`](super::registry::RegistryBuilder::build)

use std::collections::HashSet;

use thiserror::Error;

use super::registry::{BoxError, ModuleId, Registry};

/// Errors returned by [`Lifecycle::init`].
#[derive(Debug, Error)]
pub enum InitError<M: ModuleId> {
    /// A module's init action failed.
    #[error("error initialising module: {module}")]
    Module {
        module: M,
        /// Modules from the requested target down to `module`.
        chain: Vec<M>,
        #[source]
        source: BoxError,
    },

    /// The registry has no entry for the module. Always a programming error.
    #[error("module {module} is not registered (required via {})", format_chain(.chain))]
    UnknownModule { module: M, chain: Vec<M> },
}

impl<M: ModuleId> InitError<M> {
    /// The module whose initialisation failed.
    pub fn module(&self) -> M {
        match self {
            InitError::Module { module, .. } | InitError::UnknownModule { module, .. } => *module,
        }
    }

    /// Path from the requested target down to the failing module.
    pub fn chain(&self) -> &[M] {
        match self {
            InitError::Module { chain, .. } | InitError::UnknownModule { chain, .. } => chain,
        }
    }

    fn within(mut self, parent: M) -> Self {
        match &mut self {
            InitError::Module { chain, .. } | InitError::UnknownModule { chain, .. } => {
                chain.insert(0, parent)
            }
        }
        self
    }
}

fn format_chain<M: ModuleId>(chain: &[M]) -> String {
    chain
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Tracks initialised modules for one root aggregate.
#[derive(Debug)]
pub struct Lifecycle<M> {
    inited: HashSet<M>,
    /// Successful inits, oldest first.
    order: Vec<M>,
}

impl<M: ModuleId> Lifecycle<M> {
    pub fn new() -> Self {
        Self {
            inited: HashSet::new(),
            order: Vec::new(),
        }
    }

    /// Whether `module` is currently marked initialised.
    pub fn is_initialised(&self, module: M) -> bool {
        self.inited.contains(&module)
    }

    /// Initialised modules in the order they came up.
    pub fn initialised(&self) -> &[M] {
        &self.order
    }

    /// Initialise `module` and everything it transitively depends on.
    ///
    /// Already-initialised modules are skipped, so calling this again with
    /// the same or another target only does work for newly reachable modules.
    pub fn init<T>(
        &mut self,
        registry: &Registry<M, T>,
        target: &mut T,
        module: M,
    ) -> Result<(), InitError<M>> {
        if self.inited.contains(&module) {
            return Ok(());
        }

        let descriptor = registry.get(module).ok_or(InitError::UnknownModule {
            module,
            chain: vec![module],
        })?;

        for dep in descriptor.deps() {
            self.init(registry, target, *dep)
                .map_err(|e| e.within(module))?;
        }

        tracing::info!(module = %module, "initialising");
        if let Some(init) = descriptor.init() {
            init(target).map_err(|source| InitError::Module {
                module,
                chain: vec![module],
                source,
            })?;
        }

        self.inited.insert(module);
        self.order.push(module);
        Ok(())
    }

    /// Stop `module` and its dependency closure, dependents first.
    ///
    /// A no-op when `module` is not initialised. Stop failures are logged and
    /// never returned.
    pub fn stop<T>(&mut self, registry: &Registry<M, T>, target: &mut T, module: M) {
        if !self.inited.contains(&module) {
            return;
        }

        let mut closure = HashSet::new();
        self.collect_closure(registry, module, &mut closure);

        let stopping: Vec<M> = self
            .order
            .iter()
            .rev()
            .copied()
            .filter(|m| closure.contains(m))
            .collect();

        for m in stopping {
            self.inited.remove(&m);
            self.order.retain(|o| *o != m);

            let Some(stop) = registry.get(m).and_then(|d| d.stop()) else {
                continue;
            };

            tracing::info!(module = %m, "stopping");
            if let Err(e) = stop(target) {
                tracing::error!(module = %m, error = %e, "error stopping module");
            }
        }
    }

    fn collect_closure<T>(&self, registry: &Registry<M, T>, module: M, closure: &mut HashSet<M>) {
        if !self.inited.contains(&module) || !closure.insert(module) {
            return;
        }
        if let Some(descriptor) = registry.get(module) {
            for dep in descriptor.deps() {
                self.collect_closure(registry, *dep, closure);
            }
        }
    }
}

impl<M: ModuleId> Default for Lifecycle<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::registry::ModuleDescriptor;

    /// Root aggregate that records every action it sees.
    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        fail_init: HashSet<&'static str>,
        fail_stop: HashSet<&'static str>,
    }

    impl Recorder {
        fn inits(&self) -> Vec<&str> {
            self.matching("init ")
        }

        fn stops(&self) -> Vec<&str> {
            self.matching("stop ")
        }

        fn matching(&self, prefix: &str) -> Vec<&str> {
            self.events
                .iter()
                .filter_map(|e| e.strip_prefix(prefix))
                .collect()
        }
    }

    fn recorded(name: &'static str, deps: &[&'static str]) -> ModuleDescriptor<&'static str, Recorder> {
        ModuleDescriptor::new(deps.iter().copied())
            .with_init(move |r: &mut Recorder| {
                if r.fail_init.contains(name) {
                    return Err(format!("{name} refused to start").into());
                }
                r.events.push(format!("init {name}"));
                Ok(())
            })
            .with_stop(move |r: &mut Recorder| {
                r.events.push(format!("stop {name}"));
                if r.fail_stop.contains(name) {
                    return Err(format!("{name} refused to stop").into());
                }
                Ok(())
            })
    }

    fn abc() -> Registry<&'static str, Recorder> {
        Registry::builder()
            .module("A", recorded("A", &[]))
            .module("B", recorded("B", &["A"]))
            .module("C", recorded("C", &["A", "B"]))
            .build()
            .unwrap()
    }

    /// X <- A, X <- B, D -> [A, B]
    fn diamond() -> Registry<&'static str, Recorder> {
        Registry::builder()
            .module("X", recorded("X", &[]))
            .module("A", recorded("A", &["X"]))
            .module("B", recorded("B", &["X"]))
            .module("D", recorded("D", &["A", "B"]))
            .build()
            .unwrap()
    }

    #[test]
    fn test_init_order_and_stop_order() {
        let registry = abc();
        let mut lifecycle = Lifecycle::new();
        let mut rec = Recorder::default();

        lifecycle.init(&registry, &mut rec, "C").unwrap();
        assert_eq!(rec.inits(), ["A", "B", "C"]);
        assert_eq!(lifecycle.initialised(), ["A", "B", "C"]);

        lifecycle.stop(&registry, &mut rec, "C");
        assert_eq!(rec.stops(), ["C", "B", "A"]);
        assert!(lifecycle.initialised().is_empty());
    }

    #[test]
    fn test_init_is_idempotent() {
        let registry = abc();
        let mut lifecycle = Lifecycle::new();
        let mut rec = Recorder::default();

        lifecycle.init(&registry, &mut rec, "C").unwrap();
        lifecycle.init(&registry, &mut rec, "C").unwrap();
        lifecycle.init(&registry, &mut rec, "B").unwrap();
        assert_eq!(rec.inits(), ["A", "B", "C"]);
    }

    #[test]
    fn test_second_root_only_inits_new_modules() {
        let registry = abc();
        let mut lifecycle = Lifecycle::new();
        let mut rec = Recorder::default();

        lifecycle.init(&registry, &mut rec, "B").unwrap();
        lifecycle.init(&registry, &mut rec, "C").unwrap();
        assert_eq!(rec.inits(), ["A", "B", "C"]);
    }

    #[test]
    fn test_failed_dependency_blocks_dependents() {
        let registry = abc();
        let mut lifecycle = Lifecycle::new();
        let mut rec = Recorder::default();
        rec.fail_init.insert("A");

        let err = lifecycle.init(&registry, &mut rec, "C").unwrap_err();
        assert_eq!(err.module(), "A");
        assert_eq!(err.chain(), ["C", "A"]);
        assert!(err.to_string().contains("A"));
        assert!(rec.inits().is_empty());
        assert!(!lifecycle.is_initialised("A"));

        lifecycle.stop(&registry, &mut rec, "C");
        assert!(rec.stops().is_empty());
    }

    #[test]
    fn test_partial_init_keeps_successes() {
        let registry = abc();
        let mut lifecycle = Lifecycle::new();
        let mut rec = Recorder::default();
        rec.fail_init.insert("C");

        let err = lifecycle.init(&registry, &mut rec, "C").unwrap_err();
        assert_eq!(err.module(), "C");
        assert_eq!(rec.inits(), ["A", "B"]);
        assert!(lifecycle.is_initialised("A"));
        assert!(lifecycle.is_initialised("B"));
        assert!(!lifecycle.is_initialised("C"));

        // C never came up, so stopping it does nothing; B still can be stopped.
        lifecycle.stop(&registry, &mut rec, "C");
        assert!(rec.stops().is_empty());
        lifecycle.stop(&registry, &mut rec, "B");
        assert_eq!(rec.stops(), ["B", "A"]);
    }

    #[test]
    fn test_retry_after_failure_only_inits_remaining() {
        let registry = abc();
        let mut lifecycle = Lifecycle::new();
        let mut rec = Recorder::default();
        rec.fail_init.insert("C");

        assert!(lifecycle.init(&registry, &mut rec, "C").is_err());
        rec.fail_init.clear();
        lifecycle.init(&registry, &mut rec, "C").unwrap();
        assert_eq!(rec.inits(), ["A", "B", "C"]);
    }

    #[test]
    fn test_first_failing_sibling_stops_the_walk() {
        let registry: Registry<&'static str, Recorder> = Registry::builder()
            .module("A", recorded("A", &[]))
            .module("B", recorded("B", &[]))
            .module("R", recorded("R", &["A", "B"]))
            .build()
            .unwrap();
        let mut lifecycle = Lifecycle::new();
        let mut rec = Recorder::default();
        rec.fail_init.insert("A");

        assert!(lifecycle.init(&registry, &mut rec, "R").is_err());
        assert!(rec.inits().is_empty());
    }

    #[test]
    fn test_stop_never_fails_and_continues() {
        let registry = abc();
        let mut lifecycle = Lifecycle::new();
        let mut rec = Recorder::default();
        rec.fail_stop.insert("B");

        lifecycle.init(&registry, &mut rec, "C").unwrap();
        lifecycle.stop(&registry, &mut rec, "C");
        assert_eq!(rec.stops(), ["C", "B", "A"]);
        assert!(!lifecycle.is_initialised("B"));
    }

    #[test]
    fn test_stop_twice_is_noop() {
        let registry = abc();
        let mut lifecycle = Lifecycle::new();
        let mut rec = Recorder::default();

        lifecycle.init(&registry, &mut rec, "C").unwrap();
        lifecycle.stop(&registry, &mut rec, "C");
        lifecycle.stop(&registry, &mut rec, "C");
        assert_eq!(rec.stops(), ["C", "B", "A"]);
    }

    #[test]
    fn test_stop_uninitialised_is_noop() {
        let registry = abc();
        let mut lifecycle = Lifecycle::new();
        let mut rec = Recorder::default();

        lifecycle.stop(&registry, &mut rec, "C");
        assert!(rec.events.is_empty());
    }

    #[test]
    fn test_diamond_stop_respects_dependencies() {
        let registry = diamond();
        let mut lifecycle = Lifecycle::new();
        let mut rec = Recorder::default();

        lifecycle.init(&registry, &mut rec, "D").unwrap();
        assert_eq!(rec.inits(), ["X", "A", "B", "D"]);

        lifecycle.stop(&registry, &mut rec, "D");
        assert_eq!(rec.stops(), ["D", "B", "A", "X"]);
    }

    #[test]
    fn test_stop_subtree_leaves_rest_running() {
        let registry = diamond();
        let mut lifecycle = Lifecycle::new();
        let mut rec = Recorder::default();

        lifecycle.init(&registry, &mut rec, "D").unwrap();
        lifecycle.stop(&registry, &mut rec, "A");
        assert_eq!(rec.stops(), ["A", "X"]);
        assert!(lifecycle.is_initialised("B"));
        assert!(lifecycle.is_initialised("D"));
    }

    #[test]
    fn test_modules_without_actions_are_tracked() {
        let registry: Registry<&'static str, Recorder> = Registry::builder()
            .module("A", recorded("A", &[]))
            .module("all", ModuleDescriptor::new(["A"]))
            .build()
            .unwrap();
        let mut lifecycle = Lifecycle::new();
        let mut rec = Recorder::default();

        lifecycle.init(&registry, &mut rec, "all").unwrap();
        assert!(lifecycle.is_initialised("all"));

        lifecycle.stop(&registry, &mut rec, "all");
        assert_eq!(rec.stops(), ["A"]);
        assert!(!lifecycle.is_initialised("all"));
    }

    #[test]
    fn test_unknown_module_is_distinct_error() {
        let registry = abc();
        let mut lifecycle = Lifecycle::new();
        let mut rec = Recorder::default();

        let err = lifecycle.init(&registry, &mut rec, "Z").unwrap_err();
        assert!(matches!(err, InitError::UnknownModule { module: "Z", .. }));
    }

    #[test]
    fn test_separate_lifecycles_do_not_share_state() {
        let registry = abc();
        let mut first = Lifecycle::new();
        let mut second = Lifecycle::new();
        let mut rec = Recorder::default();

        first.init(&registry, &mut rec, "A").unwrap();
        second.init(&registry, &mut rec, "A").unwrap();
        assert_eq!(rec.inits(), ["A", "A"]);
    }
}
