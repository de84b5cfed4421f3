use crate::{
    config::Defaults,
    httpproxy::HttpProxyProcessor,
    ingress::IngressProcessor,
    processor::{Context, Processor},
    validate,
};
use ingress_dag_core::Dag;
use ingress_dag_k8s_cache::Cache;
use ingress_dag_k8s_status::{StatusCache, Validity};
use std::sync::Arc;

/// Builds DAGs from cache snapshots.
///
/// A builder is configured once and may be used for any number of builds.
/// Each build is independent: the same snapshot always produces the same
/// DAG and statuses.
pub struct Builder {
    defaults: Arc<Defaults>,
    processors: Vec<Box<dyn Processor>>,
}

/// The outcome of a build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Build {
    pub dag: Arc<Dag>,
    pub statuses: StatusCache,
}

/// The stages a build goes through.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Empty,
    Processing,
    Validating,
    Frozen,
}

/// A build in progress.
struct Pending<'c> {
    cache: &'c Cache,
    dag: Dag,
    statuses: StatusCache,
    phase: Phase,
}

// === impl Builder ===

impl Builder {
    /// Creates a builder that runs the Ingress processor followed by the
    /// HTTPProxy processor.
    pub fn new(defaults: Defaults) -> Self {
        let defaults = Arc::new(defaults);
        Self {
            processors: vec![
                Box::new(IngressProcessor::new(defaults.clone())),
                Box::new(HttpProxyProcessor::new(defaults.clone())),
            ],
            defaults,
        }
    }

    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    /// Returns the names of the registered processors, in run order.
    pub fn processors(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.processors.iter().map(|p| p.name())
    }

    pub fn build(&self, cache: &Cache) -> Build {
        let mut pending = Pending::new(cache);
        pending.process(&self.processors);
        pending.validate();
        let build = pending.freeze();

        let counts = build.statuses.counts();
        let count = |v: Validity| {
            counts
                .iter()
                .filter(|((_, validity), _)| *validity == v)
                .map(|(_, n)| n)
                .sum::<usize>()
        };
        tracing::info!(
            listeners = build.dag.listeners.len(),
            virtual_hosts = build.dag.num_virtual_hosts(),
            routes = build.dag.num_routes(),
            services = build.dag.services.len(),
            secrets = build.dag.secrets.len(),
            valid = count(Validity::Valid),
            invalid = count(Validity::Invalid),
            orphaned = count(Validity::Orphaned),
            "Built DAG"
        );
        build
    }
}

// === impl Pending ===

impl<'c> Pending<'c> {
    fn new(cache: &'c Cache) -> Self {
        Self {
            cache,
            dag: Dag::default(),
            statuses: StatusCache::default(),
            phase: Phase::Empty,
        }
    }

    fn advance(&mut self, next: Phase) {
        debug_assert!(self.phase < next, "{:?} must precede {next:?}", self.phase);
        tracing::trace!(from = ?self.phase, to = ?next, "Build phase");
        self.phase = next;
    }

    fn process(&mut self, processors: &[Box<dyn Processor>]) {
        self.advance(Phase::Processing);
        let mut ctx = Context {
            cache: self.cache,
            dag: &mut self.dag,
            statuses: &mut self.statuses,
        };
        for processor in processors {
            let _span = tracing::debug_span!("processor", name = processor.name()).entered();
            processor.run(&mut ctx);
        }
    }

    fn validate(&mut self) {
        self.advance(Phase::Validating);
        validate::run(self.cache, &mut self.dag, &mut self.statuses);
    }

    fn freeze(mut self) -> Build {
        self.advance(Phase::Frozen);
        Build {
            dag: Arc::new(self.dag),
            statuses: self.statuses,
        }
    }
}
