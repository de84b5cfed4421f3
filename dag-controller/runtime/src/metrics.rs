use crate::builder::Build;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{
        counter::Counter,
        family::Family,
        gauge::Gauge,
        histogram::{exponential_buckets, Histogram},
    },
    registry::{Registry, Unit},
};
use std::time::Duration;

/// Metrics describing DAG builds and the resources they were built from.
#[derive(Clone, Debug)]
pub struct BuildMetrics {
    builds: Counter,
    discarded: Counter,
    failures: Counter,
    duration: Histogram,
    resources: Family<ResourceLabels, Gauge>,
    routes: Gauge,
    virtual_hosts: Gauge,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ResourceLabels {
    kind: &'static str,
    status: &'static str,
}

// === impl BuildMetrics ===

impl BuildMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let builds = Counter::default();
        reg.register("builds", "Total number of published DAG builds", builds.clone());

        let discarded = Counter::default();
        reg.register(
            "discarded_builds",
            "Total number of builds discarded because a newer snapshot arrived",
            discarded.clone(),
        );

        let failures = Counter::default();
        reg.register(
            "build_failures",
            "Total number of builds that did not complete",
            failures.clone(),
        );

        let duration = Histogram::new(exponential_buckets(0.001, 2.0, 14));
        reg.register_with_unit(
            "build_duration",
            "Time taken to build a DAG from a snapshot",
            Unit::Seconds,
            duration.clone(),
        );

        let resources = Family::<ResourceLabels, Gauge>::default();
        reg.register(
            "resources",
            "Number of resources in the last build by kind and status",
            resources.clone(),
        );

        let routes = Gauge::default();
        reg.register(
            "routes",
            "Number of routes in the last build",
            routes.clone(),
        );

        let virtual_hosts = Gauge::default();
        reg.register(
            "virtual_hosts",
            "Number of virtual hosts in the last build",
            virtual_hosts.clone(),
        );

        Self {
            builds,
            discarded,
            failures,
            duration,
            resources,
            routes,
            virtual_hosts,
        }
    }

    /// Records a published build.
    pub fn observe(&self, build: &Build, elapsed: Duration) {
        self.builds.inc();
        self.duration.observe(elapsed.as_secs_f64());

        self.resources.clear();
        for ((kind, validity), n) in build.statuses.counts() {
            let labels = ResourceLabels {
                kind: kind.as_str(),
                status: validity.as_str(),
            };
            self.resources.get_or_create(&labels).set(n as i64);
        }
        self.routes.set(build.dag.num_routes() as i64);
        self.virtual_hosts.set(build.dag.num_virtual_hosts() as i64);
    }

    pub fn discarded(&self) {
        self.discarded.inc();
    }

    pub fn failed(&self) {
        self.failures.inc();
    }

    #[cfg(test)]
    pub(crate) fn discarded_count(&self) -> u64 {
        self.discarded.get()
    }

    #[cfg(test)]
    pub(crate) fn builds_count(&self) -> u64 {
        self.builds.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        builder::{Builder, Defaults},
        cache::Cache,
    };
    use prometheus_client::encoding::text::encode;

    #[test]
    fn encodes_build_metrics() {
        let mut prom = Registry::default();
        let metrics = BuildMetrics::register(prom.sub_registry_with_prefix("dag"));

        let build = Builder::new(Defaults::default()).build(&Cache::default());
        metrics.observe(&build, Duration::from_millis(3));
        metrics.discarded();

        let mut text = String::new();
        encode(&mut text, &prom).unwrap();
        assert!(text.contains("dag_builds_total 1"), "{text}");
        assert!(text.contains("dag_discarded_builds_total 1"), "{text}");
        assert!(text.contains("dag_build_failures_total 0"), "{text}");
        assert!(text.contains("dag_routes 0"), "{text}");
        assert!(text.contains("dag_build_duration_seconds_count 1"), "{text}");
    }
}
