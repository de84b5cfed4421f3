use ingress_dag_core::Dag;
use ingress_dag_k8s_cache::Cache;
use ingress_dag_k8s_status::StatusCache;

/// Translates one kind of input resource into DAG fragments.
///
/// Processors are run once per build, in the order they were registered
/// with the builder. They may read anything in the cache but only add to the
/// DAG; conflicts with fragments added earlier are resolved in favor of the
/// earlier fragment and reported on the later resource.
pub trait Processor: Send + Sync {
    fn name(&self) -> &'static str;

    fn run(&self, ctx: &mut Context<'_>);
}

/// State shared by the processors of a single build.
pub struct Context<'a> {
    pub cache: &'a Cache,
    pub dag: &'a mut Dag,
    pub statuses: &'a mut StatusCache,
}
