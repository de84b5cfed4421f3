//! Graph-wide validation passes, run once all processors have finished.

use ahash::AHashSet as HashSet;
use ingress_dag_core::{Dag, ResourceId, ResourceRef, RouteMatch, ServiceKey, VirtualHost};
use ingress_dag_k8s_api::ResourceExt;
use ingress_dag_k8s_cache::Cache;
use ingress_dag_k8s_status::{Reason, StatusCache};
use std::collections::BTreeSet;

pub(crate) fn run(cache: &Cache, dag: &mut Dag, statuses: &mut StatusCache) {
    remove_duplicate_routes(dag, statuses);
    remove_insecure_secure_virtual_hosts(dag, statuses);
    remove_empty_virtual_hosts(dag);
    remove_empty_listeners(dag);
    remove_unreferenced_services_and_secrets(dag);
    mark_orphans(cache, statuses);
}

/// Within a virtual host the first route with a given match wins. Later
/// routes with the same match are removed and reported on their source.
fn remove_duplicate_routes(dag: &mut Dag, statuses: &mut StatusCache) {
    let mut duplicates = BTreeSet::<(ResourceRef, String)>::new();
    for listener in dag.listeners.values_mut() {
        let vhosts = listener.virtual_hosts.values_mut().chain(
            listener
                .secure_virtual_hosts
                .values_mut()
                .map(|svh| &mut svh.virtual_host),
        );
        for vhost in vhosts {
            dedup_routes(vhost, &mut duplicates);
        }
    }

    for (source, message) in duplicates {
        tracing::warn!(%source, %message, "Duplicate route");
        statuses.error(&source, Reason::DuplicateMatchConditions, message);
    }
}

fn dedup_routes(vhost: &mut VirtualHost, duplicates: &mut BTreeSet<(ResourceRef, String)>) {
    let mut seen = HashSet::<RouteMatch>::new();
    let name = vhost.name.clone();
    vhost.routes.retain(|route| {
        if seen.insert(route.route_match.normalized()) {
            return true;
        }
        duplicates.insert((
            route.source.clone(),
            format!(
                "duplicate match conditions on host {name:?}: {}",
                route.route_match
            ),
        ));
        false
    });
}

fn remove_insecure_secure_virtual_hosts(dag: &mut Dag, statuses: &mut StatusCache) {
    for listener in dag.listeners.values_mut() {
        listener.secure_virtual_hosts.retain(|name, svh| {
            if svh.secret.is_some() {
                return true;
            }
            if let Some(owner) = &svh.tls_owner {
                statuses.error(
                    owner,
                    Reason::SecretNotValid,
                    format!("secure virtual host {name:?} has no valid TLS secret"),
                );
            }
            false
        });
    }
}

fn remove_empty_virtual_hosts(dag: &mut Dag) {
    for listener in dag.listeners.values_mut() {
        listener.virtual_hosts.retain(|_, vh| !vh.routes.is_empty());
        listener
            .secure_virtual_hosts
            .retain(|_, svh| !svh.virtual_host.routes.is_empty());
    }
}

fn remove_empty_listeners(dag: &mut Dag) {
    dag.listeners.retain(|_, l| !l.is_empty());
}

/// Drops services and secrets that no surviving route or secure virtual
/// host refers to.
fn remove_unreferenced_services_and_secrets(dag: &mut Dag) {
    let mut services = HashSet::<ServiceKey>::new();
    let mut secrets = HashSet::<ResourceId>::new();
    for listener in dag.listeners.values() {
        for svh in listener.secure_virtual_hosts.values() {
            secrets.extend(svh.secret.iter().map(|s| s.id.clone()));
        }
        for vhost in listener.all_virtual_hosts() {
            for cluster in vhost.routes.iter().flat_map(|r| r.clusters.iter()) {
                services.insert(cluster.upstream.key.clone());
                secrets.extend(cluster.client_certificate.iter().map(|s| s.id.clone()));
            }
        }
    }
    dag.services.retain(|key, _| services.contains(key));
    dag.secrets.retain(|id, _| secrets.contains(id));
}

/// HTTPProxies without a virtual host can only be reached by inclusion.
fn mark_orphans(cache: &Cache, statuses: &mut StatusCache) {
    for proxy in cache.http_proxies() {
        if proxy.is_root() {
            continue;
        }
        let source = ResourceRef::http_proxy(
            proxy.namespace().unwrap_or_default(),
            proxy.name_unchecked(),
        );
        tracing::debug!(%source, "Orphaned HTTPProxy");
        statuses.orphan(&source);
    }
}
