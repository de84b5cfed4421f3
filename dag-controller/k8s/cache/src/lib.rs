//! A point-in-time snapshot of the cluster resources that feed a DAG build.
//!
//! The cache is updated through `kubert`'s namespaced index trait, so it can
//! be driven directly by a watch or filled from static manifests. Builds only
//! ever read from it: the runtime clones the cache into each build, which is
//! cheap because every resource is held behind an `Arc`.
//!
//! Ingresses and HTTPProxies are filtered by ingress class as they are
//! applied; resources that belong to another controller never enter the
//! cache.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod class;

#[cfg(test)]
mod tests;

pub use self::class::{ingress_class, matches_class, DEFAULT_INGRESS_CLASS};
use ahash::AHashMap as HashMap;
use ingress_dag_core::ResourceId;
use ingress_dag_k8s_api::{
    self as k8s, HttpProxy, Ingress, ResourceExt, Secret, Service, Time,
    TlsCertificateDelegation,
};
use std::{collections::BTreeMap, sync::Arc};

#[derive(Clone, Debug, Default)]
pub struct Cache {
    ingress_classes: Vec<String>,
    ingresses: BTreeMap<ResourceId, Arc<Ingress>>,
    http_proxies: BTreeMap<ResourceId, Arc<HttpProxy>>,
    services: HashMap<ResourceId, Arc<Service>>,
    secrets: HashMap<ResourceId, Arc<Secret>>,
    delegations: BTreeMap<ResourceId, Arc<TlsCertificateDelegation>>,
}

// === impl Cache ===

impl Cache {
    /// Creates a cache that accepts ingress-like resources of the given
    /// classes. An empty list accepts unclassified resources and the default
    /// class.
    pub fn new(ingress_classes: Vec<String>) -> Self {
        Self {
            ingress_classes,
            ..Default::default()
        }
    }

    pub fn ingress_classes(&self) -> &[String] {
        &self.ingress_classes
    }

    /// Returns Ingresses ordered by creation timestamp, then namespace, then
    /// name.
    pub fn ingresses(&self) -> Vec<Arc<Ingress>> {
        by_age(&self.ingresses, |ing| ing.metadata.creation_timestamp.as_ref())
    }

    /// Returns HTTPProxies ordered by creation timestamp, then namespace,
    /// then name.
    pub fn http_proxies(&self) -> Vec<Arc<HttpProxy>> {
        by_age(&self.http_proxies, |p| p.metadata.creation_timestamp.as_ref())
    }

    pub fn ingress(&self, id: &ResourceId) -> Option<&Arc<Ingress>> {
        self.ingresses.get(id)
    }

    pub fn http_proxy(&self, id: &ResourceId) -> Option<&Arc<HttpProxy>> {
        self.http_proxies.get(id)
    }

    pub fn service(&self, id: &ResourceId) -> Option<&Arc<Service>> {
        self.services.get(id)
    }

    pub fn secret(&self, id: &ResourceId) -> Option<&Arc<Secret>> {
        self.secrets.get(id)
    }

    /// Returns true if resources in `namespace` may reference `secret`.
    ///
    /// Secrets in the same namespace are always permitted; otherwise a
    /// certificate delegation in the secret's namespace must name both the
    /// secret and the target namespace.
    pub fn delegation_permits(&self, secret: &ResourceId, namespace: &str) -> bool {
        if secret.namespace == namespace {
            return true;
        }
        self.delegations
            .iter()
            .filter(|(id, _)| id.namespace == secret.namespace)
            .flat_map(|(_, d)| d.spec.delegations.iter())
            .any(|d| d.secret_name == secret.name && d.permits(namespace))
    }

    pub fn is_empty(&self) -> bool {
        self.ingresses.is_empty() && self.http_proxies.is_empty()
    }

    fn accepts(&self, meta: &k8s::ObjectMeta, spec_class: Option<&str>) -> bool {
        matches_class(ingress_class(meta, spec_class), &self.ingress_classes)
    }
}

impl kubert::index::IndexNamespacedResource<Ingress> for Cache {
    fn apply(&mut self, ingress: Ingress) {
        let Some(id) = resource_id(&ingress) else {
            tracing::warn!(name = %ingress.name_any(), "Ingress has no namespace or name");
            return;
        };

        let spec_class = ingress
            .spec
            .as_ref()
            .and_then(|s| s.ingress_class_name.as_deref());
        if !self.accepts(&ingress.metadata, spec_class) {
            tracing::debug!(%id, "Ignoring Ingress for another ingress class");
            // A class change may move a previously accepted resource away.
            self.ingresses.remove(&id);
            return;
        }

        self.ingresses.insert(id, Arc::new(ingress));
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.ingresses.remove(&ResourceId::new(namespace, name));
    }
}

impl kubert::index::IndexNamespacedResource<HttpProxy> for Cache {
    fn apply(&mut self, proxy: HttpProxy) {
        let Some(id) = resource_id(&proxy) else {
            tracing::warn!(name = %proxy.name_any(), "HTTPProxy has no namespace or name");
            return;
        };

        if !self.accepts(&proxy.metadata, proxy.spec.ingress_class_name.as_deref()) {
            tracing::debug!(%id, "Ignoring HTTPProxy for another ingress class");
            self.http_proxies.remove(&id);
            return;
        }

        self.http_proxies.insert(id, Arc::new(proxy));
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.http_proxies.remove(&ResourceId::new(namespace, name));
    }
}

impl kubert::index::IndexNamespacedResource<Service> for Cache {
    fn apply(&mut self, service: Service) {
        let Some(id) = resource_id(&service) else {
            tracing::warn!(name = %service.name_any(), "Service has no namespace or name");
            return;
        };
        self.services.insert(id, Arc::new(service));
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.services.remove(&ResourceId::new(namespace, name));
    }
}

impl kubert::index::IndexNamespacedResource<Secret> for Cache {
    fn apply(&mut self, secret: Secret) {
        let Some(id) = resource_id(&secret) else {
            tracing::warn!(name = %secret.name_any(), "Secret has no namespace or name");
            return;
        };
        self.secrets.insert(id, Arc::new(secret));
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.secrets.remove(&ResourceId::new(namespace, name));
    }
}

impl kubert::index::IndexNamespacedResource<TlsCertificateDelegation> for Cache {
    fn apply(&mut self, delegation: TlsCertificateDelegation) {
        let Some(id) = resource_id(&delegation) else {
            tracing::warn!(
                name = %delegation.name_any(),
                "TLSCertificateDelegation has no namespace or name"
            );
            return;
        };
        self.delegations.insert(id, Arc::new(delegation));
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.delegations.remove(&ResourceId::new(namespace, name));
    }
}

/// Returns `None` for resources that lack a namespace or a name.
fn resource_id<T: ResourceExt>(resource: &T) -> Option<ResourceId> {
    let namespace = resource.namespace().filter(|ns| !ns.is_empty())?;
    let name = resource.meta().name.clone().filter(|n| !n.is_empty())?;
    Some(ResourceId::new(namespace, name))
}

fn by_age<T>(
    resources: &BTreeMap<ResourceId, Arc<T>>,
    created: impl Fn(&T) -> Option<&Time>,
) -> Vec<Arc<T>> {
    let mut list = resources.iter().collect::<Vec<_>>();
    // The map is already ordered by namespace and name, so a stable sort on
    // the timestamp yields the full ordering.
    list.sort_by(|(_, a), (_, b)| match (created(a), created(b)) {
        (Some(a_ts), Some(b_ts)) => a_ts.cmp(b_ts),
        (None, None) => std::cmp::Ordering::Equal,
        // Resources with timestamps are preferred over resources without.
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
    });
    list.into_iter().map(|(_, r)| r.clone()).collect()
}
