use crate::{
    annotation::ServiceAnnotations, config::Defaults, error::BackendError, processor::Context,
    resolve::circuit_breaker::circuit_breakers,
};
use ingress_dag_core::{
    Cluster, Dag, ResourceId, ResourceRef, Secret, Service, ServiceKey, UpstreamProtocol,
};
use ingress_dag_k8s_status::Reason;
use ingress_dag_k8s_api::{ServiceBackendPort, ServicePort};
use ingress_dag_k8s_cache::Cache;
use std::{fmt, sync::Arc};

/// A reference to a service port, by number or by name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PortRef {
    Number(u16),
    Name(String),
}

// === impl PortRef ===

impl PortRef {
    /// Converts an Ingress backend port. A port number takes precedence over
    /// a port name.
    pub fn from_backend(port: Option<&ServiceBackendPort>) -> Result<Self, BackendError> {
        let port = port.ok_or(BackendError::MissingPort)?;
        if let Some(n) = port.number.filter(|n| *n != 0) {
            return u16::try_from(n)
                .map(Self::Number)
                .map_err(|_| BackendError::MissingPort);
        }
        match port.name.as_deref() {
            Some(name) if !name.is_empty() => Ok(Self::Name(name.to_string())),
            _ => Err(BackendError::MissingPort),
        }
    }

    fn matches(&self, port: &ServicePort) -> bool {
        match self {
            Self::Number(n) => port.port == i32::from(*n),
            Self::Name(name) => port.name.as_deref() == Some(name.as_str()),
        }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => n.fmt(f),
            Self::Name(name) => name.fmt(f),
        }
    }
}

/// Records malformed annotations on service `id` as warnings on `source`.
///
/// Each message is recorded once per resource, however many of its routes
/// reference the service.
pub(crate) fn report_service_annotations(
    ctx: &mut Context<'_>,
    source: &ResourceRef,
    id: &ResourceId,
) {
    let Some(service) = ctx.cache.service(id) else {
        return;
    };
    let (_, diagnostics) = ServiceAnnotations::parse(&service.metadata);
    for diagnostic in diagnostics {
        let message = format!("service {id}: {diagnostic}");
        if ctx
            .statuses
            .get(source)
            .is_some_and(|s| s.warnings.iter().any(|w| w.message == message))
        {
            continue;
        }
        tracing::warn!(service = %id, %diagnostic, "Invalid service annotation");
        ctx.statuses.warning(source, Reason::AnnotationNotValid, message);
    }
}

/// Resolves a service port and interns it in the DAG.
///
/// Structurally identical references share one [`Service`], so the service's
/// annotations are only read the first time it is referenced in a build.
pub(crate) fn resolve_service(
    cache: &Cache,
    dag: &mut Dag,
    defaults: &Defaults,
    id: &ResourceId,
    port_ref: &PortRef,
) -> Result<Arc<Service>, BackendError> {
    let service = cache
        .service(id)
        .ok_or_else(|| BackendError::NotFound(id.clone()))?;
    let spec = service.spec.as_ref();

    let port_not_found = || BackendError::PortNotFound {
        service: id.clone(),
        port: port_ref.to_string(),
    };
    let port = spec
        .and_then(|s| s.ports.as_ref())
        .and_then(|ports| ports.iter().find(|p| port_ref.matches(p)))
        .ok_or_else(port_not_found)?;
    let port_number = u16::try_from(port.port).map_err(|_| port_not_found())?;

    let external_name = match spec {
        Some(spec) if spec.type_.as_deref() == Some("ExternalName") => {
            if !defaults.enable_external_name_service {
                return Err(BackendError::ExternalNameDisabled(id.clone()));
            }
            let host = spec.external_name.clone().unwrap_or_default();
            if is_localhost(&host) {
                return Err(BackendError::ExternalNameLocalhost(id.clone()));
            }
            Some(host)
        }
        _ => None,
    };

    let key = ServiceKey {
        namespace: id.namespace.clone(),
        name: id.name.clone(),
        port: port_number,
    };
    Ok(dag.ensure_service(key.clone(), || {
        let (annotations, _) = ServiceAnnotations::parse(&service.metadata);
        Service {
            key,
            port_name: port.name.clone(),
            protocol: annotations.protocol_for(port),
            external_name,
            circuit_breakers: circuit_breakers(
                &annotations,
                defaults.circuit_breakers.as_ref(),
            ),
        }
    }))
}

/// Builds a cluster for `upstream` with the process-wide upstream settings
/// applied. `protocol` overrides the protocol configured on the service.
pub(crate) fn cluster(
    defaults: &Defaults,
    upstream: Arc<Service>,
    protocol: Option<UpstreamProtocol>,
    client_certificate: Option<Arc<Secret>>,
) -> Cluster {
    let mut cluster = Cluster::new(upstream);
    if let Some(protocol) = protocol {
        cluster.protocol = protocol;
    }
    cluster.timeout_policy.connect_timeout = defaults.cluster_connect_timeout();
    cluster.max_requests_per_connection = defaults.max_requests_per_connection;
    cluster.per_connection_buffer_limit_bytes = defaults.per_connection_buffer_limit_bytes;
    if matches!(cluster.protocol, UpstreamProtocol::Tls | UpstreamProtocol::H2) {
        cluster.upstream_tls = defaults.upstream_tls.clone();
        cluster.client_certificate = client_certificate;
    }
    cluster
}

fn is_localhost(host: &str) -> bool {
    host.trim_end_matches('.').eq_ignore_ascii_case("localhost")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingress_dag_k8s_api::{ObjectMeta, Service as K8sService, ServiceSpec};
    use kubert::index::IndexNamespacedResource;
    use maplit::btreemap;
    use pretty_assertions::assert_eq;

    fn service(name: &str, spec: ServiceSpec) -> K8sService {
        K8sService {
            metadata: ObjectMeta {
                namespace: Some("default".to_string()),
                name: Some(name.to_string()),
                annotations: Some(btreemap! {
                    "projectcontour.io/upstream-protocol.h2".to_string() => "https".to_string(),
                    "projectcontour.io/max-connections".to_string() => "7".to_string(),
                }),
                ..Default::default()
            },
            spec: Some(spec),
            ..Default::default()
        }
    }

    fn ports() -> Option<Vec<ServicePort>> {
        Some(vec![
            ServicePort {
                name: Some("http".to_string()),
                port: 80,
                ..Default::default()
            },
            ServicePort {
                name: Some("https".to_string()),
                port: 443,
                ..Default::default()
            },
        ])
    }

    #[test]
    fn resolves_ports_by_number_and_name() {
        let mut cache = Cache::default();
        cache.apply(service(
            "web",
            ServiceSpec {
                ports: ports(),
                ..Default::default()
            },
        ));
        let mut dag = Dag::default();
        let defaults = Defaults::default();
        let id = ResourceId::new("default", "web");

        let by_number =
            resolve_service(&cache, &mut dag, &defaults, &id, &PortRef::Number(443)).unwrap();
        let by_name = resolve_service(
            &cache,
            &mut dag,
            &defaults,
            &id,
            &PortRef::Name("https".to_string()),
        )
        .unwrap();
        assert!(Arc::ptr_eq(&by_number, &by_name));
        assert_eq!(by_number.protocol, UpstreamProtocol::H2);
        assert_eq!(by_number.circuit_breakers.max_connections, Some(7));

        let http = resolve_service(&cache, &mut dag, &defaults, &id, &PortRef::Number(80)).unwrap();
        assert_eq!(http.protocol, UpstreamProtocol::Http1);
        assert_eq!(dag.services.len(), 2);

        assert_eq!(
            resolve_service(&cache, &mut dag, &defaults, &id, &PortRef::Number(8080)),
            Err(BackendError::PortNotFound {
                service: id.clone(),
                port: "8080".to_string(),
            })
        );
        assert_eq!(
            resolve_service(
                &cache,
                &mut dag,
                &defaults,
                &ResourceId::new("default", "missing"),
                &PortRef::Number(80),
            ),
            Err(BackendError::NotFound(ResourceId::new("default", "missing")))
        );
    }

    #[test]
    fn external_name_services() {
        let mut cache = Cache::default();
        for (name, host) in [("ext", "api.example.com"), ("local", "LOCALHOST.")] {
            cache.apply(service(
                name,
                ServiceSpec {
                    type_: Some("ExternalName".to_string()),
                    external_name: Some(host.to_string()),
                    ports: ports(),
                    ..Default::default()
                },
            ));
        }
        let mut dag = Dag::default();
        let ext = ResourceId::new("default", "ext");

        assert_eq!(
            resolve_service(&cache, &mut dag, &Defaults::default(), &ext, &PortRef::Number(80)),
            Err(BackendError::ExternalNameDisabled(ext.clone()))
        );

        let defaults = Defaults {
            enable_external_name_service: true,
            ..Default::default()
        };
        let svc = resolve_service(&cache, &mut dag, &defaults, &ext, &PortRef::Number(80)).unwrap();
        assert_eq!(svc.external_name.as_deref(), Some("api.example.com"));

        let local = ResourceId::new("default", "local");
        assert_eq!(
            resolve_service(&cache, &mut dag, &defaults, &local, &PortRef::Number(80)),
            Err(BackendError::ExternalNameLocalhost(local.clone()))
        );
    }

    #[test]
    fn backend_ports() {
        assert_eq!(
            PortRef::from_backend(Some(&ServiceBackendPort {
                name: Some("http".to_string()),
                number: Some(80),
            })),
            Ok(PortRef::Number(80))
        );
        assert_eq!(
            PortRef::from_backend(Some(&ServiceBackendPort {
                name: Some("http".to_string()),
                number: None,
            })),
            Ok(PortRef::Name("http".to_string()))
        );
        assert_eq!(PortRef::from_backend(None), Err(BackendError::MissingPort));
        assert_eq!(
            PortRef::from_backend(Some(&ServiceBackendPort::default())),
            Err(BackendError::MissingPort)
        );
    }
}
