mod httpproxy;

use crate::{Build, Builder, Defaults};
use ingress_dag_core::{Dag, ResourceRef, Route};
use ingress_dag_k8s_api::{
    httpproxy as proxy, tls_delegation::CertificateDelegation, ByteString, HTTPIngressPath,
    HTTPIngressRuleValue, HttpProxy, HttpProxySpec, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ObjectMeta, Secret, Service,
    ServiceBackendPort, ServicePort, ServiceSpec, Time, TlsCertificateDelegation,
    TlsCertificateDelegationSpec,
};
use ingress_dag_k8s_cache::Cache;
use k8s_openapi::chrono::DateTime;
use kubert::index::IndexNamespacedResource;
use maplit::btreemap;

pub(crate) fn mk_meta(ns: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        namespace: Some(ns.to_string()),
        name: Some(name.to_string()),
        generation: Some(1),
        ..Default::default()
    }
}

/// Metadata with a creation timestamp `secs` seconds after the epoch.
pub(crate) fn mk_meta_at(ns: &str, name: &str, secs: i64) -> ObjectMeta {
    ObjectMeta {
        creation_timestamp: DateTime::from_timestamp(secs, 0).map(Time),
        ..mk_meta(ns, name)
    }
}

pub(crate) fn mk_service(ns: &str, name: &str, ports: &[(&str, i32)]) -> Service {
    Service {
        metadata: mk_meta(ns, name),
        spec: Some(ServiceSpec {
            ports: Some(
                ports
                    .iter()
                    .map(|(name, port)| ServicePort {
                        name: Some(name.to_string()),
                        port: *port,
                        ..Default::default()
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub(crate) fn mk_backend(service: &str, port: i32) -> IngressBackend {
    IngressBackend {
        service: Some(IngressServiceBackend {
            name: service.to_string(),
            port: Some(ServiceBackendPort {
                name: None,
                number: Some(port),
            }),
        }),
        resource: None,
    }
}

pub(crate) fn mk_path(path: &str, path_type: &str, service: &str, port: i32) -> HTTPIngressPath {
    HTTPIngressPath {
        path: Some(path.to_string()),
        path_type: path_type.to_string(),
        backend: mk_backend(service, port),
    }
}

pub(crate) fn mk_rule(host: Option<&str>, paths: Vec<HTTPIngressPath>) -> IngressRule {
    IngressRule {
        host: host.map(str::to_string),
        http: Some(HTTPIngressRuleValue { paths }),
    }
}

pub(crate) fn mk_tls(hosts: &[&str], secret: &str) -> IngressTLS {
    IngressTLS {
        hosts: Some(hosts.iter().map(|h| h.to_string()).collect()),
        secret_name: Some(secret.to_string()),
    }
}

pub(crate) fn mk_ingress(meta: ObjectMeta, spec: IngressSpec) -> Ingress {
    Ingress {
        metadata: meta,
        spec: Some(spec),
        ..Default::default()
    }
}

pub(crate) fn mk_http_proxy(meta: ObjectMeta, spec: HttpProxySpec) -> HttpProxy {
    HttpProxy {
        metadata: meta,
        spec,
        status: None,
    }
}

pub(crate) fn mk_proxy_route(prefix: &str, service: &str, port: u16) -> proxy::Route {
    proxy::Route {
        conditions: vec![proxy::MatchCondition {
            prefix: Some(prefix.to_string()),
            ..Default::default()
        }],
        services: vec![proxy::RouteService {
            name: service.to_string(),
            port,
            ..Default::default()
        }],
        ..Default::default()
    }
}

pub(crate) fn mk_secret(ns: &str, name: &str, type_: &str, crt: &[u8], key: &[u8]) -> Secret {
    Secret {
        metadata: mk_meta(ns, name),
        type_: Some(type_.to_string()),
        data: Some(btreemap! {
            "tls.crt".to_string() => ByteString(crt.to_vec()),
            "tls.key".to_string() => ByteString(key.to_vec()),
        }),
        ..Default::default()
    }
}

/// A TLS secret holding a freshly generated self-signed certificate.
pub(crate) fn mk_tls_secret(ns: &str, name: &str) -> Secret {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["example.com".to_string()])
            .expect("certificate must be generated");
    mk_secret(
        ns,
        name,
        "kubernetes.io/tls",
        cert.pem().as_bytes(),
        key_pair.serialize_pem().as_bytes(),
    )
}

pub(crate) fn mk_delegation(ns: &str, secret: &str, targets: &[&str]) -> TlsCertificateDelegation {
    TlsCertificateDelegation {
        metadata: mk_meta(ns, &format!("{secret}-delegation")),
        spec: TlsCertificateDelegationSpec {
            delegations: vec![CertificateDelegation {
                secret_name: secret.to_string(),
                target_namespaces: targets.iter().map(|t| t.to_string()).collect(),
            }],
        },
    }
}

pub(crate) fn build(cache: &Cache) -> Build {
    Builder::new(Defaults::default()).build(cache)
}

/// Returns the routes of a virtual host on the named listener.
pub(crate) fn routes<'d>(dag: &'d Dag, listener: &str, host: &str) -> &'d [Route] {
    let Some(listener) = dag.listener(listener) else {
        return &[];
    };
    if let Some(vh) = listener.virtual_hosts.get(host) {
        return &vh.routes;
    }
    listener
        .secure_virtual_hosts
        .get(host)
        .map_or(&[], |svh| svh.virtual_host.routes.as_slice())
}

pub(crate) fn ingress_ref(name: &str) -> ResourceRef {
    ResourceRef::ingress("default", name)
}

pub(crate) fn proxy_ref(name: &str) -> ResourceRef {
    ResourceRef::http_proxy("default", name)
}

/// A cache with the `web` and `api` services in the default namespace.
pub(crate) fn mk_cache() -> Cache {
    let mut cache = Cache::default();
    cache.apply(mk_service("default", "web", &[("http", 80)]));
    cache.apply(mk_service("default", "api", &[("http", 8080), ("grpc", 9090)]));
    cache
}
