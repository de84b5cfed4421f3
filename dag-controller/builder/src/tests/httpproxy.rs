use super::*;
use ingress_dag_core::{LoadBalancerPolicy, PathMatch, ServiceKey, UpstreamProtocol};
use ingress_dag_k8s_api::httpproxy::{
    LoadBalancerPolicy as ApiLoadBalancerPolicy, Tls, VirtualHost,
};
use ingress_dag_k8s_status::{Reason, Validity};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn root(name: &str, fqdn: &str, routes: Vec<proxy::Route>) -> HttpProxy {
    mk_http_proxy(
        mk_meta("default", name),
        HttpProxySpec {
            virtual_host: Some(VirtualHost {
                fqdn: fqdn.to_string(),
                ..Default::default()
            }),
            routes,
            ..Default::default()
        },
    )
}

fn with_tls(mut proxy: HttpProxy, secret: &str) -> HttpProxy {
    if let Some(vhost) = proxy.spec.virtual_host.as_mut() {
        vhost.tls = Some(Tls {
            secret_name: secret.to_string(),
            ..Default::default()
        });
    }
    proxy
}

#[test]
fn root_proxy_routes() {
    let mut cache = mk_cache();
    cache.apply(root(
        "web",
        "example.com",
        vec![
            mk_proxy_route("/", "web", 80),
            mk_proxy_route("/api", "api", 8080),
        ],
    ));

    let Build { dag, statuses } = build(&cache);
    let status = statuses.get(&proxy_ref("web")).unwrap();
    assert_eq!(status.validity(), Validity::Valid);
    assert_eq!(status.vhost.as_deref(), Some("example.com"));

    let routes = super::routes(&dag, "ingress_http", "example.com");
    assert_eq!(routes.len(), 2);
    assert_eq!(routes[1].route_match.path, PathMatch::prefix("/api"));
    assert_eq!(routes[1].clusters[0].upstream.key.port, 8080);
    assert!(!routes[0].https_upgrade);
    assert!(dag.listener("ingress_https").is_none());
}

#[test]
fn tls_routes_upgrade_unless_insecure_is_permitted() {
    let mut cache = mk_cache();
    cache.apply(mk_tls_secret("default", "cert"));
    let mut insecure = mk_proxy_route("/insecure", "web", 80);
    insecure.permit_insecure = Some(true);
    cache.apply(with_tls(
        root(
            "web",
            "example.com",
            vec![mk_proxy_route("/", "web", 80), insecure],
        ),
        "cert",
    ));

    let Build { dag, statuses } = build(&cache);
    assert_eq!(statuses.validity(&proxy_ref("web")), Some(Validity::Valid));

    let secure = super::routes(&dag, "ingress_https", "example.com");
    assert_eq!(secure.len(), 2);
    assert!(secure.iter().all(|r| !r.https_upgrade));

    let plain = super::routes(&dag, "ingress_http", "example.com");
    assert_eq!(
        plain.iter().map(|r| r.https_upgrade).collect::<Vec<_>>(),
        vec![true, false]
    );
}

#[test]
fn missing_tls_secret_invalidates_proxy() {
    let mut cache = mk_cache();
    cache.apply(with_tls(
        root("web", "example.com", vec![mk_proxy_route("/", "web", 80)]),
        "missing",
    ));

    let Build { dag, statuses } = build(&cache);
    let status = statuses.get(&proxy_ref("web")).unwrap();
    assert!(status.has_error(Reason::SecretNotValid));
    assert!(dag.listeners.is_empty());
}

#[test]
fn undelegated_secret_is_rejected() {
    let mut cache = mk_cache();
    cache.apply(mk_tls_secret("certs", "wildcard"));
    cache.apply(mk_delegation("certs", "wildcard", &["other"]));
    cache.apply(with_tls(
        root("web", "example.com", vec![mk_proxy_route("/", "web", 80)]),
        "certs/wildcard",
    ));

    let Build { statuses, .. } = build(&cache);
    assert!(statuses
        .get(&proxy_ref("web"))
        .unwrap()
        .has_error(Reason::TlsDelegationNotPermitted));
}

#[test]
fn later_duplicate_fqdn_is_invalid() {
    let mut cache = mk_cache();
    for (name, secs) in [("first", 1), ("second", 2)] {
        let mut proxy = root("ignored", "example.com", vec![mk_proxy_route("/", "web", 80)]);
        proxy.metadata = mk_meta_at("default", name, secs);
        cache.apply(proxy);
    }

    let Build { dag, statuses } = build(&cache);
    assert_eq!(statuses.validity(&proxy_ref("first")), Some(Validity::Valid));
    assert!(statuses
        .get(&proxy_ref("second"))
        .unwrap()
        .has_error(Reason::DuplicateVhost));

    let routes = super::routes(&dag, "ingress_http", "example.com");
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].source, proxy_ref("first"));
}

#[test]
fn proxies_without_virtual_host_are_orphaned() {
    let mut cache = mk_cache();
    cache.apply(mk_http_proxy(
        mk_meta("default", "child"),
        HttpProxySpec {
            routes: vec![mk_proxy_route("/", "web", 80)],
            ..Default::default()
        },
    ));

    let Build { dag, statuses } = build(&cache);
    assert_eq!(
        statuses.validity(&proxy_ref("child")),
        Some(Validity::Orphaned)
    );
    assert!(dag.listeners.is_empty());
}

#[test]
fn invalid_routes_are_skipped() {
    let mut cache = mk_cache();
    let no_services = proxy::Route {
        conditions: vec![proxy::MatchCondition {
            prefix: Some("/empty".to_string()),
            ..Default::default()
        }],
        ..Default::default()
    };
    cache.apply(root(
        "web",
        "example.com",
        vec![
            no_services,
            mk_proxy_route("/missing", "missing", 80),
            mk_proxy_route("/", "web", 80),
        ],
    ));

    let Build { dag, statuses } = build(&cache);
    let status = statuses.get(&proxy_ref("web")).unwrap();
    assert_eq!(status.validity(), Validity::Invalid);
    assert_eq!(status.errors.len(), 2);
    assert!(status.errors[0].message.starts_with("route 0: "));
    assert!(status.errors[1].message.starts_with("route 1: "));
    assert!(status
        .errors
        .iter()
        .all(|m| m.reason == Reason::ServiceUnresolvedReference));

    assert_eq!(super::routes(&dag, "ingress_http", "example.com").len(), 1);
    assert_eq!(
        dag.services.keys().map(|k| k.name.as_str()).collect::<Vec<_>>(),
        vec!["web"]
    );
}

#[test]
fn unknown_load_balancer_strategy_warns() {
    let mut cache = mk_cache();
    let mut route = mk_proxy_route("/", "web", 80);
    route.load_balancer_policy = Some(ApiLoadBalancerPolicy {
        strategy: Some("Fastest".to_string()),
    });
    let mut cookie = mk_proxy_route("/sticky", "web", 80);
    cookie.load_balancer_policy = Some(ApiLoadBalancerPolicy {
        strategy: Some("Cookie".to_string()),
    });
    cache.apply(root("web", "example.com", vec![route, cookie]));

    let Build { dag, statuses } = build(&cache);
    let status = statuses.get(&proxy_ref("web")).unwrap();
    assert_eq!(status.validity(), Validity::Valid);
    assert_eq!(status.warnings.len(), 1);
    assert_eq!(status.warnings[0].reason, Reason::LoadBalancerPolicyNotValid);

    let routes = super::routes(&dag, "ingress_http", "example.com");
    assert_eq!(
        routes[0].clusters[0].load_balancer_policy,
        LoadBalancerPolicy::RoundRobin
    );
    assert_eq!(
        routes[1].clusters[0].load_balancer_policy,
        LoadBalancerPolicy::Cookie
    );
}

#[test]
fn weighted_services_share_upstreams() {
    let mut cache = mk_cache();
    let mut route = mk_proxy_route("/", "web", 80);
    route.services[0].weight = Some(90);
    route.services.push(proxy::RouteService {
        name: "api".to_string(),
        port: 9090,
        weight: Some(10),
        protocol: Some("h2c".to_string()),
        ..Default::default()
    });
    cache.apply(root("web", "example.com", vec![route]));
    cache.apply(root("other", "other.example.com", vec![mk_proxy_route("/", "web", 80)]));

    let Build { dag, .. } = build(&cache);
    let clusters = &super::routes(&dag, "ingress_http", "example.com")[0].clusters;
    assert_eq!(
        clusters.iter().map(|c| c.weight).collect::<Vec<_>>(),
        vec![90, 10]
    );
    assert_eq!(clusters[1].protocol, UpstreamProtocol::H2c);
    assert_eq!(
        clusters[1].upstream.key,
        ServiceKey {
            namespace: "default".to_string(),
            name: "api".to_string(),
            port: 9090,
        }
    );

    let other = &super::routes(&dag, "ingress_http", "other.example.com")[0].clusters[0];
    assert!(Arc::ptr_eq(&clusters[0].upstream, &other.upstream));
    assert_eq!(dag.services.len(), 2);
}
