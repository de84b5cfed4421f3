use super::*;
use ingress_dag_k8s_api::{
    tls_delegation::CertificateDelegation, IngressSpec, ObjectMeta, TlsCertificateDelegationSpec,
};
use k8s_openapi::chrono::{DateTime, Utc};
use kubert::index::IndexNamespacedResource;
use maplit::btreemap;
use pretty_assertions::assert_eq;

fn mk_ingress(
    ns: &str,
    name: &str,
    created: Option<DateTime<Utc>>,
    annotations: Option<std::collections::BTreeMap<String, String>>,
    class_name: Option<&str>,
) -> Ingress {
    Ingress {
        metadata: ObjectMeta {
            namespace: Some(ns.to_string()),
            name: Some(name.to_string()),
            creation_timestamp: created.map(Time),
            annotations,
            ..Default::default()
        },
        spec: Some(IngressSpec {
            ingress_class_name: class_name.map(str::to_string),
            ..Default::default()
        }),
        status: None,
    }
}

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
}

fn names(ingresses: &[Arc<Ingress>]) -> Vec<String> {
    ingresses
        .iter()
        .map(|i| format!("{}/{}", i.namespace().unwrap(), i.name_unchecked()))
        .collect()
}

#[test]
fn ingresses_ordered_by_age_then_name() {
    let mut cache = Cache::default();
    cache.apply(mk_ingress("b", "newest", Some(ts(60)), None, None));
    cache.apply(mk_ingress("b", "oldest", Some(ts(0)), None, None));
    cache.apply(mk_ingress("a", "tie", Some(ts(30)), None, None));
    cache.apply(mk_ingress("b", "tie", Some(ts(30)), None, None));
    cache.apply(mk_ingress("a", "undated", None, None, None));

    assert_eq!(
        names(&cache.ingresses()),
        vec!["b/oldest", "a/tie", "b/tie", "b/newest", "a/undated"]
    );
}

#[test]
fn delete_removes_ingress() {
    let mut cache = Cache::default();
    cache.apply(mk_ingress("default", "web", None, None, None));
    assert!(!cache.is_empty());

    IndexNamespacedResource::<Ingress>::delete(
        &mut cache,
        "default".to_string(),
        "web".to_string(),
    );
    assert!(cache.is_empty());
}

#[test]
fn default_class_filtering() {
    let mut cache = Cache::default();
    cache.apply(mk_ingress("default", "unclassified", None, None, None));
    cache.apply(mk_ingress("default", "contour", None, None, Some("contour")));
    cache.apply(mk_ingress("default", "nginx", None, None, Some("nginx")));
    cache.apply(mk_ingress(
        "default",
        "annotated-nginx",
        None,
        Some(btreemap! {
            "kubernetes.io/ingress.class".to_string() => "nginx".to_string(),
        }),
        Some("contour"),
    ));

    assert_eq!(
        names(&cache.ingresses()),
        vec!["default/contour", "default/unclassified"]
    );
}

#[test]
fn configured_class_filtering() {
    let mut cache = Cache::new(vec!["internal".to_string()]);
    cache.apply(mk_ingress("default", "unclassified", None, None, None));
    cache.apply(mk_ingress("default", "contour", None, None, Some("contour")));
    cache.apply(mk_ingress(
        "default",
        "internal",
        None,
        Some(btreemap! {
            "projectcontour.io/ingress.class".to_string() => "internal".to_string(),
            "kubernetes.io/ingress.class".to_string() => "nginx".to_string(),
        }),
        None,
    ));

    assert_eq!(names(&cache.ingresses()), vec!["default/internal"]);
}

#[test]
fn reclassified_ingress_is_evicted() {
    let mut cache = Cache::default();
    cache.apply(mk_ingress("default", "web", None, None, None));
    cache.apply(mk_ingress("default", "web", None, None, Some("nginx")));
    assert!(cache.ingresses().is_empty());
}

#[test]
fn certificate_delegation() {
    let mut cache = Cache::default();
    cache.apply(TlsCertificateDelegation {
        metadata: ObjectMeta {
            namespace: Some("certs".to_string()),
            name: Some("delegation".to_string()),
            ..Default::default()
        },
        spec: TlsCertificateDelegationSpec {
            delegations: vec![
                CertificateDelegation {
                    secret_name: "wildcard".to_string(),
                    target_namespaces: vec!["*".to_string()],
                },
                CertificateDelegation {
                    secret_name: "internal".to_string(),
                    target_namespaces: vec!["team-a".to_string()],
                },
            ],
        },
    });

    let wildcard = ResourceId::new("certs", "wildcard");
    let internal = ResourceId::new("certs", "internal");
    let undelegated = ResourceId::new("certs", "private");

    assert!(cache.delegation_permits(&wildcard, "anything"));
    assert!(cache.delegation_permits(&internal, "team-a"));
    assert!(!cache.delegation_permits(&internal, "team-b"));
    assert!(!cache.delegation_permits(&undelegated, "team-a"));
    assert!(cache.delegation_permits(&undelegated, "certs"));
}

#[test]
fn unnamed_resources_are_ignored() {
    let mut cache = Cache::default();
    let mut ingress = mk_ingress("default", "web", None, None, None);
    ingress.metadata.name = None;
    ingress.metadata.generate_name = Some("web-".to_string());
    cache.apply(ingress);

    let mut blank = mk_ingress("default", "web", None, None, None);
    blank.metadata.name = Some(String::new());
    cache.apply(blank);

    assert!(cache.is_empty());
    assert!(cache.ingresses().is_empty());
}
