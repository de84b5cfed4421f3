use super::*;
use pretty_assertions::assert_eq;
use rstest::rstest;

fn proxy() -> ResourceRef {
    ResourceRef::http_proxy("ns-0", "proxy-foo")
}

#[test]
fn untouched_resource_is_valid() {
    let mut statuses = StatusCache::default();
    statuses.entry(&proxy()).vhost = Some("foo.example.com".to_string());

    let status = statuses.get(&proxy()).unwrap();
    assert_eq!(status.validity(), Validity::Valid);
    assert_eq!(status.description(), "Valid HTTPProxy: foo.example.com");
}

#[test]
fn warnings_do_not_invalidate() {
    let mut statuses = StatusCache::default();
    let ing = ResourceRef::ingress("ns-0", "web");
    statuses.warning(&ing, Reason::AnnotationNotValid, "bad timeout");
    assert_eq!(statuses.validity(&ing), Some(Validity::Valid));
}

#[rstest]
#[case::errors_only(true, false, Validity::Invalid)]
#[case::orphaned_only(false, true, Validity::Orphaned)]
#[case::errors_win_over_orphaned(true, true, Validity::Invalid)]
fn validity(#[case] error: bool, #[case] orphaned: bool, #[case] expected: Validity) {
    let mut statuses = StatusCache::default();
    if error {
        statuses.error(&proxy(), Reason::SecretNotValid, "Secret not found");
    }
    if orphaned {
        statuses.orphan(&proxy());
    }
    assert_eq!(statuses.validity(&proxy()), Some(expected));
}

#[test]
fn condition_reports_first_error() {
    let mut statuses = StatusCache::default();
    statuses.error(
        &proxy(),
        Reason::DuplicateMatchConditions,
        "duplicate conditions for path prefix \"/\"",
    );
    statuses.error(&proxy(), Reason::ServiceUnresolvedReference, "missing service");

    let condition = statuses
        .get(&proxy())
        .unwrap()
        .to_condition(DateTime::<Utc>::MIN_UTC);
    assert_eq!(
        condition,
        Condition {
            type_: "Valid".to_string(),
            status: "False".to_string(),
            reason: "DuplicateMatchConditions".to_string(),
            message: "duplicate conditions for path prefix \"/\"; missing service".to_string(),
            observed_generation: None,
            last_transition_time: Time(DateTime::<Utc>::MIN_UTC),
        }
    );
}

#[test]
fn orphan_patch() {
    let mut statuses = StatusCache::default();
    statuses.orphan(&proxy());

    let patch = statuses.get(&proxy()).unwrap().make_patch().unwrap();
    let k8s::Patch::Merge(value) = patch else {
        panic!("expected a merge patch");
    };
    assert_eq!(value["status"]["currentStatus"], "orphaned");
    assert_eq!(value["status"]["conditions"][0]["reason"], "Orphaned");
    assert_eq!(value["name"], "proxy-foo");
}

#[test]
fn ingress_has_no_patch() {
    let mut statuses = StatusCache::default();
    let ing = ResourceRef::ingress("ns-0", "web");
    statuses.error(&ing, Reason::SecretNotValid, "Secret not found");
    assert!(statuses.get(&ing).unwrap().make_patch().is_none());
}

#[test]
fn counts_by_kind_and_validity() {
    let mut statuses = StatusCache::default();
    statuses.entry(&ResourceRef::ingress("ns-0", "a"));
    statuses.error(
        &ResourceRef::ingress("ns-0", "b"),
        Reason::PathNotValid,
        "invalid regex",
    );
    statuses.orphan(&proxy());

    let counts = statuses.counts();
    assert_eq!(counts[&(ResourceKind::Ingress, Validity::Valid)], 1);
    assert_eq!(counts[&(ResourceKind::Ingress, Validity::Invalid)], 1);
    assert_eq!(counts[&(ResourceKind::HttpProxy, Validity::Orphaned)], 1);
}
