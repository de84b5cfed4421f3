use ingress_dag_k8s_api::{annotation, ObjectMeta};

/// The class served when no class names are configured.
pub const DEFAULT_INGRESS_CLASS: &str = "contour";

const CLASS_ANNOTATION: &str = "projectcontour.io/ingress.class";
const LEGACY_CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";

/// Returns the ingress class of a resource.
///
/// Annotations take precedence over the resource's `ingressClassName`.
pub fn ingress_class<'a>(meta: &'a ObjectMeta, spec_class: Option<&'a str>) -> Option<&'a str> {
    annotation(meta, CLASS_ANNOTATION)
        .or_else(|| annotation(meta, LEGACY_CLASS_ANNOTATION))
        .or(spec_class)
        .map(str::trim)
        .filter(|c| !c.is_empty())
}

/// Returns true if a resource of class `class` should be served.
pub fn matches_class(class: Option<&str>, configured: &[String]) -> bool {
    if configured.is_empty() {
        return matches!(class, None | Some(DEFAULT_INGRESS_CLASS));
    }
    class.is_some_and(|c| configured.iter().any(|n| n == c))
}
