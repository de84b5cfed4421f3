use crate::error::PolicyError;
use ingress_dag_core::{headers::HeadersPolicy, HeaderMatch, HeaderMatchKind};
use ingress_dag_k8s_api::policy::{self as api, HeaderMatchCondition};

/// Whether a headers policy applies to requests or to responses.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Request,
    Response,
}

/// Validates a headers policy.
///
/// Header names must be valid and may only be set once. Setting `Host` on a
/// request is turned into a host rewrite; rewriting `Host` on a response is
/// not supported.
pub fn headers_policy(
    policy: &api::HeadersPolicy,
    direction: Direction,
) -> Result<HeadersPolicy, PolicyError> {
    let mut resolved = HeadersPolicy::default();

    for api::HeaderValue { name, value } in policy.set.iter().flatten() {
        let key = header_name(name)?;
        if key == "host" {
            if direction == Direction::Response {
                return Err(PolicyError::Headers(
                    "rewriting the Host header is not supported on responses".to_string(),
                ));
            }
            resolved.host_rewrite = Some(value.clone());
            continue;
        }
        if resolved.set.insert(key, value.clone()).is_some() {
            return Err(PolicyError::Headers(format!(
                "duplicate header addition: {name:?}"
            )));
        }
    }

    for name in policy.remove.iter().flatten() {
        let key = header_name(name)?;
        if !resolved.remove.contains(&key) {
            resolved.remove.push(key);
        }
    }

    Ok(resolved)
}

/// Layers a local policy over the process-wide default.
pub fn merge(
    default: Option<&HeadersPolicy>,
    local: Option<HeadersPolicy>,
) -> Option<HeadersPolicy> {
    let merged = match (default, local) {
        (None, None) => return None,
        (Some(default), None) => default.clone(),
        (None, Some(local)) => local,
        (Some(default), Some(local)) => default.merge(&local),
    };
    (!merged.is_empty()).then_some(merged)
}

/// Converts a header match condition. Exactly one match kind must be set.
pub fn header_match(condition: &HeaderMatchCondition) -> Result<HeaderMatch, String> {
    let name = header_name(&condition.name).map_err(|e| e.to_string())?;

    let mut kinds = vec![];
    if condition.present == Some(true) {
        kinds.push(HeaderMatchKind::Present);
    }
    if condition.not_present == Some(true) {
        kinds.push(HeaderMatchKind::NotPresent);
    }
    if let Some(v) = &condition.exact {
        kinds.push(HeaderMatchKind::Exact(v.clone()));
    }
    if let Some(v) = &condition.not_exact {
        kinds.push(HeaderMatchKind::NotExact(v.clone()));
    }
    if let Some(v) = &condition.contains {
        kinds.push(HeaderMatchKind::Contains(v.clone()));
    }
    if let Some(v) = &condition.not_contains {
        kinds.push(HeaderMatchKind::NotContains(v.clone()));
    }
    if let Some(v) = &condition.regex {
        regex::Regex::new(v).map_err(|e| format!("invalid regex for header {name:?}: {e}"))?;
        kinds.push(HeaderMatchKind::Regex(v.clone()));
    }

    match kinds.len() {
        1 => Ok(HeaderMatch {
            name,
            kind: kinds.remove(0),
        }),
        0 => Err(format!("header condition {name:?} does not specify a match")),
        _ => Err(format!(
            "header condition {name:?} specifies more than one match"
        )),
    }
}

/// Validates and lower-cases a header name.
pub(crate) fn header_name(name: &str) -> Result<String, PolicyError> {
    http::HeaderName::from_bytes(name.as_bytes())
        .map(|n| n.as_str().to_string())
        .map_err(|_| PolicyError::Headers(format!("invalid header name {name:?}")))
}
