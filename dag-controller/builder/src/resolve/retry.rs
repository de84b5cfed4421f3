use crate::{annotation::IngressAnnotations, error::PolicyError};
use ingress_dag_core::{timeout::Setting, RetryPolicy};
use ingress_dag_k8s_api::policy as api;

const DEFAULT_RETRY_ON: &str = "5xx";

/// Computes the retry policy of an annotation-configured route. Routes
/// without `retry-on` are not retried.
pub fn ingress_retry_policy(annotations: &IngressAnnotations) -> Option<RetryPolicy> {
    let retry_on = annotations.retry_on.clone()?;
    Some(RetryPolicy {
        retry_on,
        retriable_status_codes: vec![],
        num_retries: num_retries(annotations.num_retries.map(i64::from)),
        per_try_timeout: annotations.per_try_timeout.unwrap_or_default(),
    })
}

pub fn http_proxy_retry_policy(policy: &api::RetryPolicy) -> Result<RetryPolicy, PolicyError> {
    if let Some(count) = policy.count {
        if count < -1 {
            return Err(PolicyError::Retry(format!(
                "count must not be less than -1, got {count}"
            )));
        }
    }

    let per_try_timeout = match &policy.per_try_timeout {
        Some(v) => Setting::parse(v).map_err(|e| {
            PolicyError::Retry(format!("failed to parse per try timeout {v:?}: {e}"))
        })?,
        None => Setting::Default,
    };

    let retry_on = match &policy.retry_on {
        Some(conditions) if !conditions.is_empty() => conditions.join(","),
        _ => DEFAULT_RETRY_ON.to_string(),
    };

    let retriable_status_codes = policy.retriable_status_codes.clone().unwrap_or_default();
    if let Some(code) = retriable_status_codes
        .iter()
        .find(|c| !(100..=599).contains(*c))
    {
        return Err(PolicyError::Retry(format!(
            "invalid retriable status code {code}"
        )));
    }

    Ok(RetryPolicy {
        retry_on,
        retriable_status_codes,
        num_retries: num_retries(policy.count),
        per_try_timeout,
    })
}

/// `-1` disables retries; an unset or zero count means a single retry.
fn num_retries(count: Option<i64>) -> u32 {
    match count {
        None | Some(0) => 1,
        Some(n) if n < 0 => 0,
        Some(n) => u32::try_from(n).unwrap_or(u32::MAX),
    }
}
