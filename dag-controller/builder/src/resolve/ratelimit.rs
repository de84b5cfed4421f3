use crate::{
    error::{Degraded, PolicyError},
    resolve::headers::{header_match, header_name},
};
use ingress_dag_core::ratelimit::{
    GlobalRateLimitPolicy, LocalRateLimitPolicy, RateLimitDescriptor, RateLimitDescriptorEntry,
    RateLimitPolicy,
};
use ingress_dag_k8s_api::{config::RateLimitServiceConfig, policy as api};
use std::{collections::BTreeMap, time::Duration};

/// Computes the rate limit policy attached to a route or virtual host.
///
/// Global rate limiting needs a configured rate limit service; without one
/// the global component is never set. A locally defined global policy is
/// used as-is. Otherwise, when `inherit_default` is set, the service's
/// default policy is copied in. The local token bucket is resolved
/// independently.
///
/// Malformed parts are dropped from the returned policy and reported
/// alongside it.
pub fn rate_limit_policy(
    local: Option<&api::RateLimitPolicy>,
    service: Option<&RateLimitServiceConfig>,
    inherit_default: bool,
) -> Degraded<Option<RateLimitPolicy>> {
    let mut errors = vec![];

    let local_bucket = local
        .and_then(|p| p.local.as_ref())
        .and_then(|l| match local_rate_limit(l) {
            Ok(policy) => Some(policy),
            Err(error) => {
                errors.push(error);
                None
            }
        });

    let global = service.and_then(|service| {
        let source = match local.and_then(|p| p.global.as_ref()) {
            Some(global) => global,
            None if inherit_default => service.default_global_rate_limit_policy.as_ref()?,
            None => return None,
        };
        Some(global_rate_limit(source, &mut errors))
    });

    Degraded {
        value: RateLimitPolicy::from_parts(local_bucket, global),
        errors,
    }
}

fn local_rate_limit(
    policy: &api::LocalRateLimitPolicy,
) -> Result<LocalRateLimitPolicy, PolicyError> {
    let invalid = |msg: String| PolicyError::RateLimit(msg);

    if policy.requests == 0 {
        return Err(invalid("local requests must be greater than zero".to_string()));
    }

    let fill_interval = match policy.unit.as_str() {
        "second" => Duration::from_secs(1),
        "minute" => Duration::from_secs(60),
        "hour" => Duration::from_secs(60 * 60),
        unit => {
            return Err(invalid(format!(
                "unit {unit:?} must be one of second, minute or hour"
            )))
        }
    };

    let response_status_code = match policy.response_status_code {
        None | Some(0) => None,
        Some(code @ 400..=599) => Some(code),
        Some(code) => {
            return Err(invalid(format!(
                "response status code {code} must be between 400 and 599"
            )))
        }
    };

    let mut response_headers_to_add = BTreeMap::new();
    for api::HeaderValue { name, value } in policy.response_headers_to_add.iter().flatten() {
        let key = header_name(name).map_err(|e| invalid(e.to_string()))?;
        if response_headers_to_add.insert(key, value.clone()).is_some() {
            return Err(invalid(format!("duplicate response header {name:?}")));
        }
    }

    let burst = policy.burst.unwrap_or(0);
    Ok(LocalRateLimitPolicy {
        max_tokens: policy.requests.saturating_add(burst),
        tokens_per_fill: policy.requests,
        fill_interval,
        response_status_code,
        response_headers_to_add,
    })
}

fn global_rate_limit(
    policy: &api::GlobalRateLimitPolicy,
    errors: &mut Vec<PolicyError>,
) -> GlobalRateLimitPolicy {
    let mut descriptors = vec![];
    for (i, descriptor) in policy.descriptors.iter().flatten().enumerate() {
        match descriptor_entries(descriptor) {
            Ok(entries) => descriptors.push(RateLimitDescriptor { entries }),
            Err(error) => errors.push(PolicyError::RateLimit(format!("descriptor {i}: {error}"))),
        }
    }
    GlobalRateLimitPolicy {
        disabled: policy.disabled.unwrap_or(false),
        descriptors,
    }
}

fn descriptor_entries(
    descriptor: &api::RateLimitDescriptor,
) -> Result<Vec<RateLimitDescriptorEntry>, String> {
    if descriptor.entries.is_empty() {
        return Err("must have at least one entry".to_string());
    }
    descriptor
        .entries
        .iter()
        .enumerate()
        .map(|(i, e)| descriptor_entry(e).map_err(|error| format!("entry {i}: {error}")))
        .collect()
}

fn descriptor_entry(
    entry: &api::RateLimitDescriptorEntry,
) -> Result<RateLimitDescriptorEntry, String> {
    let api::RateLimitDescriptorEntry {
        generic_key,
        request_header,
        request_header_value_match,
        remote_address,
    } = entry;

    let set = [
        generic_key.is_some(),
        request_header.is_some(),
        request_header_value_match.is_some(),
        remote_address.is_some(),
    ]
    .into_iter()
    .filter(|s| *s)
    .count();
    if set != 1 {
        return Err(format!("exactly one field must be set, got {set}"));
    }

    if let Some(gk) = generic_key {
        if gk.value.is_empty() {
            return Err("generic key value must be set".to_string());
        }
        return Ok(RateLimitDescriptorEntry::GenericKey {
            key: gk.key.clone().filter(|k| !k.is_empty()),
            value: gk.value.clone(),
        });
    }

    if let Some(rh) = request_header {
        if rh.descriptor_key.is_empty() {
            return Err("request header descriptor key must be set".to_string());
        }
        let header_name = header_name(&rh.header_name).map_err(|e| e.to_string())?;
        return Ok(RateLimitDescriptorEntry::RequestHeader {
            header_name,
            descriptor_key: rh.descriptor_key.clone(),
        });
    }

    if let Some(vm) = request_header_value_match {
        if vm.headers.is_empty() {
            return Err("request header value match must have at least one header".to_string());
        }
        if vm.value.is_empty() {
            return Err("request header value match value must be set".to_string());
        }
        let headers = vm
            .headers
            .iter()
            .map(header_match)
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(RateLimitDescriptorEntry::RequestHeaderValueMatch {
            headers,
            expect_match: vm.expect_match.unwrap_or(true),
            value: vm.value.clone(),
        });
    }

    Ok(RateLimitDescriptorEntry::RemoteAddress)
}
