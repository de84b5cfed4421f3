use crate::annotation::ServiceAnnotations;
use ingress_dag_core::CircuitBreakers;

/// Computes a service's circuit breakers. For each threshold a non-zero
/// annotation wins over the process-wide default.
pub fn circuit_breakers(
    annotations: &ServiceAnnotations,
    defaults: Option<&CircuitBreakers>,
) -> CircuitBreakers {
    let defaults = defaults.copied().unwrap_or_default();
    let pick = |annotation: Option<u32>, default: Option<u32>| {
        annotation.filter(|n| *n != 0).or(default)
    };
    CircuitBreakers {
        max_connections: pick(annotations.max_connections, defaults.max_connections),
        max_pending_requests: pick(
            annotations.max_pending_requests,
            defaults.max_pending_requests,
        ),
        max_requests: pick(annotations.max_requests, defaults.max_requests),
        max_retries: pick(annotations.max_retries, defaults.max_retries),
        per_host_max_connections: pick(
            annotations.per_host_max_connections,
            defaults.per_host_max_connections,
        ),
    }
}
