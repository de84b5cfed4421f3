use crate::error::PolicyError;
use ingress_dag_core::timeout::{ClusterTimeoutPolicy, RouteTimeoutPolicy, Setting};
use ingress_dag_k8s_api::policy::TimeoutPolicy;
use std::time::Duration;

/// Timeouts configured locally on a resource. `None` means the value was not
/// set or could not be parsed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TimeoutOverrides {
    pub response: Option<Setting>,

    /// Deprecated alias of `response`.
    pub request: Option<Setting>,

    /// Reserved: validated, but not applied to routes.
    pub connect: Option<Setting>,
}

/// Computes the timeout policy of an annotation-configured route.
///
/// The response timeout is taken from the `response` override, then from the
/// deprecated `request` alias, and finally from the process-wide default.
pub fn route_timeout_policy(
    overrides: &TimeoutOverrides,
    default_response_timeout: Setting,
) -> RouteTimeoutPolicy {
    let response_timeout = match (overrides.response, overrides.request) {
        (Some(response), _) => response,
        (None, Some(request)) => request,
        (None, None) => default_response_timeout,
    };
    RouteTimeoutPolicy {
        response_timeout,
        idle_timeout: Setting::Default,
    }
}

/// Computes the timeout policies of an HTTPProxy route and its clusters.
pub fn http_proxy_timeout_policy(
    policy: Option<&TimeoutPolicy>,
    default_response_timeout: Setting,
    connect_timeout: Option<Duration>,
) -> Result<(RouteTimeoutPolicy, ClusterTimeoutPolicy), PolicyError> {
    let Some(policy) = policy else {
        return Ok((
            RouteTimeoutPolicy {
                response_timeout: default_response_timeout,
                idle_timeout: Setting::Default,
            },
            ClusterTimeoutPolicy {
                connect_timeout,
                idle_connection_timeout: Setting::Default,
            },
        ));
    };

    let parse = |field: &str, value: Option<&String>| -> Result<Option<Setting>, PolicyError> {
        value
            .map(|v| {
                Setting::parse(v).map_err(|e| {
                    PolicyError::Timeout(format!("failed to parse {field} timeout {v:?}: {e}"))
                })
            })
            .transpose()
    };

    let response_timeout =
        parse("response", policy.response.as_ref())?.unwrap_or(default_response_timeout);
    let idle_timeout = parse("idle", policy.idle.as_ref())?.unwrap_or_default();
    let idle_connection_timeout =
        parse("idle connection", policy.idle_connection.as_ref())?.unwrap_or_default();

    Ok((
        RouteTimeoutPolicy {
            response_timeout,
            idle_timeout,
        },
        ClusterTimeoutPolicy {
            connect_timeout,
            idle_connection_timeout,
        },
    ))
}
