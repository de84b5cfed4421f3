use crate::policy::{
    HeaderMatchCondition, HeadersPolicy, QueryParameterMatchCondition, RateLimitPolicy,
    RetryPolicy, TimeoutPolicy,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// HTTPProxy describes a virtual host and the routes it serves.
///
/// A proxy with a `virtualhost` is a root proxy. Proxies without one are
/// only meaningful when included by a root, which this controller does not
/// support, so they are reported as orphaned.
#[derive(
    Clone,
    Debug,
    Default,
    PartialEq,
    kube::CustomResource,
    Deserialize,
    Serialize,
    JsonSchema,
)]
#[kube(
    group = "projectcontour.io",
    version = "v1",
    kind = "HTTPProxy",
    root = "HttpProxy",
    status = "HttpProxyStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct HttpProxySpec {
    #[serde(rename = "virtualhost")]
    pub virtual_host: Option<VirtualHost>,

    #[serde(default)]
    pub routes: Vec<Route>,

    /// Restricts which ingress class may serve this proxy.
    pub ingress_class_name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HttpProxyStatus {
    pub current_status: Option<String>,
    pub description: Option<String>,
    pub conditions: Option<Vec<Condition>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualHost {
    /// Fully qualified domain name; may start with a `*.` wildcard label.
    pub fqdn: String,
    pub tls: Option<Tls>,
    pub rate_limit_policy: Option<RateLimitPolicy>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Tls {
    /// A `name` or `namespace/name` reference to a TLS secret.
    pub secret_name: String,
    pub minimum_protocol_version: Option<String>,
    pub maximum_protocol_version: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    #[serde(default)]
    pub conditions: Vec<MatchCondition>,

    #[serde(default)]
    pub services: Vec<RouteService>,

    pub enable_websockets: Option<bool>,

    /// Serves the route over plain HTTP on a TLS virtual host instead of
    /// redirecting to HTTPS.
    pub permit_insecure: Option<bool>,

    pub timeout_policy: Option<TimeoutPolicy>,
    pub retry_policy: Option<RetryPolicy>,
    pub health_check_policy: Option<HealthCheckPolicy>,
    pub load_balancer_policy: Option<LoadBalancerPolicy>,
    pub request_headers_policy: Option<HeadersPolicy>,
    pub response_headers_policy: Option<HeadersPolicy>,
    pub rate_limit_policy: Option<RateLimitPolicy>,
}

/// A route condition. Exactly one field must be set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchCondition {
    pub prefix: Option<String>,
    pub exact: Option<String>,
    pub regex: Option<String>,
    pub header: Option<HeaderMatchCondition>,
    pub query_parameter: Option<QueryParameterMatchCondition>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteService {
    pub name: String,
    pub port: u16,
    pub weight: Option<u32>,

    /// Overrides the protocol from the Service's annotations.
    pub protocol: Option<String>,
    pub request_headers_policy: Option<HeadersPolicy>,
    pub response_headers_policy: Option<HeadersPolicy>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckPolicy {
    pub path: String,
    pub host: Option<String>,
    pub interval_seconds: Option<u64>,
    pub timeout_seconds: Option<u64>,
    pub unhealthy_threshold_count: Option<u32>,
    pub healthy_threshold_count: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerPolicy {
    pub strategy: Option<String>,
}

impl HttpProxy {
    /// Returns true if the proxy defines a virtual host.
    pub fn is_root(&self) -> bool {
        self.spec.virtual_host.is_some()
    }
}
