//! Process-wide configuration objects, as read from the controller's
//! configuration file.

use crate::policy::{GlobalRateLimitPolicy, HeadersPolicy};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Configures the external global rate limit service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitServiceConfig {
    /// `namespace/name` of the extension service implementing the rate limit
    /// API.
    pub extension_service: String,
    pub domain: Option<String>,

    /// Allows requests through when the rate limit service is unavailable.
    #[serde(default)]
    pub fail_open: bool,

    #[serde(default)]
    pub enable_x_rate_limit_headers: bool,

    #[serde(default)]
    pub enable_resource_exhausted_code: bool,

    /// Applied to every route that does not define its own global policy.
    pub default_global_rate_limit_policy: Option<GlobalRateLimitPolicy>,
}

/// Default circuit breaker thresholds for all upstream services.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakers {
    pub max_connections: Option<u32>,
    pub max_pending_requests: Option<u32>,
    pub max_requests: Option<u32>,
    pub max_retries: Option<u32>,
    pub per_host_max_connections: Option<u32>,
}

/// Header policies applied to every route and cluster.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HeadersPolicies {
    pub request: Option<HeadersPolicy>,
    pub response: Option<HeadersPolicy>,
}
