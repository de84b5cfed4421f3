//! Policy payloads shared by the HTTPProxy resource and the controller's
//! configuration file.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Rate limits applied to a virtual host or route.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitPolicy {
    /// A token bucket enforced locally by each proxy.
    pub local: Option<LocalRateLimitPolicy>,

    /// Descriptors sent to the external rate limit service.
    pub global: Option<GlobalRateLimitPolicy>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocalRateLimitPolicy {
    /// Requests allowed per unit of time.
    pub requests: u32,

    /// One of `second`, `minute` or `hour`.
    pub unit: String,

    /// Requests allowed above the base rate.
    pub burst: Option<u32>,

    /// Status returned for rate limited requests. Defaults to 429.
    pub response_status_code: Option<u32>,

    pub response_headers_to_add: Option<Vec<HeaderValue>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GlobalRateLimitPolicy {
    /// Disables a global policy inherited from the virtual host or from the
    /// controller's default.
    pub disabled: Option<bool>,

    pub descriptors: Option<Vec<RateLimitDescriptor>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDescriptor {
    pub entries: Vec<RateLimitDescriptorEntry>,
}

/// A descriptor entry. Exactly one field must be set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDescriptorEntry {
    pub generic_key: Option<GenericKeyDescriptor>,
    pub request_header: Option<RequestHeaderDescriptor>,
    pub request_header_value_match: Option<RequestHeaderValueMatchDescriptor>,
    pub remote_address: Option<RemoteAddressDescriptor>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenericKeyDescriptor {
    pub key: Option<String>,
    pub value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestHeaderDescriptor {
    pub header_name: String,
    pub descriptor_key: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestHeaderValueMatchDescriptor {
    pub headers: Vec<HeaderMatchCondition>,

    /// Whether the entry applies when the headers match (the default) or
    /// when they do not.
    pub expect_match: Option<bool>,
    pub value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct RemoteAddressDescriptor {}

/// Matches a request header. Exactly one of the match fields must be set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct HeaderMatchCondition {
    pub name: String,
    pub present: Option<bool>,
    #[serde(rename = "notpresent")]
    pub not_present: Option<bool>,
    pub contains: Option<String>,
    #[serde(rename = "notcontains")]
    pub not_contains: Option<String>,
    pub exact: Option<String>,
    #[serde(rename = "notexact")]
    pub not_exact: Option<String>,
    pub regex: Option<String>,
}

/// Matches a query parameter. Exactly one of the match fields must be set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryParameterMatchCondition {
    pub name: String,
    pub exact: Option<String>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub regex: Option<String>,
    pub contains: Option<String>,
    pub present: Option<bool>,
    pub ignore_case: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HeadersPolicy {
    pub set: Option<Vec<HeaderValue>>,
    pub remove: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HeaderValue {
    pub name: String,
    pub value: String,
}

/// Go-style duration strings; `infinity` disables a timeout.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutPolicy {
    pub response: Option<String>,
    pub idle: Option<String>,
    pub idle_connection: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Number of retries; `-1` disables retries and `0` means one retry.
    pub count: Option<i64>,
    pub per_try_timeout: Option<String>,
    pub retry_on: Option<Vec<String>>,
    pub retriable_status_codes: Option<Vec<u32>>,
}
