use crate::route::HeaderMatch;
use std::{collections::BTreeMap, time::Duration};

/// Rate limiting applied to a route or virtual host.
///
/// At least one of the components is set; an absent policy is represented by
/// `None` at the attachment point, never by an empty policy.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RateLimitPolicy {
    pub local: Option<LocalRateLimitPolicy>,
    pub global: Option<GlobalRateLimitPolicy>,
}

/// A token bucket enforced by each proxy instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LocalRateLimitPolicy {
    pub max_tokens: u32,
    pub tokens_per_fill: u32,
    pub fill_interval: Duration,

    /// Status returned for limited requests; `None` means 429.
    pub response_status_code: Option<u32>,
    pub response_headers_to_add: BTreeMap<String, String>,
}

/// Descriptors sent to an external rate limit service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct GlobalRateLimitPolicy {
    /// Disables an inherited global policy.
    pub disabled: bool,
    pub descriptors: Vec<RateLimitDescriptor>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RateLimitDescriptor {
    pub entries: Vec<RateLimitDescriptorEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RateLimitDescriptorEntry {
    GenericKey {
        key: Option<String>,
        value: String,
    },
    RequestHeader {
        header_name: String,
        descriptor_key: String,
    },
    RequestHeaderValueMatch {
        headers: Vec<HeaderMatch>,
        expect_match: bool,
        value: String,
    },
    RemoteAddress,
}

impl RateLimitPolicy {
    /// Returns `None` when neither component is set.
    pub fn from_parts(
        local: Option<LocalRateLimitPolicy>,
        global: Option<GlobalRateLimitPolicy>,
    ) -> Option<Self> {
        if local.is_none() && global.is_none() {
            return None;
        }
        Some(Self { local, global })
    }
}
