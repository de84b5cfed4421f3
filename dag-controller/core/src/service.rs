use crate::{
    headers::HeadersPolicy, listener::TlsVersion, secret::Secret, timeout::ClusterTimeoutPolicy,
};
use std::{fmt, str::FromStr, sync::Arc, time::Duration};

/// Identifies a backend port.
///
/// Structurally identical backend references resolve to the same key and are
/// therefore shared by every route that targets them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceKey {
    pub namespace: String,
    pub name: String,
    pub port: u16,
}

/// A resolved backend service port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Service {
    pub key: ServiceKey,
    pub port_name: Option<String>,
    pub protocol: UpstreamProtocol,

    /// Set when the backend is an `ExternalName` service.
    pub external_name: Option<String>,
    pub circuit_breakers: CircuitBreakers,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum UpstreamProtocol {
    #[default]
    Http1,
    H2,
    H2c,
    Tls,
}

/// Connection thresholds; `None` leaves the proxy default in place.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CircuitBreakers {
    pub max_connections: Option<u32>,
    pub max_pending_requests: Option<u32>,
    pub max_requests: Option<u32>,
    pub max_retries: Option<u32>,
    pub per_host_max_connections: Option<u32>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum LoadBalancerPolicy {
    #[default]
    RoundRobin,
    WeightedLeastRequest,
    Random,
    RequestHash,
    Cookie,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HealthCheckPolicy {
    pub path: String,
    pub host: Option<String>,
    pub interval: Duration,
    pub timeout: Duration,
    pub unhealthy_threshold: u32,
    pub healthy_threshold: u32,
}

/// TLS parameters for connections to upstreams.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct UpstreamTls {
    pub minimum_protocol_version: TlsVersion,
    pub maximum_protocol_version: Option<TlsVersion>,
    pub cipher_suites: Vec<String>,
}

/// A weighted reference from a route to a service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cluster {
    pub upstream: Arc<Service>,
    pub weight: u32,
    pub protocol: UpstreamProtocol,
    pub load_balancer_policy: LoadBalancerPolicy,
    pub health_check_policy: Option<HealthCheckPolicy>,
    pub timeout_policy: ClusterTimeoutPolicy,
    pub request_headers_policy: Option<HeadersPolicy>,
    pub response_headers_policy: Option<HeadersPolicy>,

    /// Presented to upstreams that require client certificates.
    pub client_certificate: Option<Arc<Secret>>,
    pub upstream_tls: Option<UpstreamTls>,
    pub max_requests_per_connection: Option<u32>,
    pub per_connection_buffer_limit_bytes: Option<u32>,
}

// === impl ServiceKey ===

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.namespace, self.name, self.port)
    }
}

// === impl UpstreamProtocol ===

impl UpstreamProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http1 => "",
            Self::H2 => "h2",
            Self::H2c => "h2c",
            Self::Tls => "tls",
        }
    }
}

impl FromStr for UpstreamProtocol {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "http" | "http/1.1" => Ok(Self::Http1),
            "h2" => Ok(Self::H2),
            "h2c" => Ok(Self::H2c),
            "tls" => Ok(Self::Tls),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

// === impl LoadBalancerPolicy ===

impl FromStr for LoadBalancerPolicy {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "RoundRobin" => Ok(Self::RoundRobin),
            "WeightedLeastRequest" => Ok(Self::WeightedLeastRequest),
            "Random" => Ok(Self::Random),
            "RequestHash" => Ok(Self::RequestHash),
            "Cookie" => Ok(Self::Cookie),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown value {0:?}")]
pub struct UnknownVariant(pub String);

// === impl Cluster ===

impl Cluster {
    pub fn new(upstream: Arc<Service>) -> Self {
        Self {
            protocol: upstream.protocol,
            upstream,
            weight: 0,
            load_balancer_policy: LoadBalancerPolicy::default(),
            health_check_policy: None,
            timeout_policy: ClusterTimeoutPolicy::default(),
            request_headers_policy: None,
            response_headers_policy: None,
            client_certificate: None,
            upstream_tls: None,
            max_requests_per_connection: None,
            per_connection_buffer_limit_bytes: None,
        }
    }
}
