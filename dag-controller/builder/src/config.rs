use ingress_dag_core::{
    headers::HeadersPolicy, timeout::Setting, CircuitBreakers, Dag, Listener, ListenerProtocol,
    ResourceId, TlsVersion, UpstreamTls,
};
use ingress_dag_k8s_api::config::RateLimitServiceConfig;
use std::time::Duration;

/// Process-wide settings that apply to every build.
#[derive(Clone, Debug)]
pub struct Defaults {
    /// Response timeout for routes that do not configure one.
    pub response_timeout: Setting,

    /// Upstream connect timeout; `None` leaves the proxy default in place.
    pub connect_timeout: Option<Duration>,

    pub enable_external_name_service: bool,

    /// Stamps each route with a reference to the resource it came from.
    pub set_source_metadata_on_routes: bool,

    pub rate_limit_service: Option<RateLimitServiceConfig>,
    pub circuit_breakers: Option<CircuitBreakers>,
    pub request_headers_policy: Option<HeadersPolicy>,
    pub response_headers_policy: Option<HeadersPolicy>,

    /// A TLS secret presented to upstreams that require client certificates.
    pub client_certificate: Option<ResourceId>,
    pub upstream_tls: Option<UpstreamTls>,
    pub max_requests_per_connection: Option<u32>,
    pub per_connection_buffer_limit_bytes: Option<u32>,

    /// The lowest TLS version any secure virtual host accepts.
    pub minimum_tls_version: TlsVersion,

    pub http_listener: ListenerConfig,
    pub https_listener: ListenerConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenerConfig {
    pub name: String,
    pub address: String,
    pub port: u16,
}

// === impl Defaults ===

impl Default for Defaults {
    fn default() -> Self {
        Self {
            response_timeout: Setting::Default,
            connect_timeout: None,
            enable_external_name_service: false,
            set_source_metadata_on_routes: false,
            rate_limit_service: None,
            circuit_breakers: None,
            request_headers_policy: None,
            response_headers_policy: None,
            client_certificate: None,
            upstream_tls: None,
            max_requests_per_connection: None,
            per_connection_buffer_limit_bytes: None,
            minimum_tls_version: TlsVersion::V1_2,
            http_listener: ListenerConfig::new("ingress_http", "0.0.0.0", 8080),
            https_listener: ListenerConfig::new("ingress_https", "0.0.0.0", 8443),
        }
    }
}

impl Defaults {
    pub(crate) fn ensure_http_listener<'d>(&self, dag: &'d mut Dag) -> &'d mut Listener {
        let ListenerConfig {
            name,
            address,
            port,
        } = &self.http_listener;
        dag.ensure_listener(name, address, *port, ListenerProtocol::Http)
    }

    pub(crate) fn ensure_https_listener<'d>(&self, dag: &'d mut Dag) -> &'d mut Listener {
        let ListenerConfig {
            name,
            address,
            port,
        } = &self.https_listener;
        dag.ensure_listener(name, address, *port, ListenerProtocol::Https)
    }

    /// The connect timeout applied to clusters. A zero timeout is treated as
    /// unset.
    pub(crate) fn cluster_connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout.filter(|d| !d.is_zero())
    }
}

// === impl ListenerConfig ===

impl ListenerConfig {
    pub fn new(name: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port,
        }
    }
}
