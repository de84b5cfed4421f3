//! The controller's configuration file.
//!
//! Everything is optional; an empty file yields the builder's defaults.

use crate::builder::{
    resolve::{
        headers::{headers_policy, Direction},
        ratelimit::rate_limit_policy,
    },
    Defaults, ListenerConfig,
};
use crate::core::{
    headers::HeadersPolicy, timeout::Setting, CircuitBreakers, ResourceId, TlsVersion,
    UpstreamTls,
};
use crate::k8s::{
    config::{CircuitBreakers as CircuitBreakersConfig, HeadersPolicies, RateLimitServiceConfig},
    policy,
};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    /// Ingress classes to serve. Empty serves unclassified resources and the
    /// default class.
    #[serde(default)]
    pub ingress_class_names: Vec<String>,

    #[serde(default)]
    pub timeouts: Timeouts,

    #[serde(default)]
    pub enable_external_name_service: bool,

    #[serde(default)]
    pub set_source_metadata_on_routes: bool,

    pub rate_limit_service: Option<RateLimitServiceConfig>,
    pub circuit_breakers: Option<CircuitBreakersConfig>,

    #[serde(default)]
    pub headers: HeadersPolicies,

    /// `namespace/name` of a TLS secret presented to upstreams.
    pub client_certificate: Option<String>,

    pub upstream_tls: Option<UpstreamTlsConfig>,
    pub max_requests_per_connection: Option<u32>,
    pub per_connection_buffer_limit_bytes: Option<u32>,

    #[serde(default)]
    pub tls: TlsConfig,

    #[serde(default)]
    pub listeners: Listeners,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Timeouts {
    pub response: Option<String>,
    pub connect: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpstreamTlsConfig {
    pub minimum_protocol_version: Option<String>,
    pub maximum_protocol_version: Option<String>,
    #[serde(default)]
    pub cipher_suites: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TlsConfig {
    pub minimum_protocol_version: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Listeners {
    pub http: Option<ListenerAddress>,
    pub https: Option<ListenerAddress>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ListenerAddress {
    pub name: Option<String>,
    pub address: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

// === impl Config ===

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as null.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Validates the configuration and converts it into builder defaults.
    pub fn defaults(&self) -> Result<Defaults, ConfigError> {
        let mut defaults = Defaults::default();

        if let Some(response) = &self.timeouts.response {
            defaults.response_timeout = setting("timeouts.response", response)?;
        }
        if let Some(connect) = &self.timeouts.connect {
            defaults.connect_timeout = setting("timeouts.connect", connect)?.duration();
        }

        defaults.enable_external_name_service = self.enable_external_name_service;
        defaults.set_source_metadata_on_routes = self.set_source_metadata_on_routes;

        if let Some(service) = &self.rate_limit_service {
            if service.extension_service.split_once('/').is_none() {
                return Err(invalid(
                    "rateLimitService.extensionService",
                    format!("{:?} must be namespace/name", service.extension_service),
                ));
            }
            let resolved = rate_limit_policy(None, Some(service), true);
            if let Some(error) = resolved.errors.first() {
                return Err(invalid(
                    "rateLimitService.defaultGlobalRateLimitPolicy",
                    error.to_string(),
                ));
            }
            defaults.rate_limit_service = Some(service.clone());
        }

        defaults.circuit_breakers = self.circuit_breakers.as_ref().map(|cb| CircuitBreakers {
            max_connections: cb.max_connections,
            max_pending_requests: cb.max_pending_requests,
            max_requests: cb.max_requests,
            max_retries: cb.max_retries,
            per_host_max_connections: cb.per_host_max_connections,
        });

        defaults.request_headers_policy = headers(
            "headers.request",
            self.headers.request.as_ref(),
            Direction::Request,
        )?;
        defaults.response_headers_policy = headers(
            "headers.response",
            self.headers.response.as_ref(),
            Direction::Response,
        )?;

        if let Some(reference) = &self.client_certificate {
            let Some((namespace, name)) = reference.split_once('/') else {
                return Err(invalid(
                    "clientCertificate",
                    format!("{reference:?} must be namespace/name"),
                ));
            };
            defaults.client_certificate = Some(ResourceId::new(namespace, name));
        }

        if let Some(tls) = &self.upstream_tls {
            let minimum_protocol_version = tls
                .minimum_protocol_version
                .as_deref()
                .map(|v| tls_version("upstreamTls.minimumProtocolVersion", v))
                .transpose()?
                .unwrap_or_default();
            let maximum_protocol_version = tls
                .maximum_protocol_version
                .as_deref()
                .map(|v| tls_version("upstreamTls.maximumProtocolVersion", v))
                .transpose()?;
            defaults.upstream_tls = Some(UpstreamTls {
                minimum_protocol_version,
                maximum_protocol_version,
                cipher_suites: tls.cipher_suites.clone(),
            });
        }

        defaults.max_requests_per_connection = self.max_requests_per_connection;
        defaults.per_connection_buffer_limit_bytes = self.per_connection_buffer_limit_bytes;

        if let Some(version) = &self.tls.minimum_protocol_version {
            defaults.minimum_tls_version = tls_version("tls.minimumProtocolVersion", version)?;
        }

        if let Some(http) = &self.listeners.http {
            http.apply(&mut defaults.http_listener);
        }
        if let Some(https) = &self.listeners.https {
            https.apply(&mut defaults.https_listener);
        }
        if defaults.http_listener.name == defaults.https_listener.name {
            return Err(invalid(
                "listeners",
                format!(
                    "HTTP and HTTPS listeners must have different names, both are {:?}",
                    defaults.http_listener.name
                ),
            ));
        }

        Ok(defaults)
    }
}

// === impl ListenerAddress ===

impl ListenerAddress {
    fn apply(&self, listener: &mut ListenerConfig) {
        if let Some(name) = &self.name {
            listener.name = name.clone();
        }
        if let Some(address) = &self.address {
            listener.address = address.clone();
        }
        if let Some(port) = self.port {
            listener.port = port;
        }
    }
}

fn invalid(field: &'static str, message: String) -> ConfigError {
    ConfigError::Invalid { field, message }
}

fn setting(field: &'static str, value: &str) -> Result<Setting, ConfigError> {
    Setting::parse(value).map_err(|e| invalid(field, e.to_string()))
}

fn tls_version(field: &'static str, value: &str) -> Result<TlsVersion, ConfigError> {
    value
        .parse()
        .map_err(|_| invalid(field, format!("{value:?} must be 1.2 or 1.3")))
}

fn headers(
    field: &'static str,
    policy: Option<&policy::HeadersPolicy>,
    direction: Direction,
) -> Result<Option<HeadersPolicy>, ConfigError> {
    let Some(policy) = policy else {
        return Ok(None);
    };
    let resolved = headers_policy(policy, direction).map_err(|e| invalid(field, e.to_string()))?;
    Ok(Some(resolved).filter(|p| !p.is_empty()))
}
