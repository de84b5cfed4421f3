//! Typed views over the annotations the controller understands.
//!
//! Annotations are parsed once per resource. Unknown keys are ignored and
//! malformed values are left unset and reported as [`Diagnostic`]s, so
//! annotation parsing never fails.

use crate::resolve::timeout::TimeoutOverrides;
use ingress_dag_core::{timeout::Setting, TlsVersion, UpstreamProtocol};
use ingress_dag_k8s_api::{ObjectMeta, ServicePort};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

pub const RESPONSE_TIMEOUT: &str = "projectcontour.io/response-timeout";
pub const REQUEST_TIMEOUT: &str = "projectcontour.io/request-timeout";
pub const CONNECT_TIMEOUT: &str = "projectcontour.io/connect-timeout";
pub const RETRY_ON: &str = "projectcontour.io/retry-on";
pub const NUM_RETRIES: &str = "projectcontour.io/num-retries";
pub const PER_TRY_TIMEOUT: &str = "projectcontour.io/per-try-timeout";
pub const WEBSOCKET_ROUTES: &str = "projectcontour.io/websocket-routes";
pub const TLS_MINIMUM_PROTOCOL_VERSION: &str = "projectcontour.io/tls-minimum-protocol-version";
pub const TLS_MAXIMUM_PROTOCOL_VERSION: &str = "projectcontour.io/tls-maximum-protocol-version";
pub const FORCE_SSL_REDIRECT: &str = "ingress.kubernetes.io/force-ssl-redirect";
pub const ALLOW_HTTP: &str = "kubernetes.io/ingress.allow-http";

pub const MAX_CONNECTIONS: &str = "projectcontour.io/max-connections";
pub const MAX_PENDING_REQUESTS: &str = "projectcontour.io/max-pending-requests";
pub const MAX_REQUESTS: &str = "projectcontour.io/max-requests";
pub const MAX_RETRIES: &str = "projectcontour.io/max-retries";
pub const PER_HOST_MAX_CONNECTIONS: &str = "projectcontour.io/per-host-max-connections";
const UPSTREAM_PROTOCOL_PREFIX: &str = "projectcontour.io/upstream-protocol.";

/// A malformed annotation value that was ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub key: String,
    pub value: String,
    pub error: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngressAnnotations {
    pub timeouts: TimeoutOverrides,
    pub retry_on: Option<String>,
    pub num_retries: Option<i32>,
    pub per_try_timeout: Option<Setting>,

    /// Paths on which websocket upgrades are allowed.
    pub websocket_routes: BTreeSet<String>,
    pub tls_minimum_protocol_version: Option<TlsVersion>,
    pub tls_maximum_protocol_version: Option<TlsVersion>,

    /// Redirects plaintext requests to HTTPS.
    pub force_ssl_redirect: bool,

    /// When false, routes are only served over HTTPS.
    pub allow_http: bool,
}

/// Per-service settings read from Service annotations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceAnnotations {
    pub max_connections: Option<u32>,
    pub max_pending_requests: Option<u32>,
    pub max_requests: Option<u32>,
    pub max_retries: Option<u32>,
    pub per_host_max_connections: Option<u32>,

    /// Upstream protocols keyed by port name or number.
    pub protocols: BTreeMap<String, UpstreamProtocol>,
}

// === impl Diagnostic ===

impl Diagnostic {
    fn new(key: &str, value: &str, error: impl fmt::Display) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
            error: error.to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ignoring annotation {}={:?}: {}",
            self.key, self.value, self.error
        )
    }
}

// === impl IngressAnnotations ===

impl Default for IngressAnnotations {
    fn default() -> Self {
        Self {
            timeouts: TimeoutOverrides::default(),
            retry_on: None,
            num_retries: None,
            per_try_timeout: None,
            websocket_routes: BTreeSet::new(),
            tls_minimum_protocol_version: None,
            tls_maximum_protocol_version: None,
            force_ssl_redirect: false,
            allow_http: true,
        }
    }
}

impl IngressAnnotations {
    pub fn parse(meta: &ObjectMeta) -> (Self, Vec<Diagnostic>) {
        let mut anns = Self::default();
        let mut diagnostics = vec![];
        let Some(annotations) = meta.annotations.as_ref() else {
            return (anns, diagnostics);
        };

        for (key, value) in annotations {
            let result = match key.as_str() {
                RESPONSE_TIMEOUT => parse_setting(value).map(|s| anns.timeouts.response = Some(s)),
                REQUEST_TIMEOUT => parse_setting(value).map(|s| anns.timeouts.request = Some(s)),
                CONNECT_TIMEOUT => parse_setting(value).map(|s| anns.timeouts.connect = Some(s)),
                RETRY_ON => {
                    let value = value.trim();
                    if !value.is_empty() {
                        anns.retry_on = Some(value.to_string());
                    }
                    Ok(())
                }
                NUM_RETRIES => value
                    .trim()
                    .parse::<i32>()
                    .map_err(|e| e.to_string())
                    .and_then(|n| {
                        if n < -1 {
                            return Err("must not be less than -1".to_string());
                        }
                        anns.num_retries = Some(n);
                        Ok(())
                    }),
                PER_TRY_TIMEOUT => parse_setting(value).map(|s| anns.per_try_timeout = Some(s)),
                WEBSOCKET_ROUTES => {
                    anns.websocket_routes = value
                        .split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(str::to_string)
                        .collect();
                    Ok(())
                }
                TLS_MINIMUM_PROTOCOL_VERSION => parse_tls_version(value)
                    .map(|v| anns.tls_minimum_protocol_version = Some(v)),
                TLS_MAXIMUM_PROTOCOL_VERSION => parse_tls_version(value)
                    .map(|v| anns.tls_maximum_protocol_version = Some(v)),
                FORCE_SSL_REDIRECT => parse_bool(value).map(|b| anns.force_ssl_redirect = b),
                ALLOW_HTTP => parse_bool(value).map(|b| anns.allow_http = b),
                _ => Ok(()),
            };
            if let Err(error) = result {
                diagnostics.push(Diagnostic::new(key, value, error));
            }
        }

        (anns, diagnostics)
    }
}

// === impl ServiceAnnotations ===

impl ServiceAnnotations {
    pub fn parse(meta: &ObjectMeta) -> (Self, Vec<Diagnostic>) {
        let mut anns = Self::default();
        let mut diagnostics = vec![];
        let Some(annotations) = meta.annotations.as_ref() else {
            return (anns, diagnostics);
        };

        for (key, value) in annotations {
            let result = match key.as_str() {
                MAX_CONNECTIONS => parse_u32(value).map(|n| anns.max_connections = Some(n)),
                MAX_PENDING_REQUESTS => {
                    parse_u32(value).map(|n| anns.max_pending_requests = Some(n))
                }
                MAX_REQUESTS => parse_u32(value).map(|n| anns.max_requests = Some(n)),
                MAX_RETRIES => parse_u32(value).map(|n| anns.max_retries = Some(n)),
                PER_HOST_MAX_CONNECTIONS => {
                    parse_u32(value).map(|n| anns.per_host_max_connections = Some(n))
                }
                key => match key.strip_prefix(UPSTREAM_PROTOCOL_PREFIX) {
                    Some(protocol) => protocol
                        .parse::<UpstreamProtocol>()
                        .map_err(|e| e.to_string())
                        .map(|protocol| {
                            for port in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                                anns.protocols.insert(port.to_string(), protocol);
                            }
                        }),
                    None => Ok(()),
                },
            };
            if let Err(error) = result {
                diagnostics.push(Diagnostic::new(key, value, error));
            }
        }

        (anns, diagnostics)
    }

    /// Returns the upstream protocol configured for `port`, matching by name
    /// first and then by number.
    pub fn protocol_for(&self, port: &ServicePort) -> UpstreamProtocol {
        port.name
            .as_ref()
            .and_then(|name| self.protocols.get(name))
            .or_else(|| self.protocols.get(&port.port.to_string()))
            .copied()
            .unwrap_or_default()
    }
}

fn parse_setting(value: &str) -> Result<Setting, String> {
    Setting::parse(value).map_err(|e| e.to_string())
}

fn parse_tls_version(value: &str) -> Result<TlsVersion, String> {
    value.parse().map_err(|_| "expected 1.2 or 1.3".to_string())
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err("expected true or false".to_string()),
    }
}

fn parse_u32(value: &str) -> Result<u32, String> {
    value.trim().parse::<u32>().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn meta(annotations: BTreeMap<String, String>) -> ObjectMeta {
        ObjectMeta {
            annotations: Some(annotations),
            ..Default::default()
        }
    }

    #[test]
    fn unknown_annotations_are_ignored() {
        let (anns, diagnostics) = IngressAnnotations::parse(&meta(btreemap! {
            "example.com/unrelated".to_string() => "garbage".to_string(),
        }));
        assert_eq!(anns, IngressAnnotations::default());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn malformed_values_are_diagnosed() {
        let (anns, diagnostics) = IngressAnnotations::parse(&meta(btreemap! {
            RESPONSE_TIMEOUT.to_string() => "five seconds".to_string(),
            REQUEST_TIMEOUT.to_string() => "10s".to_string(),
            NUM_RETRIES.to_string() => "-3".to_string(),
            ALLOW_HTTP.to_string() => "nope".to_string(),
        }));

        assert_eq!(anns.timeouts.response, None);
        assert_eq!(
            anns.timeouts.request,
            Some(Setting::Duration(Duration::from_secs(10)))
        );
        assert_eq!(anns.num_retries, None);
        assert!(anns.allow_http);

        let keys = diagnostics.iter().map(|d| d.key.as_str()).collect::<Vec<_>>();
        assert_eq!(keys, vec![ALLOW_HTTP, NUM_RETRIES, RESPONSE_TIMEOUT]);
    }

    #[test]
    fn parses_ingress_annotations() {
        let (anns, diagnostics) = IngressAnnotations::parse(&meta(btreemap! {
            RETRY_ON.to_string() => "5xx,gateway-error".to_string(),
            NUM_RETRIES.to_string() => "-1".to_string(),
            WEBSOCKET_ROUTES.to_string() => "/ws , /chat".to_string(),
            TLS_MINIMUM_PROTOCOL_VERSION.to_string() => "1.3".to_string(),
            FORCE_SSL_REDIRECT.to_string() => "true".to_string(),
            ALLOW_HTTP.to_string() => "false".to_string(),
        }));
        assert!(diagnostics.is_empty());
        assert_eq!(anns.retry_on.as_deref(), Some("5xx,gateway-error"));
        assert_eq!(anns.num_retries, Some(-1));
        assert_eq!(
            anns.websocket_routes.iter().collect::<Vec<_>>(),
            vec!["/chat", "/ws"]
        );
        assert_eq!(anns.tls_minimum_protocol_version, Some(TlsVersion::V1_3));
        assert!(anns.force_ssl_redirect);
        assert!(!anns.allow_http);
    }

    #[test]
    fn service_protocols_by_name_or_number() {
        let (anns, diagnostics) = ServiceAnnotations::parse(&meta(btreemap! {
            "projectcontour.io/upstream-protocol.h2c".to_string() => "grpc, 9000".to_string(),
            "projectcontour.io/upstream-protocol.tls".to_string() => "443".to_string(),
            MAX_CONNECTIONS.to_string() => "100".to_string(),
            MAX_RETRIES.to_string() => "many".to_string(),
        }));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(anns.max_connections, Some(100));
        assert_eq!(anns.max_retries, None);

        let port = |name: Option<&str>, port: i32| ServicePort {
            name: name.map(str::to_string),
            port,
            ..Default::default()
        };
        assert_eq!(anns.protocol_for(&port(Some("grpc"), 80)), UpstreamProtocol::H2c);
        assert_eq!(anns.protocol_for(&port(None, 9000)), UpstreamProtocol::H2c);
        assert_eq!(anns.protocol_for(&port(Some("https"), 443)), UpstreamProtocol::Tls);
        assert_eq!(anns.protocol_for(&port(Some("http"), 80)), UpstreamProtocol::Http1);
    }
}
