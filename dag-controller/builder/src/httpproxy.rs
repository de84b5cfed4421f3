use crate::{
    backend::{self, PortRef},
    config::Defaults,
    error::{BackendError, PolicyError, RouteError},
    host,
    processor::{Context, Processor},
    resolve::{
        headers::{self, header_match, Direction},
        ratelimit::rate_limit_policy,
        retry::http_proxy_retry_policy,
        timeout::http_proxy_timeout_policy,
    },
    secret,
};
use ingress_dag_core::{
    HealthCheckPolicy, LoadBalancerPolicy, PathMatch, QueryParamMatch, QueryParamMatchKind,
    ResourceId, ResourceRef, Route, RouteMatch, Secret, TlsVersion, UpstreamProtocol,
    DEFAULT_HOST,
};
use ingress_dag_k8s_api::{
    httpproxy as api, policy::QueryParameterMatchCondition, HttpProxy, ResourceExt,
};
use ingress_dag_k8s_status::Reason;
use std::{collections::BTreeMap, sync::Arc, time::Duration};

const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_UNHEALTHY_THRESHOLD: u32 = 3;
const DEFAULT_HEALTHY_THRESHOLD: u32 = 2;

/// Translates root HTTPProxies into virtual hosts and routes.
///
/// Proxies without a virtual host can only be included by other proxies,
/// which is not supported; they are left for validation to mark as orphaned.
#[derive(Clone, Debug)]
pub struct HttpProxyProcessor {
    defaults: Arc<Defaults>,
}

/// A proxy-level failure that invalidates the whole proxy.
struct Invalid(Reason, String);

// === impl HttpProxyProcessor ===

impl HttpProxyProcessor {
    pub fn new(defaults: Arc<Defaults>) -> Self {
        Self { defaults }
    }

    fn process(
        &self,
        ctx: &mut Context<'_>,
        fqdns: &mut BTreeMap<String, ResourceRef>,
        proxy: &HttpProxy,
    ) -> Result<(), Invalid> {
        let namespace = proxy.namespace().unwrap_or_default();
        let source = ResourceRef::http_proxy(&namespace, proxy.name_unchecked());
        ctx.statuses.entry(&source).generation = proxy.metadata.generation;

        let Some(vhost) = proxy.spec.virtual_host.as_ref() else {
            return Ok(());
        };

        let fqdn = vhost.fqdn.as_str();
        if fqdn == DEFAULT_HOST {
            return Err(Invalid(
                Reason::HostNotValid,
                "virtualhost.fqdn must be a host name".to_string(),
            ));
        }
        host::validate(fqdn).map_err(|e| Invalid(Reason::HostNotValid, e.to_string()))?;
        ctx.statuses.entry(&source).vhost = Some(fqdn.to_string());

        if let Some(owner) = fqdns.get(fqdn) {
            return Err(Invalid(
                Reason::DuplicateVhost,
                format!("fqdn {fqdn:?} is used in multiple HTTPProxies: {owner}"),
            ));
        }
        fqdns.insert(fqdn.to_string(), source.clone());

        let vhost_rate_limit = {
            let resolved = rate_limit_policy(
                vhost.rate_limit_policy.as_ref(),
                self.defaults.rate_limit_service.as_ref(),
                true,
            );
            if let Some(error) = resolved.errors.first() {
                return Err(Invalid(error.reason(), error.to_string()));
            }
            resolved.value
        };

        let tls = match vhost.tls.as_ref() {
            Some(tls) => Some(self.secure_virtual_host(ctx, &source, fqdn, tls)?),
            None => None,
        };

        let http = self
            .defaults
            .ensure_http_listener(ctx.dag)
            .ensure_virtual_host(fqdn);
        http.rate_limit_policy = vhost_rate_limit.clone();
        if tls.is_some() {
            if let Some(svh) = self.secure_virtual_host_mut(ctx, fqdn) {
                svh.virtual_host.rate_limit_policy = vhost_rate_limit;
            }
        }

        for (i, spec) in proxy.spec.routes.iter().enumerate() {
            let route = match self.route(ctx, &source, fqdn, spec) {
                Ok(route) => route,
                Err(error) => {
                    tracing::warn!(route = i, %error, "Invalid route");
                    ctx.statuses
                        .error(&source, error.reason(), format!("route {i}: {error}"));
                    continue;
                }
            };

            if tls.is_some() {
                if let Some(svh) = self.secure_virtual_host_mut(ctx, fqdn) {
                    svh.virtual_host.add_route(route.clone());
                }
            }

            let mut insecure = route;
            insecure.https_upgrade = tls.is_some() && !spec.permit_insecure.unwrap_or(false);
            self.defaults
                .ensure_http_listener(ctx.dag)
                .ensure_virtual_host(fqdn)
                .add_route(insecure);
        }

        Ok(())
    }

    /// Claims the secure virtual host of a proxy.
    fn secure_virtual_host(
        &self,
        ctx: &mut Context<'_>,
        source: &ResourceRef,
        fqdn: &str,
        tls: &api::Tls,
    ) -> Result<Arc<Secret>, Invalid> {
        let parse_version = |field: &str, value: Option<&String>| {
            value
                .map(|v| {
                    v.parse::<TlsVersion>().map_err(|_| {
                        Invalid(
                            Reason::TlsVersionNotValid,
                            format!("invalid {field} TLS version {v:?}"),
                        )
                    })
                })
                .transpose()
        };
        let min_tls_version = parse_version("minimum", tls.minimum_protocol_version.as_ref())?
            .unwrap_or_default()
            .max(self.defaults.minimum_tls_version);
        let max_tls_version = parse_version("maximum", tls.maximum_protocol_version.as_ref())?;
        if let Some(max) = max_tls_version.filter(|max| *max < min_tls_version) {
            return Err(Invalid(
                Reason::TlsVersionNotValid,
                format!("maximum TLS version {max} is below the minimum {min_tls_version}"),
            ));
        }

        let secret =
            secret::resolve_tls_secret(ctx.cache, ctx.dag, &tls.secret_name, &source.namespace)
                .map_err(|e| Invalid(e.reason(), e.to_string()))?;

        let svh = self
            .defaults
            .ensure_https_listener(ctx.dag)
            .ensure_secure_virtual_host(fqdn);
        if let Some(existing) = &svh.secret {
            if existing.id != secret.id {
                return Err(Invalid(
                    Reason::TlsConflict,
                    format!("host {fqdn:?} is already secured with secret {}", existing.id),
                ));
            }
        }
        svh.secret = Some(secret.clone());
        svh.min_tls_version = min_tls_version;
        svh.max_tls_version = max_tls_version;
        svh.tls_owner = Some(source.clone());
        Ok(secret)
    }

    fn secure_virtual_host_mut<'d>(
        &self,
        ctx: &'d mut Context<'_>,
        fqdn: &str,
    ) -> Option<&'d mut ingress_dag_core::SecureVirtualHost> {
        ctx.dag
            .listener_mut(&self.defaults.https_listener.name)?
            .secure_virtual_hosts
            .get_mut(fqdn)
    }

    fn route(
        &self,
        ctx: &mut Context<'_>,
        source: &ResourceRef,
        fqdn: &str,
        spec: &api::Route,
    ) -> Result<Route, RouteError> {
        let mut route_match = route_match(&spec.conditions)?;
        if let Some(authority) = host::wildcard_authority_match(fqdn) {
            route_match.headers.push(authority);
        }
        if spec.services.is_empty() {
            return Err(RouteError::NoServices);
        }

        let (timeout_policy, cluster_timeout_policy) = http_proxy_timeout_policy(
            spec.timeout_policy.as_ref(),
            self.defaults.response_timeout,
            self.defaults.cluster_connect_timeout(),
        )?;
        let retry_policy = spec
            .retry_policy
            .as_ref()
            .map(http_proxy_retry_policy)
            .transpose()?;
        let health_check_policy = spec
            .health_check_policy
            .as_ref()
            .map(health_check_policy)
            .transpose()?;
        let load_balancer_policy = self.load_balancer_policy(ctx, source, spec);

        let request_headers_policy = spec
            .request_headers_policy
            .as_ref()
            .map(|p| headers::headers_policy(p, Direction::Request))
            .transpose()?;
        let response_headers_policy = spec
            .response_headers_policy
            .as_ref()
            .map(|p| headers::headers_policy(p, Direction::Response))
            .transpose()?;

        let rate_limit = rate_limit_policy(
            spec.rate_limit_policy.as_ref(),
            self.defaults.rate_limit_service.as_ref(),
            false,
        );
        if let Some(error) = rate_limit.errors.into_iter().next() {
            return Err(error.into());
        }

        let client_certificate = self
            .defaults
            .client_certificate
            .as_ref()
            .map(|id| secret::resolve_client_certificate(ctx.cache, ctx.dag, id))
            .transpose()?;

        let mut route = Route::new(route_match, source.clone());
        for service in &spec.services {
            let protocol = service
                .protocol
                .as_deref()
                .map(|p| {
                    p.parse::<UpstreamProtocol>()
                        .map_err(|_| BackendError::InvalidProtocol {
                            service: ResourceId::new(&source.namespace, &service.name),
                            protocol: p.to_string(),
                        })
                })
                .transpose()?;
            let id = ResourceId::new(&source.namespace, &service.name);
            let upstream = backend::resolve_service(
                ctx.cache,
                ctx.dag,
                &self.defaults,
                &id,
                &PortRef::Number(service.port),
            )?;
            backend::report_service_annotations(ctx, source, &id);

            let mut cluster =
                backend::cluster(&self.defaults, upstream, protocol, client_certificate.clone());
            cluster.weight = service.weight.unwrap_or(0);
            cluster.load_balancer_policy = load_balancer_policy;
            cluster.health_check_policy = health_check_policy.clone();
            cluster.timeout_policy = cluster_timeout_policy;
            cluster.request_headers_policy = service
                .request_headers_policy
                .as_ref()
                .map(|p| headers::headers_policy(p, Direction::Request))
                .transpose()?;
            cluster.response_headers_policy = service
                .response_headers_policy
                .as_ref()
                .map(|p| headers::headers_policy(p, Direction::Response))
                .transpose()?;
            route.clusters.push(cluster);
        }

        route.websocket = spec.enable_websockets.unwrap_or(false);
        route.timeout_policy = timeout_policy;
        route.retry_policy = retry_policy;
        route.request_headers_policy = headers::merge(
            self.defaults.request_headers_policy.as_ref(),
            request_headers_policy,
        );
        route.response_headers_policy = headers::merge(
            self.defaults.response_headers_policy.as_ref(),
            response_headers_policy,
        );
        route.rate_limit_policy = rate_limit.value;
        if self.defaults.set_source_metadata_on_routes {
            route.metadata = Some(source.clone());
        }
        Ok(route)
    }

    /// Unknown strategies fall back to round robin with a warning.
    fn load_balancer_policy(
        &self,
        ctx: &mut Context<'_>,
        source: &ResourceRef,
        spec: &api::Route,
    ) -> LoadBalancerPolicy {
        let Some(strategy) = spec
            .load_balancer_policy
            .as_ref()
            .and_then(|p| p.strategy.as_deref())
        else {
            return LoadBalancerPolicy::default();
        };
        strategy.parse().unwrap_or_else(|error| {
            ctx.statuses.warning(
                source,
                Reason::LoadBalancerPolicyNotValid,
                format!("load balancer strategy {error}; using RoundRobin"),
            );
            LoadBalancerPolicy::default()
        })
    }
}

impl Processor for HttpProxyProcessor {
    fn name(&self) -> &'static str {
        "httpproxy"
    }

    fn run(&self, ctx: &mut Context<'_>) {
        let mut fqdns = BTreeMap::new();
        for proxy in ctx.cache.http_proxies() {
            let _span = tracing::debug_span!(
                "httpproxy",
                ns = proxy.metadata.namespace.as_deref().unwrap_or_default(),
                name = proxy.metadata.name.as_deref().unwrap_or_default(),
            )
            .entered();
            if let Err(Invalid(reason, message)) = self.process(ctx, &mut fqdns, &proxy) {
                tracing::warn!(%reason, %message, "Invalid HTTPProxy");
                let source = ResourceRef::http_proxy(
                    proxy.namespace().unwrap_or_default(),
                    proxy.name_unchecked(),
                );
                ctx.statuses.error(&source, reason, message);
            }
        }
    }
}

fn route_match(conditions: &[api::MatchCondition]) -> Result<RouteMatch, RouteError> {
    let mut path = None;
    let mut route_match = RouteMatch::path(PathMatch::prefix("/"));

    for condition in conditions {
        let paths = [&condition.prefix, &condition.exact, &condition.regex]
            .into_iter()
            .filter(|p| p.is_some())
            .count();
        if paths > 0 && (paths > 1 || path.is_some()) {
            return Err(RouteError::Condition(
                "more than one path condition specified".to_string(),
            ));
        }

        if let Some(prefix) = &condition.prefix {
            if !prefix.starts_with('/') {
                return Err(RouteError::InvalidPath(prefix.clone()));
            }
            path = Some(PathMatch::prefix(prefix.clone()));
        } else if let Some(exact) = &condition.exact {
            if !exact.starts_with('/') {
                return Err(RouteError::InvalidPath(exact.clone()));
            }
            path = Some(PathMatch::Exact(exact.clone()));
        } else if let Some(regex) = &condition.regex {
            regex::Regex::new(regex).map_err(|e| RouteError::InvalidRegex {
                path: regex.clone(),
                message: e.to_string(),
            })?;
            path = Some(PathMatch::Regex(regex.clone()));
        }

        if let Some(header) = &condition.header {
            route_match
                .headers
                .push(header_match(header).map_err(RouteError::Condition)?);
        }
        if let Some(query) = &condition.query_parameter {
            route_match
                .query_params
                .push(query_param_match(query).map_err(RouteError::Condition)?);
        }
    }

    if let Some(path) = path {
        route_match.path = path;
    }
    Ok(route_match)
}

fn query_param_match(condition: &QueryParameterMatchCondition) -> Result<QueryParamMatch, String> {
    if condition.name.is_empty() {
        return Err("query parameter condition must specify a name".to_string());
    }

    let mut kinds = vec![];
    if let Some(v) = &condition.exact {
        kinds.push(QueryParamMatchKind::Exact(v.clone()));
    }
    if let Some(v) = &condition.prefix {
        kinds.push(QueryParamMatchKind::Prefix(v.clone()));
    }
    if let Some(v) = &condition.suffix {
        kinds.push(QueryParamMatchKind::Suffix(v.clone()));
    }
    if let Some(v) = &condition.contains {
        kinds.push(QueryParamMatchKind::Contains(v.clone()));
    }
    if let Some(v) = &condition.regex {
        regex::Regex::new(v).map_err(|e| format!("invalid regex for {:?}: {e}", condition.name))?;
        kinds.push(QueryParamMatchKind::Regex(v.clone()));
    }
    if condition.present == Some(true) {
        kinds.push(QueryParamMatchKind::Present);
    }

    if kinds.len() != 1 {
        return Err(format!(
            "query parameter condition {:?} must specify exactly one match",
            condition.name
        ));
    }
    Ok(QueryParamMatch {
        name: condition.name.clone(),
        kind: kinds.remove(0),
        ignore_case: condition.ignore_case.unwrap_or(false),
    })
}

fn health_check_policy(policy: &api::HealthCheckPolicy) -> Result<HealthCheckPolicy, PolicyError> {
    if !policy.path.starts_with('/') {
        return Err(PolicyError::HealthCheck(format!(
            "path {:?} must start with \"/\"",
            policy.path
        )));
    }
    let seconds =
        |s: Option<u64>, default| s.filter(|s| *s > 0).map_or(default, Duration::from_secs);
    let count = |n: Option<u32>, default| n.filter(|n| *n > 0).unwrap_or(default);
    Ok(HealthCheckPolicy {
        path: policy.path.clone(),
        host: policy.host.clone().filter(|h| !h.is_empty()),
        interval: seconds(policy.interval_seconds, DEFAULT_HEALTH_CHECK_INTERVAL),
        timeout: seconds(policy.timeout_seconds, DEFAULT_HEALTH_CHECK_TIMEOUT),
        unhealthy_threshold: count(policy.unhealthy_threshold_count, DEFAULT_UNHEALTHY_THRESHOLD),
        healthy_threshold: count(policy.healthy_threshold_count, DEFAULT_HEALTHY_THRESHOLD),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingress_dag_core::{HeaderMatch, HeaderMatchKind};
    use ingress_dag_k8s_api::policy::HeaderMatchCondition;
    use pretty_assertions::assert_eq;

    #[test]
    fn route_match_from_conditions() {
        let conditions = vec![
            api::MatchCondition {
                prefix: Some("/api".to_string()),
                ..Default::default()
            },
            api::MatchCondition {
                header: Some(HeaderMatchCondition {
                    name: "X-Canary".to_string(),
                    exact: Some("true".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            api::MatchCondition {
                query_parameter: Some(QueryParameterMatchCondition {
                    name: "debug".to_string(),
                    present: Some(true),
                    ..Default::default()
                }),
                ..Default::default()
            },
        ];
        assert_eq!(
            route_match(&conditions),
            Ok(RouteMatch {
                path: PathMatch::prefix("/api"),
                headers: vec![HeaderMatch {
                    name: "x-canary".to_string(),
                    kind: HeaderMatchKind::Exact("true".to_string()),
                }],
                query_params: vec![QueryParamMatch {
                    name: "debug".to_string(),
                    kind: QueryParamMatchKind::Present,
                    ignore_case: false,
                }],
            })
        );
        assert_eq!(route_match(&[]), Ok(RouteMatch::path(PathMatch::prefix("/"))));
    }

    #[test]
    fn rejects_conflicting_path_conditions() {
        let conditions = vec![
            api::MatchCondition {
                prefix: Some("/a".to_string()),
                ..Default::default()
            },
            api::MatchCondition {
                exact: Some("/b".to_string()),
                ..Default::default()
            },
        ];
        assert!(matches!(
            route_match(&conditions),
            Err(RouteError::Condition(_))
        ));

        let relative = vec![api::MatchCondition {
            prefix: Some("api".to_string()),
            ..Default::default()
        }];
        assert_eq!(
            route_match(&relative),
            Err(RouteError::InvalidPath("api".to_string()))
        );

        let regex = vec![api::MatchCondition {
            regex: Some("/(unclosed".to_string()),
            ..Default::default()
        }];
        assert!(matches!(
            route_match(&regex),
            Err(RouteError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn health_check_defaults() {
        let policy = health_check_policy(&api::HealthCheckPolicy {
            path: "/healthz".to_string(),
            interval_seconds: Some(0),
            timeout_seconds: Some(1),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            policy,
            HealthCheckPolicy {
                path: "/healthz".to_string(),
                host: None,
                interval: Duration::from_secs(5),
                timeout: Duration::from_secs(1),
                unhealthy_threshold: 3,
                healthy_threshold: 2,
            }
        );

        assert!(health_check_policy(&api::HealthCheckPolicy {
            path: "healthz".to_string(),
            ..Default::default()
        })
        .is_err());
    }
}
