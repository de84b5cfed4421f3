use crate::{
    annotation::IngressAnnotations,
    backend::{self, PortRef},
    config::Defaults,
    error::{BackendError, Degraded, RouteError},
    host,
    processor::{Context, Processor},
    resolve::{ratelimit::rate_limit_policy, retry::ingress_retry_policy, timeout},
    secret,
};
use ingress_dag_core::{
    timeout::RouteTimeoutPolicy, PathMatch, ResourceId, ResourceRef, Route, RouteMatch, Secret,
    Service, DEFAULT_HOST,
};
use ingress_dag_k8s_api::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule, IngressTLS,
    ResourceExt,
};
use ingress_dag_k8s_status::Reason;
use std::sync::Arc;

/// Characters that make an `ImplementationSpecific` path a regular
/// expression.
const REGEX_CHARS: &[char] = &['^', '+', '*', '[', ']', '%'];

/// Translates Ingresses into routes.
#[derive(Clone, Debug)]
pub struct IngressProcessor {
    defaults: Arc<Defaults>,
}

/// Returns the paths of an Ingress rule, in declaration order.
pub fn http_paths(rule: &IngressRule) -> &[HTTPIngressPath] {
    rule.http.as_ref().map_or(&[], |http| http.paths.as_slice())
}

/// Returns the rules of an Ingress. A default backend is treated as a
/// trailing catch-all rule.
pub fn rules(ingress: &Ingress) -> Vec<IngressRule> {
    let Some(spec) = ingress.spec.as_ref() else {
        return vec![];
    };
    let mut rules = spec.rules.clone().unwrap_or_default();
    if let Some(backend) = spec.default_backend.as_ref() {
        rules.push(IngressRule {
            host: None,
            http: Some(HTTPIngressRuleValue {
                paths: vec![HTTPIngressPath {
                    backend: backend.clone(),
                    path: None,
                    path_type: "ImplementationSpecific".to_string(),
                }],
            }),
        });
    }
    rules
}

/// Converts an Ingress path into a path match.
pub fn path_match(path: Option<&str>, path_type: &str) -> Result<PathMatch, RouteError> {
    let path = path.filter(|p| !p.is_empty()).unwrap_or("/");
    match path_type {
        "Prefix" => {
            if !path.starts_with('/') {
                return Err(RouteError::InvalidPath(path.to_string()));
            }
            match path.trim_end_matches('/') {
                "" => Ok(PathMatch::prefix("/")),
                prefix => Ok(PathMatch::segment_prefix(prefix)),
            }
        }
        "Exact" => {
            if !path.starts_with('/') {
                return Err(RouteError::InvalidPath(path.to_string()));
            }
            Ok(PathMatch::Exact(path.to_string()))
        }
        "" | "ImplementationSpecific" => {
            if path.contains(REGEX_CHARS) {
                regex::Regex::new(path).map_err(|e| RouteError::InvalidRegex {
                    path: path.to_string(),
                    message: e.to_string(),
                })?;
                return Ok(PathMatch::Regex(path.to_string()));
            }
            Ok(PathMatch::prefix(path))
        }
        other => Err(RouteError::UnknownPathType(other.to_string())),
    }
}

// === impl IngressProcessor ===

impl IngressProcessor {
    pub fn new(defaults: Arc<Defaults>) -> Self {
        Self { defaults }
    }

    pub fn ingress_timeout_policy(&self, annotations: &IngressAnnotations) -> RouteTimeoutPolicy {
        timeout::route_timeout_policy(&annotations.timeouts, self.defaults.response_timeout)
    }

    /// Builds the route for one Ingress path.
    ///
    /// Fails only if no route can be built at all. Malformed policies are
    /// left out of the route and returned alongside it.
    pub fn route(
        &self,
        source: &ResourceRef,
        annotations: &IngressAnnotations,
        host: &str,
        path: &HTTPIngressPath,
        upstream: Arc<Service>,
        client_certificate: Option<Arc<Secret>>,
    ) -> Result<Degraded<Route>, RouteError> {
        let mut route_match = RouteMatch::path(path_match(path.path.as_deref(), &path.path_type)?);
        if let Some(authority) = host::wildcard_authority_match(host) {
            route_match.headers.push(authority);
        }

        let mut route = Route::new(route_match, source.clone());
        route
            .clusters
            .push(backend::cluster(&self.defaults, upstream, None, client_certificate));
        route.websocket = annotations
            .websocket_routes
            .contains(path.path.as_deref().filter(|p| !p.is_empty()).unwrap_or("/"));
        route.https_upgrade = annotations.force_ssl_redirect;
        route.timeout_policy = self.ingress_timeout_policy(annotations);
        route.retry_policy = ingress_retry_policy(annotations);
        route.request_headers_policy = self.defaults.request_headers_policy.clone();
        route.response_headers_policy = self.defaults.response_headers_policy.clone();
        if self.defaults.set_source_metadata_on_routes {
            route.metadata = Some(source.clone());
        }

        let rate_limit = rate_limit_policy(None, self.defaults.rate_limit_service.as_ref(), true);
        Ok(rate_limit.map(|policy| {
            route.rate_limit_policy = policy;
            route
        }))
    }

    fn process(&self, ctx: &mut Context<'_>, ingress: &Ingress) {
        let namespace = ingress.namespace().unwrap_or_default();
        let source = ResourceRef::ingress(&namespace, ingress.name_unchecked());
        ctx.statuses.entry(&source).generation = ingress.metadata.generation;

        let (annotations, diagnostics) = IngressAnnotations::parse(&ingress.metadata);
        for diagnostic in diagnostics {
            tracing::warn!(%diagnostic, "Invalid annotation");
            ctx.statuses.warning(&source, Reason::AnnotationNotValid, diagnostic);
        }

        for tls in ingress.spec.iter().flat_map(|s| s.tls.iter().flatten()) {
            self.secure_hosts(ctx, &source, &annotations, tls);
        }

        for rule in rules(ingress) {
            let host = rule
                .host
                .as_deref()
                .filter(|h| !h.is_empty())
                .unwrap_or(DEFAULT_HOST);
            if let Err(error) = host::validate(host) {
                tracing::warn!(%error, "Skipping rule");
                ctx.statuses.error(&source, Reason::HostNotValid, error);
                continue;
            }

            for path in http_paths(&rule) {
                if let Some(route) = self.build_route(ctx, &source, &annotations, host, path) {
                    self.attach(ctx, &annotations, host, route);
                }
            }
        }
    }

    /// Resolves the TLS secret of an Ingress and claims its hosts.
    fn secure_hosts(
        &self,
        ctx: &mut Context<'_>,
        source: &ResourceRef,
        annotations: &IngressAnnotations,
        tls: &IngressTLS,
    ) {
        let Some(secret_name) = tls.secret_name.as_deref().filter(|s| !s.is_empty()) else {
            tracing::debug!("TLS entry does not reference a secret");
            return;
        };
        let secret = match secret::resolve_tls_secret(
            ctx.cache,
            ctx.dag,
            secret_name,
            &source.namespace,
        ) {
            Ok(secret) => secret,
            Err(error) => {
                tracing::warn!(%error, "Invalid TLS secret");
                ctx.statuses.error(source, error.reason(), error);
                return;
            }
        };

        let min_tls_version = annotations
            .tls_minimum_protocol_version
            .unwrap_or_default()
            .max(self.defaults.minimum_tls_version);
        let max_tls_version = match annotations.tls_maximum_protocol_version {
            Some(max) if max < min_tls_version => {
                ctx.statuses.warning(
                    source,
                    Reason::TlsVersionNotValid,
                    format!("maximum TLS version {max} is below the minimum {min_tls_version}"),
                );
                None
            }
            max => max,
        };

        for host in tls.hosts.iter().flatten() {
            if host == DEFAULT_HOST || host::validate(host).is_err() {
                ctx.statuses.error(
                    source,
                    Reason::HostNotValid,
                    format!("invalid TLS host {host:?}"),
                );
                continue;
            }

            let svh = self
                .defaults
                .ensure_https_listener(ctx.dag)
                .ensure_secure_virtual_host(host);
            if let Some(existing) = &svh.secret {
                if existing.id != secret.id {
                    tracing::warn!(
                        %host,
                        secret = %secret.id,
                        "TLS host already secured by another secret"
                    );
                    ctx.statuses.error(
                        source,
                        Reason::TlsConflict,
                        format!("host {host:?} is already secured with secret {}", existing.id),
                    );
                }
                continue;
            }
            svh.secret = Some(secret.clone());
            svh.min_tls_version = min_tls_version;
            svh.max_tls_version = max_tls_version;
            svh.tls_owner = Some(source.clone());
        }
    }

    fn build_route(
        &self,
        ctx: &mut Context<'_>,
        source: &ResourceRef,
        annotations: &IngressAnnotations,
        host: &str,
        path: &HTTPIngressPath,
    ) -> Option<Route> {
        let upstream = match self.upstream(ctx, source, &path.backend) {
            Ok(upstream) => upstream,
            Err(error) => {
                tracing::warn!(%error, "Unresolved backend");
                let error = RouteError::from(error);
                ctx.statuses.error(source, error.reason(), error);
                return None;
            }
        };

        let client_certificate = match &self.defaults.client_certificate {
            None => None,
            Some(id) => match secret::resolve_client_certificate(ctx.cache, ctx.dag, id) {
                Ok(secret) => Some(secret),
                Err(error) => {
                    tracing::warn!(%error, "Invalid client certificate");
                    ctx.statuses.error(source, error.reason(), error);
                    return None;
                }
            },
        };

        match self.route(source, annotations, host, path, upstream, client_certificate) {
            Ok(route) if !route.is_degraded() => Some(route.value),
            Ok(Degraded { errors, .. }) => {
                for error in errors {
                    tracing::warn!(%error, "Dropping route");
                    ctx.statuses.error(source, error.reason(), error);
                }
                None
            }
            Err(error) => {
                tracing::warn!(%error, "Invalid route");
                ctx.statuses.error(source, error.reason(), error);
                None
            }
        }
    }

    fn upstream(
        &self,
        ctx: &mut Context<'_>,
        source: &ResourceRef,
        backend: &IngressBackend,
    ) -> Result<Arc<Service>, BackendError> {
        if backend.resource.is_some() {
            return Err(BackendError::ResourceBackend);
        }
        let service = backend
            .service
            .as_ref()
            .ok_or(BackendError::MissingService)?;
        let port = PortRef::from_backend(service.port.as_ref())?;
        let id = ResourceId::new(&source.namespace, &service.name);
        let upstream = backend::resolve_service(ctx.cache, ctx.dag, &self.defaults, &id, &port)?;
        backend::report_service_annotations(ctx, source, &id);
        Ok(upstream)
    }

    fn attach(
        &self,
        ctx: &mut Context<'_>,
        annotations: &IngressAnnotations,
        host: &str,
        route: Route,
    ) {
        if host != DEFAULT_HOST {
            let listener = ctx.dag.listener_mut(&self.defaults.https_listener.name);
            if let Some(svh) = listener.and_then(|l| l.secure_virtual_hosts.get_mut(host)) {
                let mut secure = route.clone();
                secure.https_upgrade = false;
                svh.virtual_host.add_route(secure);
            }
        }

        if annotations.allow_http || annotations.force_ssl_redirect {
            self.defaults
                .ensure_http_listener(ctx.dag)
                .ensure_virtual_host(host)
                .add_route(route);
        }
    }
}

impl Processor for IngressProcessor {
    fn name(&self) -> &'static str {
        "ingress"
    }

    fn run(&self, ctx: &mut Context<'_>) {
        for ingress in ctx.cache.ingresses() {
            let _span = tracing::debug_span!(
                "ingress",
                ns = ingress.metadata.namespace.as_deref().unwrap_or_default(),
                name = ingress.metadata.name.as_deref().unwrap_or_default(),
            )
            .entered();
            self.process(ctx, &ingress);
        }
    }
}
