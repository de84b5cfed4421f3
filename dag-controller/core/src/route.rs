use crate::{
    headers::HeadersPolicy,
    ratelimit::RateLimitPolicy,
    service::Cluster,
    timeout::{RouteTimeoutPolicy, Setting},
    ResourceRef,
};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathMatch {
    /// Matches paths beginning with `prefix`. A segment prefix only matches
    /// whole path segments, so `/foo` matches `/foo/bar` but not `/foobar`.
    Prefix { prefix: String, segment: bool },
    Exact(String),

    /// A validated regular expression.
    Regex(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeaderMatch {
    /// Lower-cased header name.
    pub name: String,
    pub kind: HeaderMatchKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HeaderMatchKind {
    Present,
    NotPresent,
    Exact(String),
    NotExact(String),
    Contains(String),
    NotContains(String),
    Regex(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryParamMatch {
    pub name: String,
    pub kind: QueryParamMatchKind,
    pub ignore_case: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryParamMatchKind {
    Present,
    Exact(String),
    Prefix(String),
    Suffix(String),
    Contains(String),
    Regex(String),
}

/// Everything a request is matched against when selecting a route.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteMatch {
    pub path: PathMatch,
    pub headers: Vec<HeaderMatch>,
    pub query_params: Vec<QueryParamMatch>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RetryPolicy {
    /// Comma separated retry conditions, e.g. `5xx,gateway-error`.
    pub retry_on: String,
    pub retriable_status_codes: Vec<u32>,
    pub num_retries: u32,
    pub per_try_timeout: Setting,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    pub route_match: RouteMatch,

    /// Weighted upstreams, in declaration order.
    pub clusters: Vec<Cluster>,

    pub websocket: bool,

    /// Redirects plaintext requests to HTTPS instead of proxying them.
    pub https_upgrade: bool,

    pub timeout_policy: RouteTimeoutPolicy,
    pub retry_policy: Option<RetryPolicy>,
    pub request_headers_policy: Option<HeadersPolicy>,
    pub response_headers_policy: Option<HeadersPolicy>,
    pub rate_limit_policy: Option<RateLimitPolicy>,

    /// The resource this route was generated from. Only used to attribute
    /// validation errors.
    pub source: ResourceRef,

    /// Source metadata stamped onto the route for the proxy's benefit. Only
    /// set when the builder is configured to do so.
    pub metadata: Option<ResourceRef>,
}

// === impl PathMatch ===

impl PathMatch {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self::Prefix {
            prefix: prefix.into(),
            segment: false,
        }
    }

    pub fn segment_prefix(prefix: impl Into<String>) -> Self {
        Self::Prefix {
            prefix: prefix.into(),
            segment: true,
        }
    }
}

impl fmt::Display for PathMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prefix { prefix, .. } => write!(f, "prefix {prefix:?}"),
            Self::Exact(path) => write!(f, "exact {path:?}"),
            Self::Regex(regex) => write!(f, "regex {regex:?}"),
        }
    }
}

// === impl RouteMatch ===

impl RouteMatch {
    pub fn path(path: PathMatch) -> Self {
        Self {
            path,
            headers: vec![],
            query_params: vec![],
        }
    }

    /// Returns a copy with header and query matchers sorted, so that two
    /// matches that only differ in matcher order compare equal.
    pub fn normalized(&self) -> Self {
        let mut headers = self.headers.clone();
        headers.sort();
        headers.dedup();
        let mut query_params = self.query_params.clone();
        query_params.sort();
        query_params.dedup();
        Self {
            path: self.path.clone(),
            headers,
            query_params,
        }
    }
}

impl fmt::Display for RouteMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "path {}", self.path)?;
        if !self.headers.is_empty() {
            write!(f, " with {} header condition(s)", self.headers.len())?;
        }
        if !self.query_params.is_empty() {
            write!(
                f,
                " with {} query parameter condition(s)",
                self.query_params.len()
            )?;
        }
        Ok(())
    }
}

// === impl Route ===

impl Route {
    pub fn new(route_match: RouteMatch, source: ResourceRef) -> Self {
        Self {
            route_match,
            clusters: vec![],
            websocket: false,
            https_upgrade: false,
            timeout_policy: RouteTimeoutPolicy::default(),
            retry_policy: None,
            request_headers_policy: None,
            response_headers_policy: None,
            rate_limit_policy: None,
            source,
            metadata: None,
        }
    }
}
