use ingress_dag_core::ResourceId;
use ingress_dag_k8s_status::Reason;

/// A route could not be constructed at all.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RouteError {
    #[error("path {path:?} is not a valid regular expression: {message}")]
    InvalidRegex { path: String, message: String },

    #[error("path {0:?} must start with \"/\"")]
    InvalidPath(String),

    #[error("unknown path type {0:?}")]
    UnknownPathType(String),

    #[error("invalid match condition: {0}")]
    Condition(String),

    #[error("route must specify at least one service")]
    NoServices,

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// A backend reference could not be resolved.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum BackendError {
    #[error("resource backends are not supported")]
    ResourceBackend,

    #[error("backend does not specify a service")]
    MissingService,

    #[error("backend does not specify a service port")]
    MissingPort,

    #[error("service {0} not found")]
    NotFound(ResourceId),

    #[error("service {service} has no port {port}")]
    PortNotFound { service: ResourceId, port: String },

    #[error("service {0} is an ExternalName service, which is not enabled")]
    ExternalNameDisabled(ResourceId),

    #[error("service {0} is an ExternalName service that points to localhost")]
    ExternalNameLocalhost(ResourceId),

    #[error("invalid protocol {protocol:?} for service {service}")]
    InvalidProtocol { service: ResourceId, protocol: String },
}

/// A policy payload is malformed.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum PolicyError {
    #[error("invalid rate limit policy: {0}")]
    RateLimit(String),

    #[error("invalid headers policy: {0}")]
    Headers(String),

    #[error("invalid timeout policy: {0}")]
    Timeout(String),

    #[error("invalid retry policy: {0}")]
    Retry(String),

    #[error("invalid health check policy: {0}")]
    HealthCheck(String),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SecretError {
    #[error("secret {0} not found")]
    NotFound(ResourceId),

    #[error("secret {id} is of type {type_:?}, not kubernetes.io/tls")]
    NotTls { id: ResourceId, type_: String },

    #[error("secret {id} is missing {key}")]
    MissingKey { id: ResourceId, key: &'static str },

    #[error("secret {id} has an invalid certificate: {message}")]
    InvalidCertificate { id: ResourceId, message: String },

    #[error("secret {id} has an invalid private key: {message}")]
    InvalidKey { id: ResourceId, message: String },

    #[error("secret {secret} is not delegated to namespace {namespace}")]
    NotDelegated { secret: ResourceId, namespace: String },
}

/// A value that was constructed despite problems with parts of its input.
///
/// The malformed parts are left out of `value`; `errors` explains what was
/// dropped so that the caller can decide whether to use the value at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Degraded<T> {
    pub value: T,
    pub errors: Vec<PolicyError>,
}

// === impl RouteError ===

impl RouteError {
    pub fn reason(&self) -> Reason {
        match self {
            Self::InvalidRegex { .. } | Self::InvalidPath(_) | Self::UnknownPathType(_) => {
                Reason::PathNotValid
            }
            Self::Condition(_) => Reason::MatchConditionNotValid,
            Self::NoServices | Self::Backend(_) => Reason::ServiceUnresolvedReference,
            Self::Secret(e) => e.reason(),
            Self::Policy(e) => e.reason(),
        }
    }
}

// === impl PolicyError ===

impl PolicyError {
    pub fn reason(&self) -> Reason {
        match self {
            Self::RateLimit(_) => Reason::RateLimitPolicyNotValid,
            Self::Headers(_) => Reason::HeadersPolicyNotValid,
            Self::Timeout(_) => Reason::TimeoutPolicyNotValid,
            Self::Retry(_) => Reason::RetryPolicyNotValid,
            Self::HealthCheck(_) => Reason::HealthCheckPolicyNotValid,
        }
    }
}

// === impl SecretError ===

impl SecretError {
    pub fn reason(&self) -> Reason {
        match self {
            Self::NotDelegated { .. } => Reason::TlsDelegationNotPermitted,
            _ => Reason::SecretNotValid,
        }
    }
}

// === impl Degraded ===

impl<T> Degraded<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            errors: vec![],
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Degraded<U> {
        Degraded {
            value: f(self.value),
            errors: self.errors,
        }
    }
}
