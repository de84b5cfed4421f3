use std::fmt;

/// Why a resource, or part of one, was rejected.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Reason {
    /// An annotation had a malformed value and was ignored.
    AnnotationNotValid,

    /// A route has the same match conditions as an earlier route.
    DuplicateMatchConditions,

    /// An earlier root HTTPProxy already claimed the FQDN.
    DuplicateVhost,

    HeadersPolicyNotValid,
    HealthCheckPolicyNotValid,
    HostNotValid,
    LoadBalancerPolicyNotValid,
    MatchConditionNotValid,
    Orphaned,
    PathNotValid,
    RateLimitPolicyNotValid,
    RetryPolicyNotValid,

    /// A referenced secret is missing or not a valid TLS secret.
    SecretNotValid,

    /// A backend is missing, has no matching port or is otherwise unusable.
    ServiceUnresolvedReference,
    TimeoutPolicyNotValid,

    /// The host is already secured with a different secret.
    TlsConflict,

    /// The secret lives in another namespace that has not delegated it.
    TlsDelegationNotPermitted,
    TlsVersionNotValid,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnnotationNotValid => "AnnotationNotValid",
            Self::DuplicateMatchConditions => "DuplicateMatchConditions",
            Self::DuplicateVhost => "DuplicateVhost",
            Self::HeadersPolicyNotValid => "HeadersPolicyNotValid",
            Self::HealthCheckPolicyNotValid => "HealthCheckPolicyNotValid",
            Self::HostNotValid => "HostNotValid",
            Self::LoadBalancerPolicyNotValid => "LoadBalancerPolicyNotValid",
            Self::MatchConditionNotValid => "MatchConditionNotValid",
            Self::Orphaned => "Orphaned",
            Self::PathNotValid => "PathNotValid",
            Self::RateLimitPolicyNotValid => "RateLimitPolicyNotValid",
            Self::RetryPolicyNotValid => "RetryPolicyNotValid",
            Self::SecretNotValid => "SecretNotValid",
            Self::ServiceUnresolvedReference => "ServiceUnresolvedReference",
            Self::TimeoutPolicyNotValid => "TimeoutPolicyNotValid",
            Self::TlsConflict => "TLSConflict",
            Self::TlsDelegationNotPermitted => "DelegationNotPermitted",
            Self::TlsVersionNotValid => "TLSVersionNotValid",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
