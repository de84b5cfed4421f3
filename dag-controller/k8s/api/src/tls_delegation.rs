use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Grants resources in other namespaces permission to reference TLS secrets
/// in this namespace.
#[derive(
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    kube::CustomResource,
    Deserialize,
    Serialize,
    JsonSchema,
)]
#[kube(
    group = "projectcontour.io",
    version = "v1",
    kind = "TLSCertificateDelegation",
    root = "TlsCertificateDelegation",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct TlsCertificateDelegationSpec {
    pub delegations: Vec<CertificateDelegation>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateDelegation {
    pub secret_name: String,

    /// Namespaces permitted to use the secret; `*` permits all.
    pub target_namespaces: Vec<String>,
}

impl CertificateDelegation {
    pub fn permits(&self, namespace: &str) -> bool {
        self.target_namespaces
            .iter()
            .any(|ns| ns == "*" || ns == namespace)
    }
}
