use crate::error::SecretError;
use ingress_dag_core::{Dag, ResourceId, Secret};
use ingress_dag_k8s_cache::Cache;
use std::sync::Arc;
use x509_parser::pem::Pem;

const TLS_SECRET_TYPE: &str = "kubernetes.io/tls";
const TLS_CERT_KEY: &str = "tls.crt";
const TLS_PRIVATE_KEY_KEY: &str = "tls.key";

/// Resolves a TLS secret referenced from a resource in `namespace`.
///
/// `reference` is either `name` or `namespace/name`. Secrets in another
/// namespace must be delegated to `namespace`.
pub(crate) fn resolve_tls_secret(
    cache: &Cache,
    dag: &mut Dag,
    reference: &str,
    namespace: &str,
) -> Result<Arc<Secret>, SecretError> {
    let id = ResourceId::parse_ref(reference, namespace);
    if !cache.delegation_permits(&id, namespace) {
        return Err(SecretError::NotDelegated {
            secret: id,
            namespace: namespace.to_string(),
        });
    }
    load(cache, dag, id)
}

/// Resolves the process-wide upstream client certificate. It is configured
/// by the operator, so no delegation is required.
pub(crate) fn resolve_client_certificate(
    cache: &Cache,
    dag: &mut Dag,
    id: &ResourceId,
) -> Result<Arc<Secret>, SecretError> {
    load(cache, dag, id.clone())
}

fn load(cache: &Cache, dag: &mut Dag, id: ResourceId) -> Result<Arc<Secret>, SecretError> {
    if let Some(secret) = dag.secret(&id) {
        return Ok(secret.clone());
    }

    let secret = cache
        .secret(&id)
        .ok_or_else(|| SecretError::NotFound(id.clone()))?;

    let type_ = secret.type_.as_deref().unwrap_or("Opaque");
    if type_ != TLS_SECRET_TYPE {
        return Err(SecretError::NotTls {
            id,
            type_: type_.to_string(),
        });
    }

    let data = |key: &'static str| {
        secret
            .data
            .as_ref()
            .and_then(|d| d.get(key))
            .map(|b| b.0.clone())
            .filter(|b| !b.is_empty())
            .ok_or_else(|| SecretError::MissingKey {
                id: id.clone(),
                key,
            })
    };
    let certificate_chain = data(TLS_CERT_KEY)?;
    let private_key = data(TLS_PRIVATE_KEY_KEY)?;

    validate_certificates(&certificate_chain).map_err(|message| {
        SecretError::InvalidCertificate {
            id: id.clone(),
            message,
        }
    })?;
    validate_private_key(&private_key).map_err(|message| SecretError::InvalidKey {
        id: id.clone(),
        message,
    })?;

    Ok(dag.intern_secret(Secret {
        id,
        certificate_chain,
        private_key,
    }))
}

/// Checks that `pem` holds at least one certificate and that every
/// certificate block parses.
fn validate_certificates(pem: &[u8]) -> Result<(), String> {
    let mut found = 0;
    for block in Pem::iter_from_buffer(pem) {
        let block = block.map_err(|e| e.to_string())?;
        if block.label != "CERTIFICATE" {
            continue;
        }
        block.parse_x509().map_err(|e| e.to_string())?;
        found += 1;
    }
    if found == 0 {
        return Err("no PEM certificate found".to_string());
    }
    Ok(())
}

fn validate_private_key(pem: &[u8]) -> Result<(), String> {
    for block in Pem::iter_from_buffer(pem) {
        let block = block.map_err(|e| e.to_string())?;
        if block.label.ends_with("PRIVATE KEY") {
            if block.contents.is_empty() {
                return Err("empty private key".to_string());
            }
            return Ok(());
        }
    }
    Err("no PEM private key found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{mk_delegation, mk_secret, mk_tls_secret};
    use kubert::index::IndexNamespacedResource;
    use pretty_assertions::assert_eq;

    #[test]
    fn loads_and_interns_tls_secrets() {
        let mut cache = Cache::default();
        cache.apply(mk_tls_secret("default", "cert"));
        let mut dag = Dag::default();

        let a = resolve_tls_secret(&cache, &mut dag, "cert", "default").unwrap();
        let b = resolve_tls_secret(&cache, &mut dag, "default/cert", "default").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(dag.secrets.len(), 1);
    }

    #[test]
    fn rejects_invalid_secrets() {
        let mut cache = Cache::default();
        cache.apply(mk_secret("default", "opaque", "Opaque", b"", b""));
        cache.apply(mk_secret(
            "default",
            "garbage",
            TLS_SECRET_TYPE,
            b"not a cert",
            b"not a key",
        ));
        cache.apply(mk_secret("default", "empty", TLS_SECRET_TYPE, b"", b""));
        let mut dag = Dag::default();

        assert_eq!(
            resolve_tls_secret(&cache, &mut dag, "missing", "default"),
            Err(SecretError::NotFound(ResourceId::new("default", "missing")))
        );
        assert_eq!(
            resolve_tls_secret(&cache, &mut dag, "opaque", "default"),
            Err(SecretError::NotTls {
                id: ResourceId::new("default", "opaque"),
                type_: "Opaque".to_string(),
            })
        );
        assert!(matches!(
            resolve_tls_secret(&cache, &mut dag, "garbage", "default"),
            Err(SecretError::InvalidCertificate { .. })
        ));
        assert_eq!(
            resolve_tls_secret(&cache, &mut dag, "empty", "default"),
            Err(SecretError::MissingKey {
                id: ResourceId::new("default", "empty"),
                key: TLS_CERT_KEY,
            })
        );
        assert!(dag.secrets.is_empty());
    }

    #[test]
    fn certificate_without_key_is_invalid() {
        let valid = mk_tls_secret("default", "valid");
        let crt = valid.data.as_ref().unwrap()[TLS_CERT_KEY].0.clone();
        let mut cache = Cache::default();
        cache.apply(mk_secret("default", "keyless", TLS_SECRET_TYPE, &crt, b"garbage"));
        let mut dag = Dag::default();

        assert!(matches!(
            resolve_tls_secret(&cache, &mut dag, "keyless", "default"),
            Err(SecretError::InvalidKey { .. })
        ));
    }

    #[test]
    fn cross_namespace_secrets_require_delegation() {
        let mut cache = Cache::default();
        cache.apply(mk_tls_secret("certs", "wildcard"));
        cache.apply(mk_delegation("certs", "wildcard", &["team-a"]));
        let mut dag = Dag::default();

        assert!(resolve_tls_secret(&cache, &mut dag, "certs/wildcard", "team-a").is_ok());
        assert_eq!(
            resolve_tls_secret(&cache, &mut dag, "certs/wildcard", "team-b"),
            Err(SecretError::NotDelegated {
                secret: ResourceId::new("certs", "wildcard"),
                namespace: "team-b".to_string(),
            })
        );

        let client =
            resolve_client_certificate(&cache, &mut dag, &ResourceId::new("certs", "wildcard"));
        assert!(client.is_ok());
    }
}
