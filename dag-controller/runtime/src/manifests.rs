//! Loads Kubernetes manifests into a resource cache.
//!
//! Files may hold several YAML documents and `List` objects. Resources of
//! kinds the builder does not read are skipped; resources without a
//! namespace are placed in `default`, as `kubectl apply` would.

use crate::cache::Cache;
use crate::k8s::{
    ByteString, HttpProxy, Ingress, ObjectMeta, Secret, Service, TlsCertificateDelegation,
};
use kubert::index::IndexNamespacedResource;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: document {document}: {source}", path.display())]
    Parse {
        path: PathBuf,
        document: usize,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Counts of the resources seen while loading.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Loaded {
    pub applied: usize,
    pub skipped: usize,
}

/// Loads every manifest in `paths` into a new cache. Directories are read
/// one level deep, in file name order, and only `.yaml`, `.yml` and `.json`
/// files are considered.
pub fn load(
    ingress_classes: Vec<String>,
    paths: &[PathBuf],
) -> Result<(Cache, Loaded), ManifestError> {
    let mut cache = Cache::new(ingress_classes);
    let mut loaded = Loaded::default();
    for path in paths {
        for file in files(path)? {
            let yaml = fs::read_to_string(&file).map_err(|source| ManifestError::Read {
                path: file.clone(),
                source,
            })?;
            let counts = load_str(&mut cache, &file, &yaml)?;
            tracing::debug!(
                file = %file.display(),
                applied = counts.applied,
                skipped = counts.skipped,
                "Loaded manifest"
            );
            loaded.applied += counts.applied;
            loaded.skipped += counts.skipped;
        }
    }
    Ok((cache, loaded))
}

/// Applies the documents in `yaml` to `cache`. `path` is only used in
/// errors.
pub fn load_str(cache: &mut Cache, path: &Path, yaml: &str) -> Result<Loaded, ManifestError> {
    let mut loaded = Loaded::default();
    for (document, de) in serde_yaml::Deserializer::from_str(yaml).enumerate() {
        let parse = |source| ManifestError::Parse {
            path: path.to_path_buf(),
            document,
            source,
        };
        let value = serde_yaml::Value::deserialize(de).map_err(parse)?;
        apply(cache, value, &mut loaded).map_err(parse)?;
    }
    Ok(loaded)
}

fn files(path: &Path) -> Result<Vec<PathBuf>, ManifestError> {
    let read_err = |source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    };
    if !fs::metadata(path).map_err(read_err)?.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = fs::read_dir(path)
        .map_err(read_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_err)?;
    files.retain(|f| {
        f.is_file()
            && matches!(
                f.extension().and_then(|e| e.to_str()),
                Some("yaml" | "yml" | "json")
            )
    });
    files.sort();
    Ok(files)
}

fn apply(
    cache: &mut Cache,
    value: serde_yaml::Value,
    loaded: &mut Loaded,
) -> Result<(), serde_yaml::Error> {
    if value.is_null() {
        return Ok(());
    }

    let kind = value
        .get("kind")
        .and_then(serde_yaml::Value::as_str)
        .unwrap_or_default()
        .to_string();
    match kind.as_str() {
        "List" => {
            let items = value
                .get("items")
                .and_then(serde_yaml::Value::as_sequence)
                .cloned()
                .unwrap_or_default();
            for item in items {
                apply(cache, item, loaded)?;
            }
            return Ok(());
        }
        "Ingress" => {
            let mut ingress = serde_yaml::from_value::<Ingress>(value)?;
            default_namespace(&mut ingress.metadata);
            cache.apply(ingress);
        }
        "HTTPProxy" => {
            let mut proxy = serde_yaml::from_value::<HttpProxy>(value)?;
            default_namespace(&mut proxy.metadata);
            cache.apply(proxy);
        }
        "Service" => {
            let mut service = serde_yaml::from_value::<Service>(value)?;
            default_namespace(&mut service.metadata);
            cache.apply(service);
        }
        "Secret" => {
            let mut secret = serde_yaml::from_value::<Secret>(value)?;
            default_namespace(&mut secret.metadata);
            merge_string_data(&mut secret);
            cache.apply(secret);
        }
        "TLSCertificateDelegation" => {
            let mut delegation = serde_yaml::from_value::<TlsCertificateDelegation>(value)?;
            default_namespace(&mut delegation.metadata);
            cache.apply(delegation);
        }
        kind => {
            tracing::debug!(%kind, "Skipping unsupported resource");
            loaded.skipped += 1;
            return Ok(());
        }
    }
    loaded.applied += 1;
    Ok(())
}

fn default_namespace(meta: &mut ObjectMeta) {
    if meta.namespace.as_deref().unwrap_or_default().is_empty() {
        meta.namespace = Some(DEFAULT_NAMESPACE.to_string());
    }
}

/// Folds `stringData` into `data`, with `stringData` taking precedence.
fn merge_string_data(secret: &mut Secret) {
    let Some(string_data) = secret.string_data.take() else {
        return;
    };
    let data = secret.data.get_or_insert_with(Default::default);
    for (key, value) in string_data {
        data.insert(key, ByteString(value.into_bytes()));
    }
}
