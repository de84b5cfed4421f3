use std::collections::BTreeMap;

/// Header mutations applied to requests or responses.
///
/// Header names are stored lower-cased; `set` is keyed by name so a header
/// can only be set once.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct HeadersPolicy {
    pub set: BTreeMap<String, String>,
    pub remove: Vec<String>,

    /// Rewrites the `Host` header of the upstream request.
    pub host_rewrite: Option<String>,
}

impl HeadersPolicy {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty() && self.host_rewrite.is_none()
    }

    /// Layers `local` over `self`: headers set locally win, removals are
    /// unioned, and a local host rewrite replaces an inherited one.
    pub fn merge(&self, local: &HeadersPolicy) -> HeadersPolicy {
        let mut merged = self.clone();
        merged
            .set
            .extend(local.set.iter().map(|(k, v)| (k.clone(), v.clone())));
        for name in &local.remove {
            if !merged.remove.contains(name) {
                merged.remove.push(name.clone());
            }
        }
        if local.host_rewrite.is_some() {
            merged.host_rewrite = local.host_rewrite.clone();
        }
        merged
    }
}
