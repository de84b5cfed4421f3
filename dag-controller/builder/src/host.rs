use ingress_dag_core::{HeaderMatch, HeaderMatchKind, DEFAULT_HOST};

/// Matches exactly one DNS label.
const SINGLE_LABEL: &str = "[a-z0-9]([-a-z0-9]*[a-z0-9])?";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HostError {
    #[error("host must not be empty")]
    Empty,

    #[error("host {0:?}: wildcards are only permitted as the leftmost label")]
    Wildcard(String),
}

/// Validates a virtual host name. A single leading `*.` label is the only
/// wildcard accepted.
pub fn validate(host: &str) -> Result<(), HostError> {
    if host.is_empty() {
        return Err(HostError::Empty);
    }
    if host == DEFAULT_HOST {
        return Ok(());
    }
    let rest = host.strip_prefix("*.").unwrap_or(host);
    if rest.is_empty() || rest.contains('*') {
        return Err(HostError::Wildcard(host.to_string()));
    }
    Ok(())
}

/// Restricts a wildcard host to a single label, so that `*.example.com`
/// matches `foo.example.com` but not `foo.bar.example.com`. The authority may
/// carry a port.
pub fn wildcard_authority_match(host: &str) -> Option<HeaderMatch> {
    let suffix = host.strip_prefix('*')?;
    Some(HeaderMatch {
        name: ":authority".to_string(),
        kind: HeaderMatchKind::Regex(format!(
            "^{SINGLE_LABEL}{}(:[0-9]+)?$",
            regex::escape(suffix)
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::default("*", true)]
    #[case::plain("example.com", true)]
    #[case::wildcard("*.example.com", true)]
    #[case::empty("", false)]
    #[case::inner("foo.*.example.com", false)]
    #[case::partial("*foo.example.com", false)]
    #[case::double("*.*.example.com", false)]
    #[case::bare("*.", false)]
    fn host_validation(#[case] host: &str, #[case] valid: bool) {
        assert_eq!(validate(host).is_ok(), valid, "{host}");
    }

    #[test]
    fn wildcard_matches_one_label() {
        let HeaderMatch { name, kind } = wildcard_authority_match("*.example.com").unwrap();
        assert_eq!(name, ":authority");
        let HeaderMatchKind::Regex(re) = kind else {
            panic!("expected a regex match");
        };
        let re = regex::Regex::new(&re).unwrap();
        assert!(re.is_match("foo.example.com"));
        assert!(re.is_match("foo.example.com:8443"));
        assert!(!re.is_match("foo.bar.example.com"));
        assert!(!re.is_match("fooexample.com"));

        assert_eq!(wildcard_authority_match("example.com"), None);
    }
}
