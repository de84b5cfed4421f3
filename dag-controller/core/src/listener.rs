use crate::{ratelimit::RateLimitPolicy, route::Route, secret::Secret, ResourceRef, UnknownVariant};
use std::{collections::BTreeMap, fmt, str::FromStr, sync::Arc};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ListenerProtocol {
    Http,
    Https,
}

/// A bind address and the virtual hosts served on it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Listener {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub protocol: ListenerProtocol,

    /// Plaintext virtual hosts, keyed by hostname.
    pub virtual_hosts: BTreeMap<String, VirtualHost>,

    /// TLS-terminating virtual hosts, keyed by hostname.
    pub secure_virtual_hosts: BTreeMap<String, SecureVirtualHost>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VirtualHost {
    pub name: String,

    /// Routes in the order they were discovered.
    pub routes: Vec<Route>,
    pub rate_limit_policy: Option<RateLimitPolicy>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecureVirtualHost {
    pub virtual_host: VirtualHost,
    pub secret: Option<Arc<Secret>>,
    pub min_tls_version: TlsVersion,
    pub max_tls_version: Option<TlsVersion>,

    /// The resource that declared TLS for this host.
    pub tls_owner: Option<ResourceRef>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TlsVersion {
    #[default]
    V1_2,
    V1_3,
}

// === impl Listener ===

impl Listener {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        port: u16,
        protocol: ListenerProtocol,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port,
            protocol,
            virtual_hosts: BTreeMap::new(),
            secure_virtual_hosts: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.virtual_hosts.is_empty() && self.secure_virtual_hosts.is_empty()
    }

    pub fn ensure_virtual_host(&mut self, host: &str) -> &mut VirtualHost {
        self.virtual_hosts
            .entry(host.to_string())
            .or_insert_with(|| VirtualHost::new(host))
    }

    pub fn ensure_secure_virtual_host(&mut self, host: &str) -> &mut SecureVirtualHost {
        self.secure_virtual_hosts
            .entry(host.to_string())
            .or_insert_with(|| SecureVirtualHost::new(host))
    }

    /// Iterates over all virtual hosts, secure or not.
    pub fn all_virtual_hosts(&self) -> impl Iterator<Item = &VirtualHost> {
        self.virtual_hosts
            .values()
            .chain(self.secure_virtual_hosts.values().map(|s| &s.virtual_host))
    }
}

// === impl VirtualHost ===

impl VirtualHost {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            routes: vec![],
            rate_limit_policy: None,
        }
    }

    pub fn add_route(&mut self, route: Route) {
        self.routes.push(route);
    }
}

// === impl SecureVirtualHost ===

impl SecureVirtualHost {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            virtual_host: VirtualHost::new(name),
            secret: None,
            min_tls_version: TlsVersion::default(),
            max_tls_version: None,
            tls_owner: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.virtual_host.name
    }
}

// === impl TlsVersion ===

impl FromStr for TlsVersion {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1.2" => Ok(Self::V1_2),
            "1.3" => Ok(Self::V1_3),
            s => Err(UnknownVariant(s.to_string())),
        }
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1_2 => f.write_str("1.2"),
            Self::V1_3 => f.write_str("1.3"),
        }
    }
}
