//! Renders a build as JSON: the status of every processed resource and the
//! virtual hosts served on each listener.

use crate::{
    builder::Build,
    core::{Listener, Route, SecureVirtualHost, VirtualHost},
    status::{Message, ResourceStatus},
};
use serde::Serialize;
use std::io;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub resources: Vec<ResourceReport>,
    pub listeners: Vec<ListenerReport>,
    pub services: Vec<String>,
    pub secrets: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceReport {
    pub kind: &'static str,
    pub namespace: String,
    pub name: String,
    pub status: &'static str,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vhost: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerReport {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub virtual_hosts: Vec<VirtualHostReport>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualHostReport {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsReport>,
    pub routes: Vec<RouteReport>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsReport {
    pub secret: Option<String>,
    pub minimum_protocol_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_protocol_version: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteReport {
    #[serde(rename = "match")]
    pub route_match: String,
    pub clusters: Vec<ClusterReport>,
    pub source: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub websocket: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub https_upgrade: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterReport {
    pub service: String,
    pub weight: u32,
    #[serde(skip_serializing_if = "is_http1")]
    pub protocol: &'static str,
}

/// Writes the report for `build` as pretty-printed JSON.
pub fn write(build: &Build, mut out: impl io::Write) -> serde_json::Result<()> {
    serde_json::to_writer_pretty(&mut out, &Report::new(build))?;
    writeln!(out).map_err(serde_json::Error::io)
}

// === impl Report ===

impl Report {
    pub fn new(build: &Build) -> Self {
        Self {
            resources: build.statuses.iter().map(ResourceReport::new).collect(),
            listeners: build.dag.listeners.values().map(ListenerReport::new).collect(),
            services: build.dag.services.keys().map(ToString::to_string).collect(),
            secrets: build.dag.secrets.keys().map(ToString::to_string).collect(),
        }
    }
}

impl ResourceReport {
    fn new(status: &ResourceStatus) -> Self {
        Self {
            kind: status.resource.kind.as_str(),
            namespace: status.resource.namespace.clone(),
            name: status.resource.name.clone(),
            status: status.validity().as_str(),
            description: status.description(),
            vhost: status.vhost.clone(),
            warnings: status.warnings.iter().map(render_message).collect(),
        }
    }
}

fn render_message(m: &Message) -> String {
    format!("{}: {}", m.reason, m.message)
}

fn is_http1(protocol: &&'static str) -> bool {
    protocol.is_empty()
}

impl ListenerReport {
    fn new(listener: &Listener) -> Self {
        let plain = listener
            .virtual_hosts
            .values()
            .map(|vhost| VirtualHostReport::new(vhost, None));
        let secure = listener
            .secure_virtual_hosts
            .values()
            .map(|svhost| {
                VirtualHostReport::new(&svhost.virtual_host, Some(TlsReport::new(svhost)))
            });
        Self {
            name: listener.name.clone(),
            address: listener.address.clone(),
            port: listener.port,
            virtual_hosts: plain.chain(secure).collect(),
        }
    }
}

impl VirtualHostReport {
    fn new(vhost: &VirtualHost, tls: Option<TlsReport>) -> Self {
        Self {
            name: vhost.name.clone(),
            tls,
            routes: vhost.routes.iter().map(RouteReport::new).collect(),
        }
    }
}

impl TlsReport {
    fn new(svhost: &SecureVirtualHost) -> Self {
        Self {
            secret: svhost.secret.as_ref().map(|s| s.id.to_string()),
            minimum_protocol_version: svhost.min_tls_version.to_string(),
            maximum_protocol_version: svhost.max_tls_version.map(|v| v.to_string()),
        }
    }
}

impl RouteReport {
    fn new(route: &Route) -> Self {
        Self {
            route_match: route.route_match.to_string(),
            clusters: route
                .clusters
                .iter()
                .map(|c| ClusterReport {
                    service: c.upstream.key.to_string(),
                    weight: c.weight,
                    protocol: c.protocol.as_str(),
                })
                .collect(),
            source: route.source.to_string(),
            websocket: route.websocket,
            https_upgrade: route.https_upgrade,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        builder::{Builder, Defaults},
        cache::Cache,
        manifests,
    };
    use pretty_assertions::assert_eq;
    use std::path::Path;

    const MANIFEST: &str = r#"
kind: Service
metadata:
  name: web
spec:
  ports:
    - port: 80
---
kind: HTTPProxy
metadata:
  name: root
spec:
  virtualhost:
    fqdn: example.com
  routes:
    - conditions:
        - prefix: /api
      enableWebsockets: true
      services:
        - name: web
          port: 80
---
kind: HTTPProxy
metadata:
  name: broken
spec:
  virtualhost:
    fqdn: broken.example.com
  routes:
    - services:
        - name: missing
          port: 80
"#;

    fn mk_build() -> Build {
        let mut cache = Cache::default();
        manifests::load_str(&mut cache, Path::new("test.yaml"), MANIFEST).unwrap();
        Builder::new(Defaults::default()).build(&cache)
    }

    #[test]
    fn reports_routes_and_statuses() {
        let report = Report::new(&mk_build());

        let statuses = report
            .resources
            .iter()
            .map(|r| (r.name.as_str(), r.status))
            .collect::<Vec<_>>();
        assert_eq!(statuses, vec![("broken", "invalid"), ("root", "valid")]);

        assert_eq!(report.services, vec!["default/web:80".to_string()]);
        assert!(report.secrets.is_empty());

        let http = report
            .listeners
            .iter()
            .find(|l| l.name == "ingress_http")
            .unwrap();
        assert_eq!(http.virtual_hosts.len(), 1);
        let vhost = &http.virtual_hosts[0];
        assert_eq!(vhost.name, "example.com");
        assert_eq!(vhost.tls, None);
        assert_eq!(vhost.routes.len(), 1);
        assert_eq!(
            vhost.routes[0].clusters,
            vec![ClusterReport {
                service: "default/web:80".to_string(),
                weight: 0,
                protocol: "",
            }]
        );
        assert!(vhost.routes[0].websocket);
        assert_eq!(vhost.routes[0].source, "HTTPProxy default/root");
    }

    #[test]
    fn writes_json() {
        let mut out = Vec::new();
        write(&mk_build(), &mut out).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let route = &json["listeners"][0]["virtualHosts"][0]["routes"][0];
        assert_eq!(route["clusters"][0]["service"], "default/web:80");
        assert_eq!(route["websocket"], true);
        assert!(route.get("httpsUpgrade").is_none());
        assert_eq!(json["resources"][0]["status"], "invalid");
    }
}
