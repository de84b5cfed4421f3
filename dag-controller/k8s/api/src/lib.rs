#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod config;
pub mod httpproxy;
pub mod policy;
pub mod tls_delegation;

pub use self::{
    httpproxy::{HttpProxy, HttpProxySpec, HttpProxyStatus},
    tls_delegation::{TlsCertificateDelegation, TlsCertificateDelegationSpec},
};
pub use k8s_openapi::{
    api::{
        core::v1::{Secret, Service, ServicePort, ServiceSpec},
        networking::v1::{
            HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
            IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
        },
    },
    apimachinery::pkg::{
        apis::meta::v1::{Condition, Time},
        util::intstr::IntOrString,
    },
    ByteString,
};
pub use kube::core::{params::Patch, ObjectMeta, ResourceExt};

/// The annotation prefix for all controller specific annotations.
pub const ANNOTATION_PREFIX: &str = "projectcontour.io/";

/// Returns the value of the named annotation on `meta`, if any.
pub fn annotation<'m>(meta: &'m ObjectMeta, key: &str) -> Option<&'m str> {
    meta.annotations.as_ref()?.get(key).map(String::as_str)
}
