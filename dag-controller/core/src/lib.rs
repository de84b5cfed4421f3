//! Routing DAG model.
//!
//! A DAG is built from a snapshot of cluster resources and describes how a
//! reverse proxy should route traffic:
//!
//! ```text
//! [ Listener ] -> [ VirtualHost ] -> [ Route ] -> [ Cluster ] -> [ Service ]
//!                  [ SecureVirtualHost ] -> [ Secret ]
//! ```
//!
//! Every edge points downward. Routes record the resource that produced them
//! as a plain [`ResourceRef`] value so that validation errors can be
//! attributed, but that reference never owns anything.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod dag;
pub mod headers;
mod listener;
pub mod ratelimit;
mod resource;
pub mod route;
mod secret;
pub mod service;
pub mod timeout;

pub use self::{
    dag::Dag,
    listener::{Listener, ListenerProtocol, SecureVirtualHost, TlsVersion, VirtualHost},
    resource::{ResourceId, ResourceKind, ResourceRef},
    route::{
        HeaderMatch, HeaderMatchKind, PathMatch, QueryParamMatch, QueryParamMatchKind, RetryPolicy,
        Route, RouteMatch,
    },
    secret::Secret,
    service::{
        CircuitBreakers, Cluster, HealthCheckPolicy, LoadBalancerPolicy, Service, ServiceKey,
        UnknownVariant, UpstreamProtocol, UpstreamTls,
    },
};

/// The virtual host name used for routes without an explicit host.
pub const DEFAULT_HOST: &str = "*";
