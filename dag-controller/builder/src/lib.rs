//! Builds a routing [`Dag`] from a snapshot of cluster resources.
//!
//! Processors translate each kind of input resource into DAG fragments,
//! resolving policy against process-wide [`Defaults`] along the way.
//! Graph-wide validation then removes conflicting and unreachable fragments
//! before the DAG is frozen. Every problem found is attributed to the
//! resource that caused it in the build's status cache.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod annotation;
mod backend;
mod builder;
mod config;
mod error;
mod host;
pub mod httpproxy;
pub mod ingress;
mod processor;
pub mod resolve;
mod secret;
mod validate;

#[cfg(test)]
mod tests;

pub use self::{
    backend::PortRef,
    builder::{Build, Builder, Phase},
    config::{Defaults, ListenerConfig},
    error::{BackendError, Degraded, PolicyError, RouteError, SecretError},
    host::HostError,
    httpproxy::HttpProxyProcessor,
    ingress::IngressProcessor,
    processor::{Context, Processor},
};
pub use ingress_dag_core::Dag;
