//! Process scaffolding around the DAG builder: argument parsing, logging,
//! configuration, manifest loading, build hand-off and metrics.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use ingress_dag_builder as builder;
pub use ingress_dag_core as core;
pub use ingress_dag_k8s_api as k8s;
pub use ingress_dag_k8s_cache as cache;
pub use ingress_dag_k8s_status as status;

mod args;
pub mod config;
mod log;
pub mod manifests;
pub mod metrics;
pub mod rebuild;
pub mod report;

pub use self::{args::Args, log::LogFormat};
