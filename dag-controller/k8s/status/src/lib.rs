//! Per-resource validation outcomes of a DAG build.
//!
//! Every resource a processor looks at gets a [`ResourceStatus`]. Errors make
//! a resource invalid; warnings are informational and leave it valid. The
//! cache can render each status as a Kubernetes condition and as a status
//! merge patch for external reporting.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod reason;

#[cfg(test)]
mod tests;

pub use self::reason::Reason;
use chrono::{DateTime, Utc};
use ingress_dag_core::{ResourceKind, ResourceRef};
use ingress_dag_k8s_api::{self as k8s, Condition, Time};
use std::{collections::BTreeMap, fmt};

pub const VALID_CONDITION: &str = "Valid";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Validity {
    Valid,
    Invalid,

    /// Not reachable from any root resource.
    Orphaned,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub reason: Reason,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceStatus {
    pub resource: ResourceRef,
    pub generation: Option<i64>,

    /// The virtual host the resource contributes to, if known.
    pub vhost: Option<String>,
    pub errors: Vec<Message>,
    pub warnings: Vec<Message>,
    pub orphaned: bool,
}

/// Statuses keyed by resource, in a stable order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusCache {
    statuses: BTreeMap<ResourceRef, ResourceStatus>,
}

// === impl Validity ===

impl Validity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Invalid => "invalid",
            Self::Orphaned => "orphaned",
        }
    }
}

impl fmt::Display for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

// === impl ResourceStatus ===

impl ResourceStatus {
    pub fn new(resource: ResourceRef) -> Self {
        Self {
            resource,
            generation: None,
            vhost: None,
            errors: vec![],
            warnings: vec![],
            orphaned: false,
        }
    }

    pub fn validity(&self) -> Validity {
        if !self.errors.is_empty() {
            Validity::Invalid
        } else if self.orphaned {
            Validity::Orphaned
        } else {
            Validity::Valid
        }
    }

    pub fn has_error(&self, reason: Reason) -> bool {
        self.errors.iter().any(|m| m.reason == reason)
    }

    /// Summarizes the status in one line.
    pub fn description(&self) -> String {
        match self.validity() {
            Validity::Valid => match &self.vhost {
                Some(vhost) => format!("Valid {}: {vhost}", self.resource.kind),
                None => format!("Valid {}", self.resource.kind),
            },
            Validity::Orphaned => format!(
                "this {} is not part of a delegation chain from a root {}",
                self.resource.kind, self.resource.kind
            ),
            Validity::Invalid => {
                let messages = self
                    .errors
                    .iter()
                    .map(|m| m.message.as_str())
                    .collect::<Vec<_>>();
                messages.join("; ")
            }
        }
    }

    /// Renders the status as a `Valid` condition.
    pub fn to_condition(&self, timestamp: DateTime<Utc>) -> Condition {
        let (status, reason) = match self.validity() {
            Validity::Valid => ("True", "Valid".to_string()),
            Validity::Invalid => ("False", self.errors[0].reason.to_string()),
            Validity::Orphaned => ("False", Reason::Orphaned.to_string()),
        };
        Condition {
            type_: VALID_CONDITION.to_string(),
            status: status.to_string(),
            reason,
            message: self.description(),
            observed_generation: self.generation,
            last_transition_time: Time(timestamp),
        }
    }

    /// Builds a status merge patch for resources that carry a status
    /// subresource. Ingress status only reports load balancer addresses, so
    /// no patch is produced for it.
    pub fn make_patch(&self) -> Option<k8s::Patch<serde_json::Value>> {
        if self.resource.kind != ResourceKind::HttpProxy {
            return None;
        }

        #[cfg(not(test))]
        let timestamp = Utc::now();
        #[cfg(test)]
        let timestamp = DateTime::<Utc>::MIN_UTC;

        let value = serde_json::json!({
            "apiVersion": "projectcontour.io/v1",
            "kind": "HTTPProxy",
            "name": self.resource.name,
            "status": {
                "currentStatus": self.validity().as_str(),
                "description": self.description(),
                "conditions": [self.to_condition(timestamp)],
            },
        });
        Some(k8s::Patch::Merge(value))
    }
}

// === impl StatusCache ===

impl StatusCache {
    /// Returns the status of `resource`, creating a valid one if none exists.
    pub fn entry(&mut self, resource: &ResourceRef) -> &mut ResourceStatus {
        self.statuses
            .entry(resource.clone())
            .or_insert_with(|| ResourceStatus::new(resource.clone()))
    }

    pub fn error(&mut self, resource: &ResourceRef, reason: Reason, message: impl fmt::Display) {
        self.entry(resource).errors.push(Message {
            reason,
            message: message.to_string(),
        });
    }

    pub fn warning(&mut self, resource: &ResourceRef, reason: Reason, message: impl fmt::Display) {
        self.entry(resource).warnings.push(Message {
            reason,
            message: message.to_string(),
        });
    }

    pub fn orphan(&mut self, resource: &ResourceRef) {
        self.entry(resource).orphaned = true;
    }

    pub fn get(&self, resource: &ResourceRef) -> Option<&ResourceStatus> {
        self.statuses.get(resource)
    }

    pub fn validity(&self, resource: &ResourceRef) -> Option<Validity> {
        self.get(resource).map(ResourceStatus::validity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceStatus> {
        self.statuses.values()
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    /// Counts statuses by kind and validity.
    pub fn counts(&self) -> BTreeMap<(ResourceKind, Validity), usize> {
        let mut counts = BTreeMap::new();
        for status in self.statuses.values() {
            *counts
                .entry((status.resource.kind, status.validity()))
                .or_default() += 1;
        }
        counts
    }
}
