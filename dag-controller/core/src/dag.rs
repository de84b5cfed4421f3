use crate::{
    listener::{Listener, ListenerProtocol},
    route::Route,
    secret::Secret,
    service::{Service, ServiceKey},
    ResourceId,
};
use std::{collections::BTreeMap, sync::Arc};

/// The routing graph.
///
/// Services and secrets are interned in DAG level tables so that every route
/// or virtual host referring to the same backend or certificate shares one
/// instance.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dag {
    pub listeners: BTreeMap<String, Listener>,
    pub services: BTreeMap<ServiceKey, Arc<Service>>,
    pub secrets: BTreeMap<ResourceId, Arc<Secret>>,
}

impl Dag {
    /// Returns the named listener, creating it if it does not yet exist.
    ///
    /// The address, port and protocol of an existing listener are left
    /// untouched.
    pub fn ensure_listener(
        &mut self,
        name: &str,
        address: &str,
        port: u16,
        protocol: ListenerProtocol,
    ) -> &mut Listener {
        self.listeners
            .entry(name.to_string())
            .or_insert_with(|| Listener::new(name, address, port, protocol))
    }

    pub fn listener(&self, name: &str) -> Option<&Listener> {
        self.listeners.get(name)
    }

    pub fn listener_mut(&mut self, name: &str) -> Option<&mut Listener> {
        self.listeners.get_mut(name)
    }

    /// Returns the shared instance for `key`, building it on first use.
    pub fn ensure_service(
        &mut self,
        key: ServiceKey,
        build: impl FnOnce() -> Service,
    ) -> Arc<Service> {
        self.services
            .entry(key)
            .or_insert_with(|| Arc::new(build()))
            .clone()
    }

    pub fn service(&self, key: &ServiceKey) -> Option<&Arc<Service>> {
        self.services.get(key)
    }

    /// Interns a validated secret. An already interned secret with the same
    /// id is returned instead.
    pub fn intern_secret(&mut self, secret: Secret) -> Arc<Secret> {
        self.secrets
            .entry(secret.id.clone())
            .or_insert_with(|| Arc::new(secret))
            .clone()
    }

    pub fn secret(&self, id: &ResourceId) -> Option<&Arc<Secret>> {
        self.secrets.get(id)
    }

    /// Iterates over every route in the graph along with the listener and
    /// virtual host it is attached to.
    pub fn routes(&self) -> impl Iterator<Item = (&Listener, &str, &Route)> {
        self.listeners.values().flat_map(|l| {
            l.all_virtual_hosts()
                .flat_map(move |vh| vh.routes.iter().map(move |r| (l, vh.name.as_str(), r)))
        })
    }

    pub fn num_routes(&self) -> usize {
        self.routes().count()
    }

    pub fn num_virtual_hosts(&self) -> usize {
        self.listeners
            .values()
            .map(|l| l.virtual_hosts.len() + l.secure_virtual_hosts.len())
            .sum()
    }
}
