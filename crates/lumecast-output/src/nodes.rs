//! Universe-to-node routing table.

use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddr;

use lumecast_core::UniverseId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::artnet::ARTNET_PORT;
use crate::error::{OutputError, Result};

/// Maps universes to the Art-Net nodes that should receive them.
///
/// Many-to-many: one universe can fan out to several nodes and one node can
/// subscribe to several universes. The table is read-mostly - configuration
/// writes are rare - so coarse locking keeps the transmit path simple.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    routes: RwLock<HashMap<UniverseId, BTreeSet<SocketAddr>>>,
}

impl NodeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes an endpoint to a universe.
    ///
    /// Idempotent: returns false if the exact (universe, endpoint) pair was
    /// already present.
    pub fn register(&self, universe: UniverseId, endpoint: SocketAddr) -> bool {
        let added = self
            .routes
            .write()
            .entry(universe)
            .or_default()
            .insert(endpoint);
        if added {
            debug!(%universe, %endpoint, "registered node");
        }
        added
    }

    /// Removes an endpoint's subscription. Returns false if it was not
    /// registered.
    pub fn unregister(&self, universe: UniverseId, endpoint: SocketAddr) -> bool {
        let mut routes = self.routes.write();
        let Some(endpoints) = routes.get_mut(&universe) else {
            return false;
        };
        let removed = endpoints.remove(&endpoint);
        if endpoints.is_empty() {
            routes.remove(&universe);
        }
        if removed {
            debug!(%universe, %endpoint, "unregistered node");
        }
        removed
    }

    /// Endpoints subscribed to a universe, in stable order.
    pub fn nodes_for(&self, universe: UniverseId) -> Vec<SocketAddr> {
        self.routes
            .read()
            .get(&universe)
            .map(|endpoints| endpoints.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Universes with at least one subscribed endpoint, sorted.
    pub fn universes(&self) -> Vec<UniverseId> {
        let mut ids: Vec<UniverseId> = self.routes.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Total number of (universe, endpoint) subscriptions.
    pub fn len(&self) -> usize {
        self.routes.read().values().map(BTreeSet::len).sum()
    }

    /// Whether no subscriptions exist.
    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }

    /// Drops every subscription.
    pub fn clear(&self) {
        self.routes.write().clear();
    }
}

/// Declarative node entry, as written in the daemon config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// IP address of the node.
    pub address: String,
    /// UDP port, defaulting to the Art-Net port 6454.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Universe addresses this node should receive.
    #[serde(default)]
    pub universes: Vec<u16>,
}

fn default_port() -> u16 {
    ARTNET_PORT
}

impl NodeConfig {
    /// Creates a node entry on the default Art-Net port.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port: ARTNET_PORT,
            universes: Vec::new(),
        }
    }

    /// Sets a non-default port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the universes this node receives.
    pub fn with_universes(mut self, universes: Vec<u16>) -> Self {
        self.universes = universes;
        self
    }

    /// Parses the configured address and port into a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let endpoint = format!("{}:{}", self.address, self.port);
        endpoint
            .parse()
            .map_err(|_| OutputError::InvalidEndpoint(endpoint))
    }
}
