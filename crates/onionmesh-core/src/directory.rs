//! Key resolution for route construction
//!
//! A sender needs the key of every hop on its route before it can wrap a
//! message. How those keys are distributed is outside this crate; the
//! [`KeyDirectory`] trait is the seam.

use crate::crypto::RouteKey;
use crate::error::{Error, Result};
use crate::types::NodeId;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Resolves a node id to the key that seals that node's layer
pub trait KeyDirectory: Send + Sync {
    fn resolve_key(&self, node_id: &NodeId) -> Result<RouteKey>;
}

/// In-memory directory of explicitly provisioned keys
#[derive(Default)]
pub struct StaticKeyDirectory {
    keys: RwLock<HashMap<NodeId, RouteKey>>,
}

impl StaticKeyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision (or replace) the key for a node
    pub fn provision(&self, node_id: NodeId, key: RouteKey) {
        self.keys.write().insert(node_id, key);
    }

    /// Generate, provision and return a fresh key for a node
    pub fn provision_random(&self, node_id: NodeId) -> RouteKey {
        let key = RouteKey::generate();
        self.provision(node_id, key.clone());
        key
    }

    /// Remove a node's key
    pub fn revoke(&self, node_id: &NodeId) -> bool {
        self.keys.write().remove(node_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}

impl KeyDirectory for StaticKeyDirectory {
    fn resolve_key(&self, node_id: &NodeId) -> Result<RouteKey> {
        self.keys
            .read()
            .get(node_id)
            .cloned()
            .ok_or_else(|| Error::UnknownKey(node_id.clone()))
    }
}

/// Directory that derives every node's key from one master secret.
///
/// Any holder of the master secret can compute every key, so this only
/// suits closed simulations and tests.
pub struct DerivedKeyDirectory {
    master_secret: [u8; 32],
}

impl DerivedKeyDirectory {
    pub fn new(master_secret: [u8; 32]) -> Self {
        Self { master_secret }
    }
}

impl KeyDirectory for DerivedKeyDirectory {
    fn resolve_key(&self, node_id: &NodeId) -> Result<RouteKey> {
        RouteKey::derive(&self.master_secret, node_id)
    }
}
