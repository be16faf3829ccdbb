//! Node registry and dispatch

use crate::node::{Node, NodeError};
use onionmesh_core::{NodeId, Route};
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Network errors
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Node already registered: {0}")]
    DuplicateId(NodeId),
    #[error("Unknown sender: {0}")]
    UnknownSender(NodeId),
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),
    #[error("Node error: {0}")]
    Node(#[from] NodeError),
}

/// Registry that owns every node in a simulated network.
///
/// Holds no key material. The registry lock is never held while calling into
/// a node, so it cannot deadlock against per-node routing table locks.
#[derive(Default)]
pub struct Network {
    nodes: RwLock<HashMap<NodeId, Arc<Node>>>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node and take ownership of it
    pub fn add_node(&self, node: Node) -> Result<Arc<Node>, NetworkError> {
        let mut nodes = self.nodes.write();
        match nodes.entry(node.id().clone()) {
            Entry::Occupied(entry) => Err(NetworkError::DuplicateId(entry.key().clone())),
            Entry::Vacant(entry) => {
                let node = Arc::new(node);
                entry.insert(Arc::clone(&node));
                info!(node = %node.id(), "Registered node");
                Ok(node)
            }
        }
    }

    pub fn node(&self, id: &NodeId) -> Option<Arc<Node>> {
        self.nodes.read().get(id).cloned()
    }

    /// Registered node ids, sorted
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<_> = self.nodes.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Link two nodes in both directions
    pub fn connect_nodes(&self, a: &NodeId, b: &NodeId) -> Result<(), NetworkError> {
        let (node_a, node_b) = {
            let nodes = self.nodes.read();
            let node_a = nodes
                .get(a)
                .cloned()
                .ok_or_else(|| NetworkError::UnknownNode(a.clone()))?;
            let node_b = nodes
                .get(b)
                .cloned()
                .ok_or_else(|| NetworkError::UnknownNode(b.clone()))?;
            (node_a, node_b)
        };

        node_a.add_route(&node_b);
        node_b.add_route(&node_a);
        debug!(a = %a, b = %b, "Connected nodes");
        Ok(())
    }

    /// Send `message` from the node `from` along `route`
    pub fn dispatch_send(
        &self,
        from: &NodeId,
        route: &Route,
        message: &[u8],
    ) -> Result<(), NetworkError> {
        let sender = self
            .node(from)
            .ok_or_else(|| NetworkError::UnknownSender(from.clone()))?;

        sender.send_onion_message(route, message)?;
        Ok(())
    }
}
