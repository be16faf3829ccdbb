//! Forwarding node
//!
//! A node owns its hop key and a routing table of non-owning neighbor
//! handles. Receiving a packet peels exactly one layer; the result is either
//! handed to the next hop or delivered locally.
//!
//! Forwarding is an explicit loop over [`HopAction`]s rather than a chain of
//! nested calls, so route length never grows the call stack.

use crate::config::NodeConfig;
use crate::deliver::{Deliver, LogDeliver};
use onionmesh_core::{
    KeyDirectory, NodeId, OnionCodec, OnionPacket, Peeled, Route, RouteKey,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, debug_span, warn};

/// Node errors
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Onion error: {0}")]
    Onion(#[from] onionmesh_core::Error),
    #[error("Unknown neighbor: {0}")]
    UnknownNeighbor(NodeId),
    #[error("Route includes the sending node")]
    SelfInRoute,
    #[error("Route too long: {actual} hops (max {max})")]
    RouteTooLong { max: usize, actual: usize },
    #[error("Packet for {expected} arrived at {node}")]
    Misrouted { node: NodeId, expected: NodeId },
    #[error("Packet deadline exceeded")]
    DeadlineExceeded,
}

/// Node processing state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// No packet in flight at this node
    Idle,
    /// Peeling or routing at least one packet
    Processing,
}

/// Node statistics
#[derive(Debug, Clone, Default)]
pub struct NodeStats {
    pub packets_sent: u64,
    pub layers_processed: u64,
    pub layers_forwarded: u64,
    pub messages_delivered: u64,
    pub packets_dropped: u64,
}

/// Result of processing one layer
pub enum HopAction {
    /// Hand the peeled packet to the next hop
    Forward {
        to: Arc<Node>,
        route: Route,
        packet: OnionPacket,
    },
    /// This node was the last hop and delivered the message
    Delivered,
}

impl fmt::Debug for HopAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward { to, packet, .. } => f
                .debug_struct("Forward")
                .field("to", &to.id)
                .field("packet", packet)
                .finish(),
            Self::Delivered => f.write_str("Delivered"),
        }
    }
}

/// Marks the node as processing for as long as it lives
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Onion routing node
pub struct Node {
    id: NodeId,
    /// Our hop key
    key: RouteKey,
    /// Key lookup for routes we originate
    directory: Arc<dyn KeyDirectory>,
    /// Sink for messages that terminate here
    deliver: Arc<dyn Deliver>,
    config: NodeConfig,
    /// Neighbor handles; the network owns the nodes themselves
    routes: RwLock<HashMap<NodeId, Weak<Node>>>,
    in_flight: AtomicUsize,
    stats: RwLock<NodeStats>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, key: RouteKey, directory: Arc<dyn KeyDirectory>) -> Self {
        Self {
            id: id.into(),
            key,
            directory,
            deliver: Arc::new(LogDeliver),
            config: NodeConfig::default(),
            routes: RwLock::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            stats: RwLock::new(NodeStats::default()),
        }
    }

    /// Create a node whose own key is the one `directory` hands out for it
    pub fn provisioned(
        id: impl Into<NodeId>,
        directory: Arc<dyn KeyDirectory>,
    ) -> Result<Self, NodeError> {
        let id = id.into();
        let key = directory.resolve_key(&id)?;
        Ok(Self::new(id, key, directory))
    }

    pub fn with_deliver(mut self, deliver: Arc<dyn Deliver>) -> Self {
        self.deliver = deliver;
        self
    }

    pub fn with_config(mut self, config: NodeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Add (or replace) a route to a neighbor
    pub fn add_route(&self, peer: &Arc<Node>) {
        self.routes
            .write()
            .insert(peer.id.clone(), Arc::downgrade(peer));
        debug!(node = %self.id, peer = %peer.id, "Added route");
    }

    pub fn has_route(&self, id: &NodeId) -> bool {
        self.routes.read().contains_key(id)
    }

    pub fn route_count(&self) -> usize {
        self.routes.read().len()
    }

    /// Neighbor ids, sorted
    pub fn neighbors(&self) -> Vec<NodeId> {
        let mut ids: Vec<_> = self.routes.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn state(&self) -> NodeState {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            NodeState::Processing
        } else {
            NodeState::Idle
        }
    }

    pub fn stats(&self) -> NodeStats {
        self.stats.read().clone()
    }

    /// Wrap `message` for `route` and hand it to the first hop.
    ///
    /// The route excludes this node. The packet's deadline, if configured,
    /// starts now.
    pub fn send_onion_message(&self, route: &Route, message: &[u8]) -> Result<(), NodeError> {
        if route.contains(&self.id) {
            return Err(NodeError::SelfInRoute);
        }
        if route.len() > self.config.max_hops {
            return Err(NodeError::RouteTooLong {
                max: self.config.max_hops,
                actual: route.len(),
            });
        }
        if message.len() > self.config.max_payload_bytes {
            return Err(onionmesh_core::Error::PayloadTooLarge {
                len: message.len(),
                max: self.config.max_payload_bytes,
            }
            .into());
        }

        let first = self.neighbor(route.first())?;
        let packet = OnionCodec::build_with_directory(route, self.directory.as_ref(), message)?;

        self.stats.write().packets_sent += 1;
        debug!(
            node = %self.id,
            hops = route.len(),
            bytes = packet.len(),
            "Sending onion packet"
        );

        let deadline = self.config.deadline().map(|d| Instant::now() + d);
        first.receive_until(route.clone(), packet, deadline)
    }

    /// Accept a packet addressed to this node and drive it to its last hop.
    ///
    /// `route` starts with this node.
    pub fn receive(&self, route: Route, packet: OnionPacket) -> Result<(), NodeError> {
        let deadline = self.config.deadline().map(|d| Instant::now() + d);
        self.receive_until(route, packet, deadline)
    }

    /// Like [`receive`](Self::receive) with an explicit deadline, checked
    /// before every hop is dispatched
    pub fn receive_until(
        &self,
        route: Route,
        packet: OnionPacket,
        deadline: Option<Instant>,
    ) -> Result<(), NodeError> {
        check_deadline(deadline)?;
        let mut action = self.process(route, packet)?;

        while let HopAction::Forward { to, route, packet } = action {
            check_deadline(deadline)?;
            action = to.process(route, packet)?;
        }

        Ok(())
    }

    /// Peel this node's layer and decide what happens next.
    ///
    /// Never calls into another node.
    pub fn process(&self, route: Route, packet: OnionPacket) -> Result<HopAction, NodeError> {
        let span = debug_span!("hop", node = %self.id);
        let _enter = span.enter();
        let _in_flight = InFlight::enter(&self.in_flight);

        if route.first() != &self.id {
            self.record_drop();
            warn!("Packet not addressed to this node, dropping");
            return Err(NodeError::Misrouted {
                node: self.id.clone(),
                expected: route.first().clone(),
            });
        }

        let peeled = match OnionCodec::peel_one_layer(&self.key, &packet, &route) {
            Ok(peeled) => peeled,
            Err(e) => {
                self.record_drop();
                warn!(error = %e, "Failed to peel layer, dropping");
                return Err(e.into());
            }
        };
        self.stats.write().layers_processed += 1;

        match peeled {
            Peeled::Final(message) => {
                debug!(bytes = message.len(), "Final hop, delivering");
                self.stats.write().messages_delivered += 1;
                self.deliver.deliver(&self.id, message);
                Ok(HopAction::Delivered)
            }
            Peeled::Forward {
                next_hop,
                route,
                packet,
            } => {
                let to = match self.neighbor(&next_hop) {
                    Ok(to) => to,
                    Err(e) => {
                        self.record_drop();
                        warn!(next = %next_hop, "Next hop not in routing table, dropping");
                        return Err(e);
                    }
                };

                self.stats.write().layers_forwarded += 1;
                debug!(next = %next_hop, bytes = packet.len(), "Forwarding layer");
                Ok(HopAction::Forward { to, route, packet })
            }
        }
    }

    fn neighbor(&self, id: &NodeId) -> Result<Arc<Node>, NodeError> {
        // Clone the handle out so the table lock is released before forwarding
        self.routes
            .read()
            .get(id)
            .and_then(Weak::upgrade)
            .ok_or_else(|| NodeError::UnknownNeighbor(id.clone()))
    }

    fn record_drop(&self) {
        self.stats.write().packets_dropped += 1;
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("routes", &self.route_count())
            .finish()
    }
}

fn check_deadline(deadline: Option<Instant>) -> Result<(), NodeError> {
    match deadline {
        Some(deadline) if Instant::now() >= deadline => {
            warn!("Packet deadline exceeded, dropping");
            Err(NodeError::DeadlineExceeded)
        }
        _ => Ok(()),
    }
}
