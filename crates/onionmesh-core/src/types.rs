//! Core types for onionmesh
//!
//! Routes are validated at construction so that every `Route` in the system
//! is non-empty and never revisits a node.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// =============================================================================
// NODE IDENTITY
// =============================================================================

/// Opaque node identifier, unique within a network
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// =============================================================================
// ROUTE
// =============================================================================

/// Ordered hop list chosen by the sender (sender excluded).
///
/// Invariants: at least one hop, no node appears twice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<NodeId>", into = "Vec<NodeId>")]
pub struct Route(Vec<NodeId>);

impl Route {
    /// Validate and wrap a hop list
    pub fn new(hops: Vec<NodeId>) -> Result<Self> {
        if hops.is_empty() {
            return Err(Error::EmptyRoute);
        }

        let mut seen = HashSet::with_capacity(hops.len());
        for hop in &hops {
            if !seen.insert(hop) {
                return Err(Error::RepeatedHop(hop.clone()));
            }
        }

        Ok(Self(hops))
    }

    /// Build a route from anything convertible into node ids
    pub fn from_ids<I, T>(ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<NodeId>,
    {
        Self::new(ids.into_iter().map(Into::into).collect())
    }

    /// The hop this route is currently addressed to
    pub fn first(&self) -> &NodeId {
        &self.0[0]
    }

    /// The hop after the current one, if any
    pub fn next_hop(&self) -> Option<&NodeId> {
        self.0.get(1)
    }

    /// The remaining route once the current hop has peeled its layer.
    ///
    /// Returns `None` at the last hop.
    pub fn advance(&self) -> Option<Route> {
        if self.0.len() > 1 {
            Some(Self(self.0[1..].to_vec()))
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with collections
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_last_hop(&self) -> bool {
        self.0.len() == 1
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.0.contains(id)
    }

    pub fn hops(&self) -> &[NodeId] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NodeId> {
        self.0.iter()
    }
}

impl TryFrom<Vec<NodeId>> for Route {
    type Error = Error;

    fn try_from(hops: Vec<NodeId>) -> Result<Self> {
        Self::new(hops)
    }
}

impl From<Route> for Vec<NodeId> {
    fn from(route: Route) -> Self {
        route.0
    }
}

// =============================================================================
// ONION PACKET
// =============================================================================

/// Nested ciphertext layers, outermost first.
///
/// Opaque on purpose: nothing in the bytes reveals how many layers remain.
#[derive(Clone, PartialEq, Eq)]
pub struct OnionPacket(Vec<u8>);

impl OnionPacket {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for OnionPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Contents are ciphertext; the length is all that is useful in logs
        f.debug_struct("OnionPacket").field("len", &self.0.len()).finish()
    }
}
