//! Onion packet construction and peeling
//!
//! A packet for route `[h0, h1, ..., hn-1]` is
//! `E(k0, E(k1, ... E(kn-1, message)))`, built innermost first so that the
//! outer layer opens only under `h0`'s key.
//!
//! Layers carry no hop-count or routing metadata. Whether a peeled layer is
//! another envelope or the final message is decided by the remaining route
//! handed to the hop alongside the packet.

use crate::crypto::{self, RouteKey, ENVELOPE_OVERHEAD};
use crate::directory::KeyDirectory;
use crate::error::{Error, Result};
use crate::types::{NodeId, OnionPacket, Route};

/// Maximum message size (to bound per-hop allocations)
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Outcome of peeling one layer
#[derive(Debug)]
pub enum Peeled {
    /// More hops remain: hand `packet` to `next_hop` along with `route`
    Forward {
        next_hop: NodeId,
        route: Route,
        packet: OnionPacket,
    },
    /// This hop was the last: the fully unwrapped message
    Final(Vec<u8>),
}

/// Stateless layer codec
pub struct OnionCodec;

impl OnionCodec {
    /// Wrap `message` for `route`, one layer per hop.
    ///
    /// `keys[i]` must be the key of `route[i]`.
    pub fn build(route: &Route, keys: &[RouteKey], message: &[u8]) -> Result<OnionPacket> {
        if keys.is_empty() {
            return Err(Error::EmptyRoute);
        }
        if keys.len() != route.len() {
            return Err(Error::KeyCountMismatch {
                route: route.len(),
                keys: keys.len(),
            });
        }
        if message.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                len: message.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        // Encrypt from innermost to outermost
        let mut current = message.to_vec();
        for key in keys.iter().rev() {
            current = crypto::encrypt(key, &current)?;
        }

        Ok(OnionPacket::from_bytes(current))
    }

    /// Resolve every hop key through `directory`, then [`build`](Self::build)
    pub fn build_with_directory(
        route: &Route,
        directory: &dyn KeyDirectory,
        message: &[u8],
    ) -> Result<OnionPacket> {
        let keys = route
            .iter()
            .map(|hop| directory.resolve_key(hop))
            .collect::<Result<Vec<_>>>()?;

        Self::build(route, &keys, message)
    }

    /// Peel the outer layer with the current hop's key.
    ///
    /// `remaining` is the route as handed to this hop (this hop first).
    pub fn peel_one_layer(key: &RouteKey, packet: &OnionPacket, remaining: &Route) -> Result<Peeled> {
        let inner = crypto::decrypt(key, packet.as_bytes())?;

        match remaining.advance() {
            Some(route) => Ok(Peeled::Forward {
                next_hop: route.first().clone(),
                route,
                packet: OnionPacket::from_bytes(inner),
            }),
            None => Ok(Peeled::Final(inner)),
        }
    }

    /// Exact packet size for a message wrapped over `hops` layers
    pub fn layered_len(message_len: usize, hops: usize) -> usize {
        message_len + hops * ENVELOPE_OVERHEAD
    }
}
