//! Error types for onionmesh

use crate::types::NodeId;
use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building routes, resolving keys and wrapping or
/// peeling onion layers.
#[derive(Debug, Error)]
pub enum Error {
    /// A route (or key list) with zero hops
    #[error("route has no hops")]
    EmptyRoute,

    /// A route that visits the same node twice
    #[error("route visits {0} more than once")]
    RepeatedHop(NodeId),

    /// Key directory has nothing provisioned for this node
    #[error("no key provisioned for node {0}")]
    UnknownKey(NodeId),

    /// Ciphertext failed the AEAD integrity check
    #[error("layer authentication failed")]
    AuthFailure,

    /// Envelope too short to hold a nonce and tag
    #[error("malformed envelope: {len} bytes (min {min})")]
    MalformedInput { len: usize, min: usize },

    /// Number of hop keys does not match the route
    #[error("route has {route} hops but {keys} keys were supplied")]
    KeyCountMismatch { route: usize, keys: usize },

    /// Message exceeds the codec payload limit
    #[error("payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: usize, max: usize },

    /// AEAD encryption failed
    #[error("layer encryption failed")]
    EncryptionFailed,

    /// HKDF expansion failed
    #[error("key derivation failed")]
    KeyDerivation,
}
