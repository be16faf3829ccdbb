//! onionmesh core library
//!
//! This crate provides the building blocks for onion-routed message delivery:
//! node and route types, per-hop authenticated encryption, key resolution and
//! the packet codec that wraps and peels layers.
//!
//! # Modules
//!
//! - [`types`]: Node identifiers, validated routes and onion packets
//! - [`crypto`]: Hop keys and the AEAD envelope used for every layer
//! - [`directory`]: Key resolution (node id -> hop key)
//! - [`codec`]: Layer construction and peeling
//! - [`error`]: Error types

pub mod codec;
pub mod crypto;
pub mod directory;
pub mod error;
pub mod types;

pub use codec::{OnionCodec, Peeled};
pub use crypto::RouteKey;
pub use directory::{DerivedKeyDirectory, KeyDirectory, StaticKeyDirectory};
pub use error::{Error, Result};
pub use types::*;
