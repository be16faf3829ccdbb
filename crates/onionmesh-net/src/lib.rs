//! Onion-routed message delivery between in-process nodes
//!
//! This crate provides:
//! - Forwarding nodes that peel one layer per hop
//! - A registry that owns nodes and dispatches sends
//! - Delivery sinks for terminal hops
//! - Node configuration

pub mod config;
pub mod deliver;
pub mod network;
pub mod node;

pub use config::NodeConfig;
pub use deliver::{Deliver, Inbox, LogDeliver};
pub use network::{Network, NetworkError};
pub use node::{HopAction, Node, NodeError, NodeState, NodeStats};
