//! Terminal-hop delivery sinks

use onionmesh_core::NodeId;
use parking_lot::Mutex;
use tracing::info;

/// Receives the fully peeled message at the last hop of a route
pub trait Deliver: Send + Sync {
    fn deliver(&self, node: &NodeId, payload: Vec<u8>);
}

impl<F> Deliver for F
where
    F: Fn(&NodeId, Vec<u8>) + Send + Sync,
{
    fn deliver(&self, node: &NodeId, payload: Vec<u8>) {
        self(node, payload)
    }
}

/// Default sink: logs receipt and discards the payload
#[derive(Debug, Default)]
pub struct LogDeliver;

impl Deliver for LogDeliver {
    fn deliver(&self, node: &NodeId, payload: Vec<u8>) {
        info!(node = %node, bytes = payload.len(), "Received final message");
    }
}

/// Collects delivered payloads for the application to drain
#[derive(Debug, Default)]
pub struct Inbox {
    messages: Mutex<Vec<Vec<u8>>>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain all delivered payloads
    pub fn take(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.messages.lock())
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

impl Deliver for Inbox {
    fn deliver(&self, _node: &NodeId, payload: Vec<u8>) {
        self.messages.lock().push(payload);
    }
}
