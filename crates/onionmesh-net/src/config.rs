//! Node configuration

use onionmesh_core::codec::MAX_PAYLOAD_SIZE;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-node forwarding limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Maximum route length this node will build
    pub max_hops: usize,

    /// Maximum message size this node will send
    pub max_payload_bytes: usize,

    /// Per-packet deadline in milliseconds, measured from the first hop
    pub deadline_ms: Option<u64>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            max_hops: 8,
            max_payload_bytes: MAX_PAYLOAD_SIZE,
            deadline_ms: None,
        }
    }
}

impl NodeConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_hops == 0 {
            anyhow::bail!("max_hops must be at least 1");
        }
        if self.max_payload_bytes == 0 {
            anyhow::bail!("max_payload_bytes must be at least 1");
        }
        if self.max_payload_bytes > MAX_PAYLOAD_SIZE {
            anyhow::bail!(
                "max_payload_bytes {} exceeds codec limit {}",
                self.max_payload_bytes,
                MAX_PAYLOAD_SIZE
            );
        }
        if self.deadline_ms == Some(0) {
            anyhow::bail!("deadline_ms must be positive when set");
        }
        Ok(())
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}
