//! WolfConsensus Configuration
//!
//! This module provides configuration structures for a consensus
//! participant.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main consensus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Node-specific configuration
    pub node: NodeConfig,

    /// Cluster configuration
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Node-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unique node identifier
    pub id: String,
}

/// Cluster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Peer node ids (excluding this node)
    #[serde(default)]
    pub peers: Vec<String>,

    /// Minimum number of acks for commit (0 = majority)
    #[serde(default)]
    pub min_quorum: usize,

    /// Maximum operations per replicate request
    #[serde(default = "default_max_batch_ops")]
    pub max_batch_ops: usize,

    /// Capacity of the outbound message channel
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,

    /// How long a proposer should wait for a round before giving up
    #[serde(default = "default_replication_timeout_ms")]
    pub replication_timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (full, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_max_batch_ops() -> usize {
    1000
}

fn default_outbound_capacity() -> usize {
    10000
}

fn default_replication_timeout_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "full".to_string()
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            peers: Vec::new(),
            min_quorum: 0,
            max_batch_ops: default_max_batch_ops(),
            outbound_capacity: default_outbound_capacity(),
            replication_timeout_ms: default_replication_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl ConsensusConfig {
    /// Build a configuration for a node with the given peers
    pub fn new(node_id: impl Into<String>, peers: Vec<String>) -> Self {
        Self {
            node: NodeConfig { id: node_id.into() },
            cluster: ClusterConfig {
                peers,
                ..ClusterConfig::default()
            },
            logging: LoggingConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: ConsensusConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.node.id.is_empty() {
            return Err(crate::Error::Config("node.id cannot be empty".into()));
        }

        if self.cluster.peers.iter().any(|p| p == &self.node.id) {
            return Err(crate::Error::Config(format!(
                "cluster.peers must not contain this node ({})",
                self.node.id
            )));
        }

        if self.cluster.max_batch_ops == 0 {
            return Err(crate::Error::Config("cluster.max_batch_ops must be positive".into()));
        }

        if self.cluster.outbound_capacity == 0 {
            return Err(crate::Error::Config(
                "cluster.outbound_capacity must be positive".into(),
            ));
        }

        if self.cluster.min_quorum > self.cluster.peers.len() + 1 {
            return Err(crate::Error::Config(format!(
                "cluster.min_quorum {} exceeds cluster size {}",
                self.cluster.min_quorum,
                self.cluster.peers.len() + 1
            )));
        }

        match self.logging.format.as_str() {
            "full" | "compact" => Ok(()),
            other => Err(crate::Error::Config(format!("unknown logging.format: {}", other))),
        }
    }

    /// Get replication timeout as Duration
    pub fn replication_timeout(&self) -> Duration {
        Duration::from_millis(self.cluster.replication_timeout_ms)
    }

    /// Calculate quorum size
    pub fn quorum_size(&self) -> usize {
        quorum_size(self.cluster.min_quorum, self.cluster.peers.len())
    }
}

/// Acks (including our own) needed to commit with `peer_count` peers.
/// A fixed `min_quorum` is capped at the cluster size; 0 means majority.
pub(crate) fn quorum_size(min_quorum: usize, peer_count: usize) -> usize {
    let total_nodes = peer_count + 1;
    if min_quorum > 0 {
        min_quorum.min(total_nodes)
    } else {
        (total_nodes / 2) + 1
    }
}
