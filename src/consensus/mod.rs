//! Consensus Module
//!
//! Term-bound replication rounds, the bootstrap summary, lifecycle fault
//! hooks and the [`Consensus`] instance that ties them together.

mod bootstrap;
pub mod hooks;
mod node;
pub mod protocol;
mod round;

pub use bootstrap::BootstrapInfo;
pub use hooks::{FaultHooks, HookPoint, InjectedFaults};
pub use node::{Consensus, ConsensusStatus};
pub use protocol::Message;
pub use round::{ConsensusRound, ReplicatedCallback};

use serde::{Deserialize, Serialize};

/// Lifecycle phase of a consensus instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecyclePhase {
    /// Created, bootstrap not loaded yet
    Uninitialized,
    /// Loading the bootstrap summary
    Starting,
    /// Creating and resolving rounds
    Running,
    /// Replica set is being replaced
    ConfigChanging,
    /// Aborting in-flight rounds
    ShuttingDown,
    /// Terminal
    Stopped,
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecyclePhase::Uninitialized => write!(f, "UNINITIALIZED"),
            LifecyclePhase::Starting => write!(f, "STARTING"),
            LifecyclePhase::Running => write!(f, "RUNNING"),
            LifecyclePhase::ConfigChanging => write!(f, "CONFIG_CHANGING"),
            LifecyclePhase::ShuttingDown => write!(f, "SHUTTING_DOWN"),
            LifecyclePhase::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// Role of this node in the replica group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicaRole {
    Leader,
    Follower,
}

impl std::fmt::Display for ReplicaRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplicaRole::Leader => write!(f, "LEADER"),
            ReplicaRole::Follower => write!(f, "FOLLOWER"),
        }
    }
}
