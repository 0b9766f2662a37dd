//! WolfConsensus - Replication Consensus Core for WolfScale
//!
//! The piece of a WolfScale node that turns proposed operations into
//! replicated, committed log entries. Each proposal becomes a
//! [`ConsensusRound`] that may be bound to the term it was proposed in;
//! if leadership changes before the round commits, the round is aborted
//! instead of being replicated under a term it was never meant for.
//!
//! # Architecture
//!
//! A [`Consensus`] instance owns the replica state (lifecycle phase, role,
//! term, log positions) and talks to two collaborators:
//!
//! - a [`LogStore`] that durably holds the log and summarizes it as a
//!   [`BootstrapInfo`] at startup
//! - an outbound channel of [`Message`]s that the transport delivers
//!
//! # Features
//!
//! - Totally ordered operation ids ([`OpId`])
//! - Term-bound rounds with exactly-once completion callbacks
//! - Majority commit with in-order callback delivery
//! - Follower log reconciliation and leader catch-up
//! - Fault hooks around start, config change, replicate, update and
//!   shutdown, with a scriptable [`InjectedFaults`] implementation

pub mod config;
pub mod consensus;
pub mod error;
pub mod log;
pub mod logging;
pub mod opid;

pub use config::ConsensusConfig;
pub use consensus::{
    BootstrapInfo, Consensus, ConsensusRound, FaultHooks, HookPoint, InjectedFaults, Message,
};
pub use error::{Error, Result};
pub use log::{LogStore, MemoryLogStore, ReplicateMsg};
pub use opid::{OpId, Term};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::ConsensusConfig;
    pub use crate::consensus::{
        BootstrapInfo, Consensus, ConsensusRound, ConsensusStatus, FaultHooks, HookPoint,
        InjectedFaults, LifecyclePhase, Message, ReplicaRole,
    };
    pub use crate::error::{Error, Result};
    pub use crate::log::{LogEntry, LogStore, MemoryLogStore, OperationType, ReplicateMsg};
    pub use crate::opid::{OpId, Term};
}
