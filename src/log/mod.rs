//! Log Storage Module
//!
//! Consensus does not own the durable log. It talks to a [`LogStore`]
//! collaborator that recovers a [`BootstrapInfo`] at startup and accepts
//! appends of envelopes at their assigned positions.

pub mod entry;
mod memory;

pub use entry::{LogEntry, OperationType, ReplicateMsg};
pub use memory::MemoryLogStore;

use crate::consensus::BootstrapInfo;
use crate::error::Result;
use crate::opid::OpId;

/// Durable log collaborator
#[async_trait::async_trait]
pub trait LogStore: Send + Sync {
    /// Summarize the persisted log. Called once during startup.
    async fn bootstrap_info(&self) -> Result<BootstrapInfo>;

    /// Durably append entries. Ids must be strictly increasing and follow
    /// the last appended id.
    async fn append(&self, entries: &[LogEntry]) -> Result<()>;

    /// Read up to `max` entries following `after`, in id order
    async fn read_after(&self, after: OpId, max: usize) -> Result<Vec<LogEntry>>;

    /// Check whether an entry with exactly this id is in the log
    async fn contains(&self, id: OpId) -> Result<bool>;

    /// Record that everything up to `id` is committed
    async fn mark_committed(&self, id: OpId) -> Result<()>;

    /// Drop every entry after `id`. Committed entries cannot be dropped.
    async fn truncate_after(&self, id: OpId) -> Result<()>;
}
