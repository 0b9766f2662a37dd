//! In-memory log store
//!
//! Keeps the log in a `BTreeMap`. Nothing survives the process, but a store
//! can be rebuilt from a set of entries to emulate recovery.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::entry::{LogEntry, ReplicateMsg};
use super::LogStore;
use crate::consensus::BootstrapInfo;
use crate::error::{Error, Result};
use crate::opid::OpId;

/// Log contents
#[derive(Default)]
struct MemoryLog {
    entries: BTreeMap<OpId, ReplicateMsg>,
    committed: OpId,
}

impl MemoryLog {
    fn last_id(&self) -> OpId {
        self.entries.keys().next_back().copied().unwrap_or(OpId::MIN)
    }
}

/// Log store that keeps entries in memory
#[derive(Default)]
pub struct MemoryLogStore {
    log: RwLock<MemoryLog>,
    /// Reject appends, emulating a failed disk
    read_only: AtomicBool,
}

impl MemoryLogStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from previously persisted entries
    pub fn recovered(entries: Vec<LogEntry>, committed: OpId) -> Result<Self> {
        let mut log = MemoryLog::default();
        for entry in entries {
            if entry.id <= log.last_id() {
                return Err(Error::LogStore(format!(
                    "Recovered entry {} is out of order",
                    entry.id
                )));
            }
            log.entries.insert(entry.id, entry.msg);
        }

        if committed > log.last_id() {
            return Err(Error::LogStore(format!(
                "Committed id {} is past the end of the log ({})",
                committed,
                log.last_id()
            )));
        }
        log.committed = committed;

        Ok(Self {
            log: RwLock::new(log),
            read_only: AtomicBool::new(false),
        })
    }

    /// Make subsequent appends fail
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Snapshot of all entries in id order
    pub async fn entries(&self) -> Vec<LogEntry> {
        self.log
            .read()
            .await
            .entries
            .iter()
            .map(|(id, msg)| LogEntry::new(*id, msg.clone()))
            .collect()
    }

    /// Number of entries in the log
    pub async fn len(&self) -> usize {
        self.log.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.log.read().await.entries.is_empty()
    }

    /// Highest committed id
    pub async fn committed_id(&self) -> OpId {
        self.log.read().await.committed
    }
}

#[async_trait::async_trait]
impl LogStore for MemoryLogStore {
    async fn bootstrap_info(&self) -> Result<BootstrapInfo> {
        let log = self.log.read().await;
        BootstrapInfo::from_log(log.last_id(), log.committed)
    }

    async fn append(&self, entries: &[LogEntry]) -> Result<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(Error::LogStore("Log is read-only".into()));
        }

        let mut log = self.log.write().await;
        let mut last = log.last_id();
        for entry in entries {
            if entry.id <= last {
                return Err(Error::LogStore(format!(
                    "Append of {} does not follow last id {}",
                    entry.id, last
                )));
            }
            last = entry.id;
        }

        for entry in entries {
            log.entries.insert(entry.id, entry.msg.clone());
        }

        Ok(())
    }

    async fn read_after(&self, after: OpId, max: usize) -> Result<Vec<LogEntry>> {
        let log = self.log.read().await;
        Ok(log
            .entries
            .range((Bound::Excluded(after), Bound::Unbounded))
            .take(max)
            .map(|(id, msg)| LogEntry::new(*id, msg.clone()))
            .collect())
    }

    async fn contains(&self, id: OpId) -> Result<bool> {
        Ok(self.log.read().await.entries.contains_key(&id))
    }

    async fn mark_committed(&self, id: OpId) -> Result<()> {
        let mut log = self.log.write().await;
        if id > log.last_id() {
            return Err(Error::LogStore(format!(
                "Cannot commit {} past the end of the log ({})",
                id,
                log.last_id()
            )));
        }
        if id > log.committed {
            log.committed = id;
        }
        Ok(())
    }

    async fn truncate_after(&self, id: OpId) -> Result<()> {
        let mut log = self.log.write().await;
        if id < log.committed {
            return Err(Error::LogStore(format!(
                "Cannot truncate committed entries after {} (committed: {})",
                id, log.committed
            )));
        }
        log.entries.retain(|entry_id, _| *entry_id <= id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(term: u64, index: u64) -> LogEntry {
        LogEntry::new(OpId::new(term, index), ReplicateMsg::write(vec![index as u8]))
    }

    #[tokio::test]
    async fn test_empty_store_bootstrap() {
        let store = MemoryLogStore::new();
        let info = store.bootstrap_info().await.unwrap();
        assert!(info.last_id().is_min());
        assert!(info.last_committed_id().is_min());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_append_and_commit() {
        let store = MemoryLogStore::new();
        store.append(&[entry(1, 1), entry(1, 2)]).await.unwrap();
        store.mark_committed(OpId::new(1, 1)).await.unwrap();

        let info = store.bootstrap_info().await.unwrap();
        assert_eq!(info.last_id(), OpId::new(1, 2));
        assert_eq!(info.last_committed_id(), OpId::new(1, 1));

        // Commit never moves backwards
        store.mark_committed(OpId::MIN).await.unwrap();
        assert_eq!(store.committed_id().await, OpId::new(1, 1));
    }

    #[tokio::test]
    async fn test_append_out_of_order_rejected() {
        let store = MemoryLogStore::new();
        store.append(&[entry(2, 5)]).await.unwrap();

        assert!(store.append(&[entry(2, 4)]).await.is_err());
        assert!(store.append(&[entry(2, 6), entry(2, 6)]).await.is_err());
        // A rejected batch leaves nothing behind
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_commit_past_end_rejected() {
        let store = MemoryLogStore::new();
        store.append(&[entry(1, 1)]).await.unwrap();
        assert!(store.mark_committed(OpId::new(1, 2)).await.is_err());
    }

    #[tokio::test]
    async fn test_truncate_uncommitted_suffix() {
        let store = MemoryLogStore::new();
        store
            .append(&[entry(1, 1), entry(1, 2), entry(1, 3)])
            .await
            .unwrap();
        store.mark_committed(OpId::new(1, 1)).await.unwrap();

        store.truncate_after(OpId::new(1, 1)).await.unwrap();
        let entries = store.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, OpId::new(1, 1));

        assert!(store.truncate_after(OpId::MIN).await.is_err());
    }

    #[tokio::test]
    async fn test_read_after_and_contains() {
        let store = MemoryLogStore::new();
        store
            .append(&[entry(1, 1), entry(1, 2), entry(2, 3), entry(2, 4)])
            .await
            .unwrap();

        let tail = store.read_after(OpId::new(1, 2), 10).await.unwrap();
        let ids: Vec<OpId> = tail.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![OpId::new(2, 3), OpId::new(2, 4)]);

        let limited = store.read_after(OpId::MIN, 2).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].id, OpId::new(1, 1));

        assert!(store.contains(OpId::new(2, 3)).await.unwrap());
        assert!(!store.contains(OpId::new(1, 3)).await.unwrap());
    }

    #[tokio::test]
    async fn test_read_only_rejects_appends() {
        let store = MemoryLogStore::new();
        store.set_read_only(true);
        assert!(store.append(&[entry(1, 1)]).await.is_err());
        store.set_read_only(false);
        store.append(&[entry(1, 1)]).await.unwrap();
    }

    #[tokio::test]
    async fn test_recovered_store() {
        let store = MemoryLogStore::recovered(
            vec![entry(3, 5), entry(3, 6), entry(3, 7)],
            OpId::new(3, 5),
        )
        .unwrap();

        let info = store.bootstrap_info().await.unwrap();
        assert_eq!(info.last_id(), OpId::new(3, 7));
        assert_eq!(info.last_committed_id(), OpId::new(3, 5));

        assert!(MemoryLogStore::recovered(vec![entry(1, 2), entry(1, 1)], OpId::MIN).is_err());
        assert!(MemoryLogStore::recovered(vec![entry(1, 1)], OpId::new(1, 2)).is_err());
    }
}
