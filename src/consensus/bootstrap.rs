//! Bootstrap Info
//!
//! Recovery summary of the persisted log, computed once at startup.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::opid::OpId;

/// What the log store knows about the log after a restart.
///
/// Always satisfies `last_committed_id <= last_id`. Fields are private so
/// the summary cannot change once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapInfo {
    last_id: OpId,
    last_committed_id: OpId,
}

impl BootstrapInfo {
    /// Summary of an empty log
    pub fn new() -> Self {
        Self {
            last_id: OpId::MIN,
            last_committed_id: OpId::MIN,
        }
    }

    /// Summary reported by the log store
    pub fn from_log(last_id: OpId, last_committed_id: OpId) -> Result<Self> {
        if last_committed_id > last_id {
            return Err(Error::Bootstrap(format!(
                "last committed id {} is ahead of last id {}",
                last_committed_id, last_id
            )));
        }
        Ok(Self {
            last_id,
            last_committed_id,
        })
    }

    /// Highest id present in the log, possibly uncommitted
    pub fn last_id(&self) -> OpId {
        self.last_id
    }

    /// Highest id known to be committed
    pub fn last_committed_id(&self) -> OpId {
        self.last_committed_id
    }

    pub fn is_empty_log(&self) -> bool {
        self.last_id.is_min()
    }

    /// True if some appended entries were never known to commit
    pub fn has_uncommitted_suffix(&self) -> bool {
        self.last_committed_id < self.last_id
    }

    /// Bounds `(exclusive start, inclusive end)` of the suffix that must be
    /// committed or truncated before new proposals are accepted.
    pub fn uncommitted_range(&self) -> Option<(OpId, OpId)> {
        self.has_uncommitted_suffix()
            .then_some((self.last_committed_id, self.last_id))
    }
}

impl Default for BootstrapInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BootstrapInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "last_id={} last_committed_id={}",
            self.last_id, self.last_committed_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_summary_is_minimum() {
        let info = BootstrapInfo::new();
        assert_eq!(info.last_id(), OpId::MIN);
        assert_eq!(info.last_committed_id(), OpId::MIN);
        assert_eq!(info.last_committed_id(), info.last_id());
        assert!(info.is_empty_log());
        assert!(!info.has_uncommitted_suffix());
        assert_eq!(info.uncommitted_range(), None);
    }

    #[test]
    fn test_recovered_summary_with_uncommitted_suffix() {
        let info = BootstrapInfo::from_log(OpId::new(3, 7), OpId::new(3, 5)).unwrap();
        assert!(info.last_committed_id() < info.last_id());
        assert!(info.has_uncommitted_suffix());
        assert_eq!(
            info.uncommitted_range(),
            Some((OpId::new(3, 5), OpId::new(3, 7)))
        );

        // Copies are independent values; mutating one leaves the other alone
        let copy = info;
        assert_eq!(copy, info);
        assert_eq!(info.to_string(), "last_id=3.7 last_committed_id=3.5");
    }

    #[test]
    fn test_committed_ahead_of_last_rejected() {
        let err = BootstrapInfo::from_log(OpId::new(2, 1), OpId::new(2, 2)).unwrap_err();
        assert!(matches!(err, Error::Bootstrap(_)));
    }

    #[test]
    fn test_committed_never_exceeds_last() {
        let ids = [OpId::MIN, OpId::new(1, 1), OpId::new(1, 2), OpId::new(2, 1)];
        for last in ids {
            for committed in ids {
                if let Ok(info) = BootstrapInfo::from_log(last, committed) {
                    assert!(info.last_committed_id() <= info.last_id());
                }
            }
        }
    }
}
