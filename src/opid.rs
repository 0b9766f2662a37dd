//! Operation Ids
//!
//! Every replicated operation is identified by the term it was assigned
//! in and its position in the log.

use serde::{Deserialize, Serialize};

/// Leadership epoch
pub type Term = u64;

/// Position of an operation in the replicated log.
///
/// Ordering is lexicographic on `(term, index)`; field order matters for the
/// derived `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct OpId {
    /// Term under which the operation was assigned its position
    pub term: Term,
    /// Log index
    pub index: u64,
}

impl OpId {
    /// Sentinel that compares less than every real id
    pub const MIN: OpId = OpId { term: 0, index: 0 };

    /// Create a new op id
    pub const fn new(term: Term, index: u64) -> Self {
        Self { term, index }
    }

    /// Check if this is the minimum sentinel
    pub fn is_min(&self) -> bool {
        *self == Self::MIN
    }
}

impl std::fmt::Display for OpId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.term, self.index)
    }
}

impl From<(Term, u64)> for OpId {
    fn from((term, index): (Term, u64)) -> Self {
        Self { term, index }
    }
}
