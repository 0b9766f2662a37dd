//! Log Entry Types
//!
//! Defines the operation envelope that is proposed, replicated and
//! appended to the log.

use serde::{Deserialize, Serialize};

use crate::opid::OpId;

/// Kind of replicated operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    /// Empty operation, used by a new leader to commit entries of prior terms
    NoOp,
    /// Write produced by the query layer
    Write,
    /// Replica set change
    ChangeConfig,
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationType::NoOp => write!(f, "NO_OP"),
            OperationType::Write => write!(f, "WRITE"),
            OperationType::ChangeConfig => write!(f, "CHANGE_CONFIG"),
        }
    }
}

/// Operation envelope: the unit of replication.
///
/// The payload is opaque to consensus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicateMsg {
    op_type: OperationType,
    payload: Vec<u8>,
}

impl ReplicateMsg {
    /// Create a new envelope
    pub fn new(op_type: OperationType, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            op_type,
            payload: payload.into(),
        }
    }

    /// Create a write envelope
    pub fn write(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(OperationType::Write, payload)
    }

    /// Create a no-op envelope
    pub fn no_op() -> Self {
        Self::new(OperationType::NoOp, Vec::new())
    }

    pub fn op_type(&self) -> OperationType {
        self.op_type
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Size of the payload in bytes
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

/// An envelope at its assigned log position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: OpId,
    pub msg: ReplicateMsg,
}

impl LogEntry {
    pub fn new(id: OpId, msg: ReplicateMsg) -> Self {
        Self { id, msg }
    }
}
