//! Replication Protocol
//!
//! Messages the consensus core hands to the transport and receives back.

use serde::{Deserialize, Serialize};

use crate::log::LogEntry;
use crate::opid::{OpId, Term};

/// Protocol messages for node communication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Replicate operations (from leader to followers)
    Replicate {
        term: Term,
        leader_id: String,
        /// Id of the entry immediately before `ops`
        preceding_id: OpId,
        ops: Vec<LogEntry>,
        committed_id: OpId,
    },

    /// Replicate response (from follower to leader)
    ReplicateResponse {
        node_id: String,
        term: Term,
        last_received: OpId,
        success: bool,
    },
}

impl Message {
    /// Serialize message to bytes
    pub fn serialize(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize message from bytes
    pub fn deserialize(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }

    /// Get the message type name (for logging)
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::Replicate { .. } => "Replicate",
            Message::ReplicateResponse { .. } => "ReplicateResponse",
        }
    }

    /// Term carried by the message
    pub fn term(&self) -> Term {
        match self {
            Message::Replicate { term, .. } | Message::ReplicateResponse { term, .. } => *term,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::ReplicateMsg;

    #[test]
    fn test_message_serialization() {
        let msg = Message::Replicate {
            term: 4,
            leader_id: "node-1".to_string(),
            preceding_id: OpId::new(4, 9),
            ops: vec![LogEntry::new(OpId::new(4, 10), ReplicateMsg::write(b"x=1".to_vec()))],
            committed_id: OpId::new(4, 8),
        };

        let bytes = msg.serialize().unwrap();
        let restored = Message::deserialize(&bytes).unwrap();

        assert_eq!(restored, msg);
        assert_eq!(restored.type_name(), "Replicate");
        assert_eq!(restored.term(), 4);
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(Message::deserialize(&[0xff, 0xff, 0xff]).is_err());
    }
}
