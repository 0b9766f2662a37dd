//! Consensus Rounds
//!
//! A round tracks one envelope from proposal until it is either committed
//! or aborted. The completion callback runs at most once.

use std::sync::{Arc, Mutex, OnceLock, Weak};

use super::Consensus;
use crate::error::{Error, Result};
use crate::log::ReplicateMsg;
use crate::opid::{OpId, Term};

/// Completion callback, invoked with the outcome of replication
pub type ReplicatedCallback = Box<dyn FnOnce(Result<()>) + Send + 'static>;

/// One in-flight replication of an operation
pub struct ConsensusRound {
    /// Owning consensus instance (non-owning)
    consensus: Weak<Consensus>,
    /// Envelope being replicated
    replicate_msg: ReplicateMsg,
    /// Id assigned by the leader when the round is replicated
    id: OnceLock<OpId>,
    /// Completion callback; taken on first notification
    replicated_cb: Mutex<Option<ReplicatedCallback>>,
    /// If set, the round is only valid in this term
    bound_term: Option<Term>,
}

impl ConsensusRound {
    /// Create a round with a completion callback
    pub fn new(
        consensus: Weak<Consensus>,
        replicate_msg: ReplicateMsg,
        replicated_cb: Option<ReplicatedCallback>,
    ) -> Self {
        Self {
            consensus,
            replicate_msg,
            id: OnceLock::new(),
            replicated_cb: Mutex::new(replicated_cb),
            bound_term: None,
        }
    }

    /// Restrict the round to `term`. Must happen before the round is shared.
    pub fn bind_to_term(&mut self, term: Term) {
        self.bound_term = Some(term);
    }

    /// Builder form of [`bind_to_term`](Self::bind_to_term)
    pub fn bound_to(mut self, term: Term) -> Self {
        self.bind_to_term(term);
        self
    }

    pub fn bound_term(&self) -> Option<Term> {
        self.bound_term
    }

    pub fn replicate_msg(&self) -> &ReplicateMsg {
        &self.replicate_msg
    }

    /// Id assigned at replication time, if any
    pub fn id(&self) -> Option<OpId> {
        self.id.get().copied()
    }

    /// Assign the log position. Fails if the round was already replicated.
    pub(crate) fn assign_id(&self, id: OpId) -> Result<()> {
        self.id.set(id).map_err(|_| {
            Error::IllegalState(format!(
                "Round already replicated as {}",
                self.id().unwrap_or(OpId::MIN)
            ))
        })
    }

    /// The consensus instance this round belongs to, if it is still alive
    pub fn consensus(&self) -> Option<Arc<Consensus>> {
        self.consensus.upgrade()
    }

    /// Verify the round may still be replicated in `current_term`
    pub fn check_bound_term(&self, current_term: Term) -> Result<()> {
        match self.bound_term {
            Some(bound_term) if bound_term != current_term => Err(Error::TermMismatch {
                bound_term,
                current_term,
            }),
            _ => Ok(()),
        }
    }

    /// Deliver the outcome to the callback.
    ///
    /// Only the first call has an effect; rounds without a callback ignore
    /// every call.
    pub fn notify_replication_finished(&self, status: Result<()>) {
        let callback = self
            .replicated_cb
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if let Some(callback) = callback {
            callback(status);
        }
    }

    /// True once the callback has fired (or if there never was one)
    pub fn is_finished(&self) -> bool {
        self.replicated_cb
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_none()
    }
}

impl std::fmt::Debug for ConsensusRound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsensusRound")
            .field("id", &self.id())
            .field("op_type", &self.replicate_msg.op_type())
            .field("bound_term", &self.bound_term)
            .field("finished", &self.is_finished())
            .finish()
    }
}
