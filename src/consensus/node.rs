//! Consensus Node
//!
//! Accepts operations for replication, tracks each one as a
//! [`ConsensusRound`] until a majority of the replica set has it, and
//! brackets every lifecycle transition with fault hooks.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, RwLock};

use super::hooks::{FaultHooks, HookPoint};
use super::protocol::Message;
use super::round::{ConsensusRound, ReplicatedCallback};
use super::{BootstrapInfo, LifecyclePhase, ReplicaRole};
use crate::config::{self, ConsensusConfig};
use crate::error::{Error, Result};
use crate::log::{LogEntry, LogStore, OperationType, ReplicateMsg};
use crate::opid::{OpId, Term};

/// Rounds with a known outcome, notified once all locks are released
type Resolved = Vec<(Arc<ConsensusRound>, Result<()>)>;

/// Mutable replica state
struct ReplicaState {
    phase: LifecyclePhase,
    role: ReplicaRole,
    term: Term,
    leader_id: Option<String>,
    /// Other members of the replica set
    peers: Vec<String>,
    /// Index assigned to the next replicated operation
    next_index: u64,
    /// Highest id in the local log
    last_received: OpId,
    /// Highest committed id
    committed: OpId,
}

/// Point-in-time view of a consensus instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusStatus {
    pub node_id: String,
    pub phase: LifecyclePhase,
    pub role: ReplicaRole,
    pub term: Term,
    pub leader_id: Option<String>,
    pub last_received_id: OpId,
    pub committed_id: OpId,
    pub pending_rounds: usize,
}

/// Consensus participant
pub struct Consensus {
    /// Node ID
    node_id: String,
    /// Handle given to rounds as their back-reference
    me: Weak<Consensus>,
    /// Fixed ack count for commit (0 = majority)
    min_quorum: usize,
    /// Maximum ops per catch-up request
    max_batch_ops: usize,
    /// Used by `replicate_and_wait`
    replication_timeout: Duration,
    /// Lifecycle, role, term and log positions
    state: RwLock<ReplicaState>,
    /// Replicated rounds awaiting commit
    pending: RwLock<BTreeMap<OpId, Arc<ConsensusRound>>>,
    /// Highest id acknowledged by each peer
    match_ids: RwLock<HashMap<String, OpId>>,
    /// Installed fault hooks
    fault_hooks: RwLock<Option<Arc<dyn FaultHooks>>>,
    /// Recovery summary, set once by `start`
    bootstrap: OnceLock<BootstrapInfo>,
    /// Durable log collaborator
    log_store: Arc<dyn LogStore>,
    /// Message sender for outbound messages
    message_tx: mpsc::Sender<(String, Message)>,
}

impl Consensus {
    /// Create a new consensus instance. Fails if `config` does not validate.
    pub fn new(
        config: &ConsensusConfig,
        log_store: Arc<dyn LogStore>,
        message_tx: mpsc::Sender<(String, Message)>,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        Ok(Arc::new_cyclic(|me| Self {
            node_id: config.node.id.clone(),
            me: me.clone(),
            min_quorum: config.cluster.min_quorum,
            max_batch_ops: config.cluster.max_batch_ops,
            replication_timeout: config.replication_timeout(),
            state: RwLock::new(ReplicaState {
                phase: LifecyclePhase::Uninitialized,
                role: ReplicaRole::Follower,
                term: 0,
                leader_id: None,
                peers: config.cluster.peers.clone(),
                next_index: 1,
                last_received: OpId::MIN,
                committed: OpId::MIN,
            }),
            pending: RwLock::new(BTreeMap::new()),
            match_ids: RwLock::new(HashMap::new()),
            fault_hooks: RwLock::new(None),
            bootstrap: OnceLock::new(),
            log_store,
            message_tx,
        }))
    }

    /// Create an instance together with its outbound message queue, sized
    /// by `cluster.outbound_capacity`
    pub fn with_outbound(
        config: &ConsensusConfig,
        log_store: Arc<dyn LogStore>,
    ) -> Result<(Arc<Self>, mpsc::Receiver<(String, Message)>)> {
        config.validate()?;
        let (message_tx, message_rx) = mpsc::channel(config.cluster.outbound_capacity);
        Ok((Self::new(config, log_store, message_tx)?, message_rx))
    }

    // ========== Rounds ==========

    /// Create a round for `msg`. The round is not replicated until it is
    /// passed to [`replicate`](Self::replicate).
    pub fn new_round<F>(&self, msg: ReplicateMsg, replicated_cb: F) -> ConsensusRound
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let replicated_cb: ReplicatedCallback = Box::new(replicated_cb);
        ConsensusRound::new(self.me.clone(), msg, Some(replicated_cb))
    }

    fn new_internal_round(&self, msg: ReplicateMsg) -> ConsensusRound {
        ConsensusRound::new(self.me.clone(), msg, None)
    }

    fn finish(resolved: Resolved) {
        for (round, status) in resolved {
            round.notify_replication_finished(status);
        }
    }

    // ========== Fault hooks ==========

    /// Install (or with `None`, remove) the fault hooks. Replaces any
    /// previously installed hooks.
    pub async fn set_fault_hooks(&self, hooks: Option<Arc<dyn FaultHooks>>) {
        *self.fault_hooks.write().await = hooks;
    }

    pub async fn fault_hooks(&self) -> Option<Arc<dyn FaultHooks>> {
        self.fault_hooks.read().await.clone()
    }

    /// Run the hook for `point`. Succeeds immediately when no hooks are
    /// installed.
    pub async fn execute_hook(&self, point: HookPoint) -> Result<()> {
        // Snapshot so the lock is not held while the hook runs
        let hooks = match self.fault_hooks.read().await.clone() {
            Some(hooks) => hooks,
            None => return Ok(()),
        };

        match point {
            HookPoint::PreStart => hooks.pre_start().await,
            HookPoint::PostStart => hooks.post_start().await,
            HookPoint::PreConfigChange => hooks.pre_config_change().await,
            HookPoint::PostConfigChange => hooks.post_config_change().await,
            HookPoint::PreReplicate => hooks.pre_replicate().await,
            HookPoint::PostReplicate => hooks.post_replicate().await,
            HookPoint::PreUpdate => hooks.pre_update().await,
            HookPoint::PostUpdate => hooks.post_update().await,
            HookPoint::PreShutdown => hooks.pre_shutdown().await,
            HookPoint::PostShutdown => hooks.post_shutdown().await,
        }
    }

    // ========== Lifecycle ==========

    /// Load the bootstrap summary and seed term and commit state from it
    pub async fn start(&self) -> Result<()> {
        self.execute_hook(HookPoint::PreStart).await?;

        {
            let mut state = self.state.write().await;
            if state.phase != LifecyclePhase::Uninitialized {
                return Err(Error::IllegalState(format!(
                    "Cannot start while {}",
                    state.phase
                )));
            }
            state.phase = LifecyclePhase::Starting;
        }

        let info = match self.log_store.bootstrap_info().await {
            Ok(info) => info,
            Err(e) => {
                self.state.write().await.phase = LifecyclePhase::Uninitialized;
                return Err(e);
            }
        };
        // Only one caller gets past the Uninitialized check
        let _ = self.bootstrap.set(info);

        {
            let mut state = self.state.write().await;
            state.term = info.last_id().term;
            state.last_received = info.last_id();
            state.committed = info.last_committed_id();
            state.next_index = info.last_id().index + 1;
            state.phase = LifecyclePhase::Running;
        }

        if let Some((after, up_to)) = info.uncommitted_range() {
            tracing::warn!(
                "Ops after {} up to {} were never committed and must be resolved",
                after,
                up_to
            );
        }
        tracing::info!("Consensus started on {} ({})", self.node_id, info);

        self.execute_hook(HookPoint::PostStart).await
    }

    /// Replace the replica set.
    ///
    /// A leader replicates the new configuration as a `ChangeConfig` op;
    /// commit of pending rounds is then judged against the new majority.
    pub async fn change_config(&self, peers: Vec<String>) -> Result<()> {
        if peers.iter().any(|p| p == &self.node_id) {
            return Err(Error::Config(format!(
                "Replica set must not list this node ({}) as a peer",
                self.node_id
            )));
        }

        self.execute_hook(HookPoint::PreConfigChange).await?;

        let (is_leader, previous_peers) = {
            let mut state = self.state.write().await;
            if state.phase != LifecyclePhase::Running {
                return Err(Error::IllegalState(format!(
                    "Cannot change config while {}",
                    state.phase
                )));
            }
            state.phase = LifecyclePhase::ConfigChanging;
            let previous_peers = std::mem::replace(&mut state.peers, peers.clone());
            (state.role == ReplicaRole::Leader, previous_peers)
        };

        let previous_matches = {
            let mut matches = self.match_ids.write().await;
            let previous = matches.clone();
            matches.retain(|peer, _| peers.contains(peer));
            previous
        };

        // The new membership stands once its op is in the log
        let (result, applied) = if is_leader {
            match bincode::serialize(&peers) {
                Ok(payload) => {
                    let round = Arc::new(self.new_internal_round(ReplicateMsg::new(
                        OperationType::ChangeConfig,
                        payload,
                    )));
                    let result = self.replicate(Arc::clone(&round)).await.map(|_| ());
                    (result, round.id().is_some())
                }
                Err(e) => (Err(e.into()), false),
            }
        } else {
            (Ok(()), true)
        };

        {
            let mut state = self.state.write().await;
            if !applied {
                state.peers = previous_peers.clone();
            }
            if state.phase == LifecyclePhase::ConfigChanging {
                state.phase = LifecyclePhase::Running;
            }
        }

        if !applied {
            let mut matches = self.match_ids.write().await;
            let mut restored = previous_matches;
            for (peer, matched) in matches.drain() {
                if previous_peers.contains(&peer) {
                    let entry = restored.entry(peer).or_insert(OpId::MIN);
                    if matched > *entry {
                        *entry = matched;
                    }
                }
            }
            *matches = restored;
            tracing::warn!(
                "Replica set change of {} rolled back to {:?}",
                self.node_id,
                previous_peers
            );
        }
        result?;

        tracing::info!("Replica set of {} changed to {:?}", self.node_id, peers);

        self.execute_hook(HookPoint::PostConfigChange).await
    }

    /// Abort every in-flight round and stop
    pub async fn shutdown(&self) -> Result<()> {
        if self.phase().await == LifecyclePhase::Stopped {
            return Ok(());
        }

        self.execute_hook(HookPoint::PreShutdown).await?;

        let drained = {
            let mut state = self.state.write().await;
            if state.phase == LifecyclePhase::Stopped {
                return Ok(());
            }
            state.phase = LifecyclePhase::ShuttingDown;
            std::mem::take(&mut *self.pending.write().await)
        };

        if !drained.is_empty() {
            tracing::warn!("Aborting {} in-flight rounds on shutdown", drained.len());
        }
        Self::finish(
            drained
                .into_values()
                .map(|round| (round, Err(Error::ShuttingDown)))
                .collect(),
        );

        self.state.write().await.phase = LifecyclePhase::Stopped;
        tracing::info!("Consensus on {} stopped", self.node_id);

        self.execute_hook(HookPoint::PostShutdown).await
    }

    fn ensure_active(state: &ReplicaState) -> Result<()> {
        match state.phase {
            LifecyclePhase::Running | LifecyclePhase::ConfigChanging => Ok(()),
            phase => Err(Error::IllegalState(format!("Consensus is {}", phase))),
        }
    }

    // ========== Terms and roles ==========

    /// Adopt a higher term: step down and abort every pending round
    async fn adopt_term(&self, state: &mut ReplicaState, term: Term) -> Resolved {
        let previous = state.term;
        state.term = term;
        state.role = ReplicaRole::Follower;
        state.leader_id = None;

        let drained = std::mem::take(&mut *self.pending.write().await);
        tracing::info!(
            "Term advanced from {} to {} on {}, aborting {} in-flight rounds",
            previous,
            term,
            self.node_id,
            drained.len()
        );

        drained
            .into_iter()
            .map(|(id, round)| {
                let bound_term = round.bound_term().unwrap_or(id.term);
                let status = Err(Error::TermMismatch {
                    bound_term,
                    current_term: term,
                });
                (round, status)
            })
            .collect()
    }

    /// Move to `term` if it is newer than the current one. Returns whether
    /// the term changed.
    pub async fn advance_term(&self, term: Term) -> bool {
        let resolved = {
            let mut state = self.state.write().await;
            if term <= state.term {
                return false;
            }
            self.adopt_term(&mut state, term).await
        };
        Self::finish(resolved);
        true
    }

    /// Take over leadership for `term`, as decided by the election layer.
    ///
    /// Replicates a no-op in the new term so that ops left over from earlier
    /// terms commit with it. Returns the id of the no-op.
    pub async fn become_leader(&self, term: Term) -> Result<OpId> {
        let resolved = {
            let mut state = self.state.write().await;
            Self::ensure_active(&state)?;
            if term < state.term {
                return Err(Error::IllegalState(format!(
                    "Cannot lead term {} behind current term {}",
                    term, state.term
                )));
            }

            let resolved = if term > state.term {
                self.adopt_term(&mut state, term).await
            } else {
                Vec::new()
            };

            state.role = ReplicaRole::Leader;
            state.leader_id = Some(self.node_id.clone());
            self.match_ids.write().await.clear();
            resolved
        };
        Self::finish(resolved);

        tracing::info!("{} became LEADER for term {}", self.node_id, term);

        let round = Arc::new(self.new_internal_round(ReplicateMsg::no_op()).bound_to(term));
        self.replicate(round).await
    }

    /// Follow `leader_id` in `term`. Stepping down from leadership aborts
    /// every pending round.
    pub async fn become_follower(&self, term: Term, leader_id: &str) -> Result<()> {
        let resolved = {
            let mut state = self.state.write().await;
            Self::ensure_active(&state)?;
            if term < state.term {
                return Err(Error::IllegalState(format!(
                    "Cannot follow term {} behind current term {}",
                    term, state.term
                )));
            }

            let resolved = if term > state.term {
                self.adopt_term(&mut state, term).await
            } else if state.role == ReplicaRole::Leader {
                let drained = std::mem::take(&mut *self.pending.write().await);
                tracing::info!("{} stepping down in term {}", self.node_id, term);
                drained
                    .into_values()
                    .map(|round| {
                        let status = Err(Error::Aborted(format!(
                            "Leader stepped down in term {}",
                            term
                        )));
                        (round, status)
                    })
                    .collect()
            } else {
                Vec::new()
            };

            state.role = ReplicaRole::Follower;
            state.leader_id = Some(leader_id.to_string());
            resolved
        };
        Self::finish(resolved);
        Ok(())
    }

    // ========== Leader: replicate and commit ==========

    /// Replicate a round.
    ///
    /// Assigns the next id in the current term, appends the op to the log
    /// and sends it to every peer. The round's callback fires once a
    /// majority has the op, or with an abort if the term changes first.
    pub async fn replicate(&self, round: Arc<ConsensusRound>) -> Result<OpId> {
        self.execute_hook(HookPoint::PreReplicate).await?;

        let (entry, preceding_id, committed_id, term, peers) = {
            let mut state = self.state.write().await;
            Self::ensure_active(&state)?;
            if state.role != ReplicaRole::Leader {
                return Err(Error::NotLeader(state.role.to_string()));
            }
            if let Some(id) = round.id() {
                return Err(Error::IllegalState(format!(
                    "Round already replicated as {}",
                    id
                )));
            }

            // Leadership may have changed since the round was created
            round.check_bound_term(state.term)?;

            let entry = LogEntry::new(
                OpId::new(state.term, state.next_index),
                round.replicate_msg().clone(),
            );
            self.log_store
                .append(std::slice::from_ref(&entry))
                .await?;
            round.assign_id(entry.id)?;
            self.pending
                .write()
                .await
                .insert(entry.id, Arc::clone(&round));

            let preceding_id = state.last_received;
            state.last_received = entry.id;
            state.next_index = entry.id.index + 1;

            (entry, preceding_id, state.committed, state.term, state.peers.clone())
        };

        let id = entry.id;
        tracing::debug!(
            "Replicating {} ({}, {} bytes)",
            id,
            entry.msg.op_type(),
            entry.msg.size()
        );

        let msg = Message::Replicate {
            term,
            leader_id: self.node_id.clone(),
            preceding_id,
            ops: vec![entry],
            committed_id,
        };
        for peer in &peers {
            self.send(peer, msg.clone()).await;
        }

        self.check_commit_progress().await?;

        self.execute_hook(HookPoint::PostReplicate).await?;
        Ok(id)
    }

    /// Replicate `msg` and wait for the outcome, up to the configured
    /// replication timeout
    pub async fn replicate_and_wait(&self, msg: ReplicateMsg) -> Result<OpId> {
        let (tx, rx) = oneshot::channel();
        let round = Arc::new(self.new_round(msg, move |status| {
            let _ = tx.send(status);
        }));

        let id = self.replicate(Arc::clone(&round)).await?;

        match tokio::time::timeout(self.replication_timeout, rx).await {
            Ok(Ok(status)) => status.map(|_| id),
            Ok(Err(_)) => Err(Error::Aborted(format!("Round {} dropped", id))),
            Err(_) => {
                // A commit may race this; only the first notification counts
                round.notify_replication_finished(Err(Error::Aborted(format!(
                    "Replication of {} timed out",
                    id
                ))));
                self.pending.write().await.remove(&id);
                Err(Error::Aborted(format!("Replication of {} timed out", id)))
            }
        }
    }

    /// Handle a replicate response from a follower
    pub async fn handle_replicate_response(
        &self,
        node_id: &str,
        term: Term,
        last_received: OpId,
        success: bool,
    ) -> Result<()> {
        {
            let state = self.state.read().await;
            if term > state.term {
                drop(state);
                // Someone has seen a newer leader; we are stale
                self.advance_term(term).await;
                return Ok(());
            }
            if state.role != ReplicaRole::Leader || term < state.term {
                tracing::debug!(
                    "Ignoring response from {} for term {} (current: {})",
                    node_id,
                    term,
                    state.term
                );
                return Ok(());
            }
            if !state.peers.iter().any(|p| p == node_id) {
                tracing::debug!("Ignoring response from non-member {}", node_id);
                return Ok(());
            }
        }

        if success {
            {
                let mut matches = self.match_ids.write().await;
                let matched = matches.entry(node_id.to_string()).or_insert(OpId::MIN);
                if last_received > *matched {
                    *matched = last_received;
                }
            }
            self.check_commit_progress().await
        } else {
            self.send_catch_up(node_id, last_received).await
        }
    }

    /// Commit every pending round acknowledged by a quorum
    async fn check_commit_progress(&self) -> Result<()> {
        let resolved = {
            let mut state = self.state.write().await;
            if state.role != ReplicaRole::Leader {
                return Ok(());
            }

            let mut ids: Vec<OpId> = {
                let matches = self.match_ids.read().await;
                state
                    .peers
                    .iter()
                    .map(|peer| matches.get(peer).copied().unwrap_or(OpId::MIN))
                    .collect()
            };
            // Include ourselves in the count
            ids.push(state.last_received);
            ids.sort_unstable();

            let quorum = self.quorum_for(state.peers.len());
            let new_commit = ids[ids.len() - quorum];

            // Only ops of the current term are committed by counting acks
            if new_commit <= state.committed || new_commit.term != state.term {
                return Ok(());
            }

            self.log_store.mark_committed(new_commit).await?;
            state.committed = new_commit;

            let mut pending = self.pending.write().await;
            let still_pending =
                pending.split_off(&OpId::new(new_commit.term, new_commit.index + 1));
            let committed = std::mem::replace(&mut *pending, still_pending);

            tracing::debug!(
                "Committed up to {} ({} rounds)",
                new_commit,
                committed.len()
            );

            committed
                .into_values()
                .map(|round| {
                    let status = round.check_bound_term(state.term);
                    (round, status)
                })
                .collect::<Resolved>()
        };

        Self::finish(resolved);
        Ok(())
    }

    /// Resend ops a follower is missing
    async fn send_catch_up(&self, node_id: &str, after: OpId) -> Result<()> {
        let (term, committed_id) = {
            let state = self.state.read().await;
            (state.term, state.committed)
        };

        let ops = self.log_store.read_after(after, self.max_batch_ops).await?;
        tracing::debug!("Catching up {} after {} ({} ops)", node_id, after, ops.len());

        let msg = Message::Replicate {
            term,
            leader_id: self.node_id.clone(),
            preceding_id: after,
            ops,
            committed_id,
        };
        self.send(node_id, msg).await;
        Ok(())
    }

    /// Send an empty replicate to every peer, carrying the commit point
    pub async fn send_heartbeats(&self) -> Result<()> {
        let (msg, peers) = {
            let state = self.state.read().await;
            if state.role != ReplicaRole::Leader {
                return Err(Error::NotLeader(state.role.to_string()));
            }
            let msg = Message::Replicate {
                term: state.term,
                leader_id: self.node_id.clone(),
                preceding_id: state.last_received,
                ops: Vec::new(),
                committed_id: state.committed,
            };
            (msg, state.peers.clone())
        };

        for peer in &peers {
            self.send(peer, msg.clone()).await;
        }
        Ok(())
    }

    async fn send(&self, peer: &str, msg: Message) {
        let type_name = msg.type_name();
        if self.message_tx.send((peer.to_string(), msg)).await.is_err() {
            tracing::warn!("Outbound channel closed, dropping {} for {}", type_name, peer);
        }
    }

    // ========== Follower: update ==========

    /// Apply a replicate request from the leader and build the response
    pub async fn update(&self, request: Message) -> Result<Message> {
        let (term, leader_id, preceding_id, ops, committed_id) = match request {
            Message::Replicate {
                term,
                leader_id,
                preceding_id,
                ops,
                committed_id,
            } => (term, leader_id, preceding_id, ops, committed_id),
            other => {
                return Err(Error::IllegalState(format!(
                    "Cannot apply {} as an update",
                    other.type_name()
                )))
            }
        };

        self.execute_hook(HookPoint::PreUpdate).await?;

        let mut resolved = Vec::new();
        let result = self
            .apply_update(term, leader_id, preceding_id, ops, committed_id, &mut resolved)
            .await;
        Self::finish(resolved);
        let response = result?;

        self.execute_hook(HookPoint::PostUpdate).await?;
        Ok(response)
    }

    async fn apply_update(
        &self,
        term: Term,
        leader_id: String,
        preceding_id: OpId,
        ops: Vec<LogEntry>,
        committed_id: OpId,
        resolved: &mut Resolved,
    ) -> Result<Message> {
        let mut state = self.state.write().await;
        Self::ensure_active(&state)?;

        if term < state.term {
            tracing::debug!(
                "Rejecting update from {} for stale term {} (current: {})",
                leader_id,
                term,
                state.term
            );
            return Ok(self.response(&state, state.last_received, false));
        }

        if term > state.term {
            *resolved = self.adopt_term(&mut state, term).await;
        } else if state.role == ReplicaRole::Leader {
            return Err(Error::IllegalState(format!(
                "Received update from {} while leading term {}",
                leader_id, term
            )));
        }
        state.leader_id = Some(leader_id);

        if !preceding_id.is_min() && !self.log_store.contains(preceding_id).await? {
            tracing::debug!(
                "Missing preceding op {} (last received: {})",
                preceding_id,
                state.last_received
            );
            // The leader always has our committed prefix
            let committed = state.committed;
            return Ok(self.response(&state, committed, false));
        }

        // Everything up to here now matches the leader's log
        let matched = ops.last().map(|e| e.id).unwrap_or(preceding_id);

        // Skip ops we already hold; only a conflicting op cuts the log
        let committed_index = state.committed.index;
        let mut base = preceding_id;
        let mut new_ops: Vec<LogEntry> = Vec::new();
        for entry in ops {
            if !new_ops.is_empty() {
                new_ops.push(entry);
                continue;
            }
            if entry.id.index <= committed_index || self.log_store.contains(entry.id).await? {
                base = entry.id;
                continue;
            }
            if entry.id.index <= state.last_received.index {
                self.log_store.truncate_after(base).await?;
                tracing::info!(
                    "Truncated ops after {} conflicting with {} (last received: {})",
                    base,
                    entry.id,
                    state.last_received
                );
                state.last_received = base;
                state.next_index = base.index + 1;
            }
            new_ops.push(entry);
        }

        if let Some(last) = new_ops.last().map(|e| e.id) {
            self.log_store.append(&new_ops).await?;
            state.last_received = last;
            state.next_index = last.index + 1;
        }

        let new_commit = committed_id.min(matched);
        if new_commit > state.committed {
            self.log_store.mark_committed(new_commit).await?;
            state.committed = new_commit;
        }

        Ok(self.response(&state, matched, true))
    }

    fn response(&self, state: &ReplicaState, last_received: OpId, success: bool) -> Message {
        Message::ReplicateResponse {
            node_id: self.node_id.clone(),
            term: state.term,
            last_received,
            success,
        }
    }

    /// Dispatch an inbound message. Returns the reply, if any.
    pub async fn handle_message(&self, msg: Message) -> Result<Option<Message>> {
        tracing::trace!("Handling {} for term {}", msg.type_name(), msg.term());
        match msg {
            Message::Replicate { .. } => self.update(msg).await.map(Some),
            Message::ReplicateResponse {
                node_id,
                term,
                last_received,
                success,
            } => {
                self.handle_replicate_response(&node_id, term, last_received, success)
                    .await?;
                Ok(None)
            }
        }
    }

    // ========== Accessors ==========

    fn quorum_for(&self, peer_count: usize) -> usize {
        config::quorum_size(self.min_quorum, peer_count)
    }

    /// Acks (including our own) needed to commit
    pub async fn quorum_size(&self) -> usize {
        let peer_count = self.state.read().await.peers.len();
        self.quorum_for(peer_count)
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Recovery summary, available once started
    pub fn bootstrap_info(&self) -> Option<BootstrapInfo> {
        self.bootstrap.get().copied()
    }

    pub async fn phase(&self) -> LifecyclePhase {
        self.state.read().await.phase
    }

    pub async fn role(&self) -> ReplicaRole {
        self.state.read().await.role
    }

    pub async fn current_term(&self) -> Term {
        self.state.read().await.term
    }

    pub async fn leader_id(&self) -> Option<String> {
        self.state.read().await.leader_id.clone()
    }

    pub async fn peers(&self) -> Vec<String> {
        self.state.read().await.peers.clone()
    }

    pub async fn committed_id(&self) -> OpId {
        self.state.read().await.committed
    }

    pub async fn last_received_id(&self) -> OpId {
        self.state.read().await.last_received
    }

    /// Get pending round count
    pub async fn pending_count(&self) -> usize {
        self.pending.read().await.len()
    }

    pub async fn status(&self) -> ConsensusStatus {
        let state = self.state.read().await;
        ConsensusStatus {
            node_id: self.node_id.clone(),
            phase: state.phase,
            role: state.role,
            term: state.term,
            leader_id: state.leader_id.clone(),
            last_received_id: state.last_received,
            committed_id: state.committed,
            pending_rounds: self.pending.read().await.len(),
        }
    }
}
