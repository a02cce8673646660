//! The Raft role engine and replicator.
//!
//! [`RaftNode`] owns every piece of consensus state — term, role, vote, log,
//! commit/applied indices, leader-side replication bookkeeping, and the KV
//! state machine — and exposes it through methods that are pure functions of
//! (state, input, wall-clock `now`). It performs no I/O: every method that
//! needs to emit an RPC returns the request body for the caller to send, and
//! every method that consumes a response takes the body the caller decoded.
//! This keeps the whole decision surface single-threaded and testable without
//! a network.

use std::collections::{HashMap, HashSet};

use rand::Rng;

use crate::error::RaftError;
use crate::log::{Log, LogEntry};
use crate::message::{AppendEntriesRequest, AppendEntriesResponse, RequestVoteRequest, RequestVoteResponse};
use crate::replication::{commit_median, majority, ReplicationState};
use crate::role::Role;
use crate::state_machine::{Operation, OperationKind, Reply, KvStore};
use crate::NodeId;

/// Tunable timing parameters. Mirrors the constants the source hardcodes at
/// the top of its node class.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub election_timeout: f64,
    pub heartbeat_interval: f64,
    pub min_replication_interval: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            election_timeout: 2.0,
            heartbeat_interval: 1.0,
            min_replication_interval: 0.05,
        }
    }
}

/// What to do with an inbound client operation (`read`/`write`/`cas`).
pub enum ClientRequestOutcome {
    /// This node is leader; the op was appended and will be answered when
    /// applied.
    Accepted,
    /// This node is not leader, but knows who is; forward the request there.
    Proxy(NodeId),
    /// No leader is known yet.
    NotLeader,
}

/// An entry that was just applied to the state machine, paired with the
/// client it should be replied to (only present if this node was leader at
/// the time the entry was accepted, and still holds the reply route).
pub struct AppliedEntry {
    pub client: NodeId,
    pub msg_id: u64,
    pub reply: Reply,
}

pub struct RaftNode {
    id: NodeId,
    peers: Vec<NodeId>,
    config: Config,

    role: Role,
    current_term: u64,
    voted_for: Option<NodeId>,
    log: Log,

    commit_index: u64,
    last_applied: u64,
    leader: Option<NodeId>,

    leader_state: Option<HashMap<NodeId, ReplicationState>>,
    votes_received: HashSet<NodeId>,

    election_deadline: f64,
    step_down_deadline: f64,
    last_replication: f64,

    kv: KvStore,
}

impl Default for RaftNode {
    fn default() -> Self {
        Self::new()
    }
}

impl RaftNode {
    /// Constructs a node in the `Nascent` role, with no id yet. It ignores
    /// every message until [`init`](Self::init) is called.
    pub fn new() -> Self {
        RaftNode {
            id: NodeId::new(),
            peers: Vec::new(),
            config: Config::default(),
            role: Role::Nascent,
            current_term: 0,
            voted_for: None,
            log: Log::new(),
            commit_index: 0,
            last_applied: 1,
            leader: None,
            leader_state: None,
            votes_received: HashSet::new(),
            election_deadline: 0.0,
            step_down_deadline: 0.0,
            last_replication: 0.0,
            kv: KvStore::new(),
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn current_term(&self) -> u64 {
        self.current_term
    }

    pub fn leader(&self) -> Option<&NodeId> {
        self.leader.as_ref()
    }

    pub fn peers(&self) -> &[NodeId] {
        &self.peers
    }

    pub fn log_size(&self) -> u64 {
        self.log.size()
    }

    pub fn commit_index(&self) -> u64 {
        self.commit_index
    }

    /// Initializes this node with its id and the full cluster membership
    /// (as given by the harness's `raft_init`/`init` message) and
    /// transitions it to Follower. May only be called once.
    pub fn init(&mut self, node_id: NodeId, node_ids: Vec<NodeId>, now: f64) -> Result<(), RaftError> {
        if self.role != Role::Nascent {
            return Err(RaftError::AlreadyInitialized);
        }
        self.id = node_id;
        self.peers = node_ids.into_iter().filter(|n| n != &self.id).collect();
        self.become_follower(now);
        Ok(())
    }

    fn cluster_size(&self) -> usize {
        self.peers.len() + 1
    }

    fn reset_election_deadline(&mut self, now: f64) {
        let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
        self.election_deadline = now + self.config.election_timeout * (1.0 + jitter);
    }

    fn reset_step_down_deadline(&mut self, now: f64) {
        self.step_down_deadline = now + self.config.election_timeout;
    }

    // -- Role transitions --------------------------------------------------

    fn become_follower(&mut self, now: f64) {
        self.role = Role::Follower;
        self.leader = None;
        self.leader_state = None;
        self.reset_election_deadline(now);
    }

    /// Starts a new election: advances the term, votes for self, and
    /// returns the `RequestVote` body to broadcast to every peer. In a
    /// single-node cluster the self-vote alone is already a majority, so
    /// this settles the election on the spot rather than waiting for a
    /// response that no peer exists to send.
    fn become_candidate(&mut self, now: f64) -> RequestVoteRequest {
        debug_assert!(matches!(self.role, Role::Follower | Role::Candidate));
        self.current_term += 1;
        self.role = Role::Candidate;
        self.voted_for = Some(self.id.clone());
        self.leader = None;
        self.votes_received = HashSet::new();
        self.votes_received.insert(self.id.clone());
        self.reset_election_deadline(now);
        self.reset_step_down_deadline(now);
        if self.votes_received.len() >= majority(self.cluster_size()) {
            self.become_leader(now).expect("role just set to Candidate above");
        }
        RequestVoteRequest {
            term: self.current_term,
            candidate_id: self.id.clone(),
            last_log_index: self.log.last_index(),
            last_log_term: self.log.last_term(),
        }
    }

    /// Transitions Candidate -> Leader. Errors if called from any other role.
    pub fn become_leader(&mut self, now: f64) -> Result<(), RaftError> {
        if self.role != Role::Candidate {
            return Err(RaftError::NotCandidate);
        }
        self.role = Role::Leader;
        self.leader = None;
        self.last_replication = 0.0;
        let mut state = HashMap::new();
        for peer in &self.peers {
            state.insert(
                peer.clone(),
                ReplicationState { next_index: self.log.last_index() + 1, match_index: 0 },
            );
        }
        self.leader_state = Some(state);
        self.reset_step_down_deadline(now);
        Ok(())
    }

    /// If `remote_term` is newer than ours, advance to it, clear our vote,
    /// and fall back to Follower. Returns whether a step-down happened.
    pub fn maybe_step_down(&mut self, remote_term: u64, now: f64) -> bool {
        if remote_term > self.current_term {
            self.current_term = remote_term;
            self.voted_for = None;
            self.become_follower(now);
            true
        } else {
            false
        }
    }

    // -- Election ------------------------------------------------------------

    /// If the election deadline has passed, starts a campaign (for
    /// Follower/Candidate) or just rearms the deadline (Leader/Nascent).
    /// Returns the RequestVote body to broadcast, if a campaign started.
    pub fn election_tick(&mut self, now: f64) -> Option<RequestVoteRequest> {
        if self.election_deadline >= now {
            return None;
        }
        match self.role {
            Role::Follower | Role::Candidate => Some(self.become_candidate(now)),
            Role::Leader | Role::Nascent => {
                self.reset_election_deadline(now);
                None
            }
        }
    }

    /// Handles an inbound `RequestVote`, returning the response to send back.
    pub fn handle_request_vote(&mut self, body: &RequestVoteRequest, now: f64) -> RequestVoteResponse {
        self.maybe_step_down(body.term, now);

        let log_ok = body.last_log_term > self.log.last_term()
            || (body.last_log_term == self.log.last_term() && body.last_log_index >= self.log.last_index());
        let grant = body.term >= self.current_term && self.voted_for.is_none() && log_ok;

        if grant {
            self.voted_for = Some(body.candidate_id.clone());
            self.reset_election_deadline(now);
        }

        RequestVoteResponse { term: self.current_term, vote_granted: grant }
    }

    /// Handles the response to a `RequestVote` this node sent while
    /// campaigning in `sent_term`. May transition this node to Leader.
    pub fn handle_request_vote_response(
        &mut self,
        from: NodeId,
        sent_term: u64,
        resp: RequestVoteResponse,
        now: f64,
    ) {
        self.reset_step_down_deadline(now);
        self.maybe_step_down(resp.term, now);

        if self.role == Role::Candidate
            && self.current_term == sent_term
            && resp.term == self.current_term
            && resp.vote_granted
        {
            self.votes_received.insert(from);
            if self.votes_received.len() >= majority(self.cluster_size()) {
                self.become_leader(now).expect("role checked above");
            }
        }
    }

    // -- Log replication (responder side) ------------------------------------

    /// Handles an inbound `AppendEntries`, returning the response to send back.
    pub fn handle_append_entries(&mut self, body: AppendEntriesRequest, now: f64) -> AppendEntriesResponse {
        self.maybe_step_down(body.term, now);

        if body.term < self.current_term {
            return AppendEntriesResponse { term: self.current_term, success: false };
        }

        self.leader = Some(body.leader_id.clone());
        self.reset_election_deadline(now);

        let consistent = match self.log.get(body.prev_log_index) {
            Some(entry) => entry.term == body.prev_log_term,
            None => false,
        };
        if !consistent {
            return AppendEntriesResponse { term: self.current_term, success: false };
        }

        self.log
            .truncate_to(body.prev_log_index)
            .expect("the sentinel at index 1 means prev_log_index is never 0 here");
        for entry in body.entries {
            self.log.append(entry);
        }

        if self.commit_index < body.leader_commit {
            self.commit_index = body.leader_commit.min(self.log.last_index());
        }

        AppendEntriesResponse { term: self.current_term, success: true }
    }

    // -- Log replication (leader side) ---------------------------------------

    /// If leader and enough time has passed, plans one AppendEntries RPC per
    /// peer that needs either new entries or a heartbeat. Returns `(peer, ni,
    /// body)` for each RPC to send; the caller is responsible for actually
    /// sending them and wiring up [`handle_append_entries_response`] as the
    /// reply callback.
    pub fn replicate(&mut self, now: f64) -> Vec<(NodeId, u64, AppendEntriesRequest)> {
        let mut out = Vec::new();
        if self.role != Role::Leader {
            return out;
        }
        let elapsed = now - self.last_replication;
        if elapsed <= self.config.min_replication_interval {
            return out;
        }

        let term = self.current_term;
        let commit_index = self.commit_index;
        let peers = self.peers.clone();
        for peer in peers {
            let ni = self.leader_state.as_ref().unwrap()[&peer].next_index;
            let entries: Vec<LogEntry> = self.log.from_index(ni).unwrap_or(&[]).to_vec();
            if entries.is_empty() && elapsed <= self.config.heartbeat_interval {
                continue;
            }
            let prev_log_term = self.log.get(ni - 1).map(|e| e.term).unwrap_or(0);
            let body = AppendEntriesRequest {
                term,
                leader_id: self.id.clone(),
                prev_log_index: ni - 1,
                prev_log_term,
                entries,
                leader_commit: commit_index,
            };
            out.push((peer, ni, body));
        }
        if !out.is_empty() {
            self.last_replication = now;
        }
        out
    }

    /// Handles the response to an `AppendEntries` this node sent to `from`
    /// while leading in `sent_term`, probing from `ni` with `entries_len`
    /// entries attached.
    pub fn handle_append_entries_response(
        &mut self,
        from: &NodeId,
        sent_term: u64,
        ni: u64,
        entries_len: u64,
        resp: AppendEntriesResponse,
        now: f64,
    ) {
        self.maybe_step_down(resp.term, now);

        if self.role != Role::Leader || self.current_term != sent_term {
            return;
        }
        self.reset_step_down_deadline(now);

        let Some(state) = self.leader_state.as_mut().and_then(|m| m.get_mut(from)) else {
            return;
        };
        if resp.success {
            state.next_index = state.next_index.max(ni + entries_len);
            state.match_index = state.match_index.max(ni - 1 + entries_len);
        } else {
            state.next_index = state.next_index.saturating_sub(1).max(1);
        }
    }

    /// If leader, recomputes the commit index from the per-follower match
    /// indices (including this node's own, synthesized from `log.size()`).
    pub fn advance_commit_index(&mut self) {
        if self.role != Role::Leader {
            return;
        }
        let Some(state) = &self.leader_state else { return };
        let mut matches: Vec<u64> = state.values().map(|s| s.match_index).collect();
        matches.push(self.log.last_index());
        let n = commit_median(matches);
        if n > self.commit_index && self.log.get(n).map(|e| e.term) == Some(self.current_term) {
            self.commit_index = n;
        }
    }

    // -- Step-down ------------------------------------------------------------

    /// If leading and no ack has arrived recently, steps down to Follower.
    pub fn step_down_tick(&mut self, now: f64) -> bool {
        if self.role == Role::Leader && self.step_down_deadline < now {
            self.become_follower(now);
            true
        } else {
            false
        }
    }

    // -- State machine --------------------------------------------------------

    /// Applies the next committed-but-unapplied log entry, if any. Returns
    /// the reply to deliver to the originating client iff this node was
    /// leader when the entry was accepted.
    pub fn advance_state_machine(&mut self) -> Option<AppliedEntry> {
        if self.last_applied >= self.commit_index {
            return None;
        }
        self.last_applied += 1;
        let entry = self.log.get(self.last_applied).expect("last_applied <= commit_index <= log.size()");
        let op = entry.op.as_ref().expect("non-sentinel committed entries always carry an op");
        let client = entry.client.clone();
        let msg_id = op.msg_id;
        let reply = self.kv.apply(&op.kind);

        if self.role == Role::Leader {
            client.map(|client| AppliedEntry { client, msg_id, reply })
        } else {
            None
        }
    }

    // -- Client request intake -------------------------------------------------

    /// Routes an inbound `read`/`write`/`cas` request.
    pub fn client_request(&mut self, src: NodeId, msg_id: u64, kind: OperationKind) -> ClientRequestOutcome {
        match self.role {
            Role::Leader => {
                let op = Operation { msg_id, kind };
                self.log.append(LogEntry { term: self.current_term, op: Some(op), client: Some(src) });
                ClientRequestOutcome::Accepted
            }
            _ => match &self.leader {
                Some(leader) => ClientRequestOutcome::Proxy(leader.clone()),
                None => ClientRequestOutcome::NotLeader,
            },
        }
    }
}
