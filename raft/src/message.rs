//! Wire-shaped bodies for the two Raft RPCs.
//!
//! These carry no `msg_id`/`in_reply_to` — that envelope bookkeeping belongs
//! to the transport, not to consensus. The binary crate embeds these
//! directly into its tagged `Body` enum via `#[serde(flatten)]`.

use serde::{Deserialize, Serialize};

use crate::log::LogEntry;
use crate::NodeId;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestVoteRequest {
    pub term: u64,
    pub candidate_id: NodeId,
    pub last_log_index: u64,
    pub last_log_term: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestVoteResponse {
    pub term: u64,
    pub vote_granted: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppendEntriesRequest {
    pub term: u64,
    pub leader_id: NodeId,
    pub prev_log_index: u64,
    pub prev_log_term: u64,
    pub entries: Vec<LogEntry>,
    pub leader_commit: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppendEntriesResponse {
    pub term: u64,
    pub success: bool,
}
