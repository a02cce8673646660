#![allow(dead_code)]

use raft::message::RequestVoteRequest;
use raft::{RaftNode, Role};

/// A small in-process cluster: every node is a real `RaftNode`, but
/// messages are delivered by directly calling the responder/handler
/// methods instead of going over a socket. This exercises the exact same
/// safety checks a networked deployment would hit, just without the wire.
pub struct Cluster {
    pub nodes: Vec<RaftNode>,
}

impl Cluster {
    pub fn new(n: usize) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let ids: Vec<String> = (1..=n).map(|i| format!("n{}", i)).collect();
        let mut nodes = Vec::new();
        for id in &ids {
            let mut node = RaftNode::new();
            node.init(id.clone(), ids.clone(), 0.0).unwrap();
            nodes.push(node);
        }
        Cluster { nodes }
    }

    pub fn node_mut(&mut self, id: &str) -> &mut RaftNode {
        self.nodes.iter_mut().find(|n| n.id() == id).unwrap()
    }

    pub fn node(&self, id: &str) -> &RaftNode {
        self.nodes.iter().find(|n| n.id() == id).unwrap()
    }

    /// Forces node `idx` to start (and win) a campaign by hand-delivering
    /// `RequestVote`/response pairs to and from every peer. Panics if it
    /// doesn't become leader — callers use this to set up scenarios, not to
    /// test the election itself.
    pub fn elect(&mut self, idx: usize, now: f64) -> RequestVoteRequest {
        let candidate_id = self.nodes[idx].id().clone();
        let req = self.nodes[idx]
            .election_tick(now + 1_000_000.0)
            .expect("a follower/candidate should start a campaign once its deadline passes");

        let peer_ids = self.nodes[idx].peers().to_vec();
        for peer_id in peer_ids {
            let resp = self.node_mut(&peer_id).handle_request_vote(&req, now);
            self.node_mut(&candidate_id).handle_request_vote_response(peer_id, req.term, resp, now);
        }
        assert_eq!(self.node(&candidate_id).role(), Role::Leader, "{} should have won the election", candidate_id);
        req
    }

    /// Runs one full leader replication pass: plans outbound AppendEntries,
    /// delivers each to its follower, and feeds the response back.
    pub fn replicate_once(&mut self, leader_id: &str, now: f64) {
        let plans = self.node_mut(leader_id).replicate(now);
        let sent_term = self.node(leader_id).current_term();
        for (peer, ni, body) in plans {
            let entries_len = body.entries.len() as u64;
            let resp = self.node_mut(&peer).handle_append_entries(body, now);
            self.node_mut(leader_id).handle_append_entries_response(&peer, sent_term, ni, entries_len, resp, now);
        }
    }
}
