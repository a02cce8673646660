mod common;

use common::Cluster;
use raft::message::RequestVoteRequest;
use raft::state_machine::OperationKind;
use raft::{ClientRequestOutcome, Role};
use serde_json::json;

#[test]
fn exactly_one_leader_is_elected_per_term() {
    let mut cluster = Cluster::new(3);
    let req = cluster.elect(0, 0.0);

    let leaders = cluster.nodes.iter().filter(|n| n.role() == Role::Leader).count();
    assert_eq!(leaders, 1);
    assert_eq!(cluster.node("n1").current_term(), req.term);
}

#[test]
fn vote_is_denied_to_a_candidate_whose_log_is_behind() {
    let mut cluster = Cluster::new(3);
    cluster.elect(0, 0.0);

    // Give n1's log (and, via replication, n2's) real entries past the sentinel.
    for i in 0..2 {
        match cluster.node_mut("n1").client_request("c1".to_string(), i, OperationKind::Write {
            key: json!("x"),
            value: json!(i),
        }) {
            ClientRequestOutcome::Accepted => {}
            _ => panic!("n1 should be leader"),
        }
    }
    cluster.replicate_once("n1", 10.0);
    assert_eq!(cluster.node("n2").log_size(), 3);

    // A campaign claiming an empty log, at a higher term, must still lose to
    // n2's log-up-to-date check even though the higher term clears n2's vote.
    let stale_req = RequestVoteRequest {
        term: cluster.node("n1").current_term() + 1,
        candidate_id: "n3".to_string(),
        last_log_index: 1,
        last_log_term: 0,
    };
    let resp = cluster.node_mut("n2").handle_request_vote(&stale_req, 20.0);
    assert!(!resp.vote_granted);
}

#[test]
fn a_node_only_votes_once_per_term() {
    let mut cluster = Cluster::new(3);
    let first = RequestVoteRequest { term: 1, candidate_id: "n1".to_string(), last_log_index: 1, last_log_term: 0 };
    let second = RequestVoteRequest { term: 1, candidate_id: "n3".to_string(), last_log_index: 1, last_log_term: 0 };

    let r1 = cluster.node_mut("n2").handle_request_vote(&first, 0.0);
    let r2 = cluster.node_mut("n2").handle_request_vote(&second, 0.0);

    assert!(r1.vote_granted);
    assert!(!r2.vote_granted);
}
