mod common;

use common::Cluster;
use raft::state_machine::{OperationKind, Reply};
use raft::ClientRequestOutcome;
use serde_json::json;

#[test]
fn a_committed_write_applies_and_reports_back_to_its_client() {
    let mut cluster = Cluster::new(3);
    cluster.elect(0, 0.0);

    match cluster.node_mut("n1").client_request(
        "c1".to_string(),
        1,
        OperationKind::Write { key: json!("x"), value: json!(7) },
    ) {
        ClientRequestOutcome::Accepted => {}
        _ => panic!("n1 should be leader"),
    }

    cluster.replicate_once("n1", 10.0);
    cluster.node_mut("n1").advance_commit_index();
    assert_eq!(cluster.node("n1").commit_index(), 2);

    let applied = cluster.node_mut("n1").advance_state_machine().expect("write should apply");
    assert_eq!(applied.client, "c1");
    assert_eq!(applied.msg_id, 1);
    assert_eq!(applied.reply, Reply::WriteOk);

    // n2 only learns the new commit index on the next AppendEntries; once it
    // does, it applies the entry locally too, but never produces a reply
    // route of its own — only the leader that took the request from the
    // client does that.
    cluster.replicate_once("n1", 11.2); // past the heartbeat interval, so the idle round still fires
    assert!(cluster.node_mut("n2").advance_state_machine().is_none());
}

#[test]
fn a_single_node_cluster_commits_its_own_write_without_waiting_on_a_peer() {
    let mut cluster = Cluster::new(1);
    cluster.elect(0, 0.0);

    match cluster.node_mut("n1").client_request(
        "c1".to_string(),
        1,
        OperationKind::Write { key: json!("x"), value: json!(7) },
    ) {
        ClientRequestOutcome::Accepted => {}
        _ => panic!("sole node should be leader"),
    }

    // With no peers, the leader's own log length is already a majority.
    cluster.node_mut("n1").advance_commit_index();
    assert_eq!(cluster.node("n1").commit_index(), 2);

    let applied = cluster.node_mut("n1").advance_state_machine().expect("write should apply");
    assert_eq!(applied.client, "c1");
    assert_eq!(applied.msg_id, 1);
    assert_eq!(applied.reply, Reply::WriteOk);
}

#[test]
fn commit_index_only_advances_once_a_majority_of_followers_match() {
    let mut cluster = Cluster::new(3);
    cluster.elect(0, 0.0);

    cluster.node_mut("n1").client_request(
        "c1".to_string(),
        1,
        OperationKind::Write { key: json!("x"), value: json!(1) },
    );

    // Before any replication round, only the leader itself has the entry.
    cluster.node_mut("n1").advance_commit_index();
    assert_eq!(cluster.node("n1").commit_index(), 0);

    cluster.replicate_once("n1", 10.0);
    cluster.node_mut("n1").advance_commit_index();
    assert_eq!(cluster.node("n1").commit_index(), 2);
}

#[test]
fn cas_on_a_replicated_key_fails_without_touching_state_when_the_precondition_is_wrong() {
    let mut cluster = Cluster::new(3);
    cluster.elect(0, 0.0);

    for (msg_id, op) in [
        (1, OperationKind::Write { key: json!("x"), value: json!(1) }),
        (2, OperationKind::Cas { key: json!("x"), from: json!(99), to: json!(2) }),
    ] {
        cluster.node_mut("n1").client_request("c1".to_string(), msg_id, op);
    }
    cluster.replicate_once("n1", 10.0);
    cluster.node_mut("n1").advance_commit_index();

    let first = cluster.node_mut("n1").advance_state_machine().expect("write applies");
    assert_eq!(first.reply, Reply::WriteOk);
    let second = cluster.node_mut("n1").advance_state_machine().expect("cas applies");
    match second.reply {
        Reply::Error { code, .. } => assert_eq!(code, raft::state_machine::ERR_CAS_MISMATCH),
        other => panic!("expected a CAS mismatch error, got {:?}", other),
    }
}

#[test]
fn client_request_before_any_leader_is_known_reports_not_leader() {
    let mut cluster = Cluster::new(3);
    match cluster.node_mut("n2").client_request("c1".to_string(), 1, OperationKind::Read { key: json!("x") }) {
        ClientRequestOutcome::NotLeader => {}
        _ => panic!("no leader has been elected yet"),
    }
}

#[test]
fn client_request_to_a_follower_after_election_proxies_to_the_leader() {
    let mut cluster = Cluster::new(3);
    cluster.elect(0, 0.0);
    cluster.replicate_once("n1", 10.0); // carries the heartbeat that tells n2 who leads

    match cluster.node_mut("n2").client_request("c1".to_string(), 1, OperationKind::Read { key: json!("x") }) {
        ClientRequestOutcome::Proxy(leader) => assert_eq!(leader, "n1"),
        _ => panic!("n2 should know n1 is leader"),
    }
}
