//! The Maelstrom-facing half of this node: wire format, transport, and the
//! dispatch/event-loop glue around [`raft::RaftNode`]. Kept as a library so
//! both the real binary and the integration tests in `tests/` drive the
//! exact same dispatch path — the binary's `main` differs only in where
//! `Net` gets its stdin/stdout from.

pub mod net;
pub mod wire;

use std::thread;
use std::time::Duration;

use log::{error, info, warn};

use raft::state_machine::OperationKind;
use raft::{ClientRequestOutcome, RaftNode};

use net::{applied_entry_to_body, Net, PollOutcome};
use wire::{Body, Envelope, Header};

/// Dispatches one inbound request by `type`. Replies and outbound RPCs are
/// written through `net`; nothing here blocks.
pub fn dispatch(node: &mut RaftNode, net: &mut Net, request: Envelope, now: f64) {
    let my_id = node.id().clone();
    let msg_id = request.body.header().msg_id;

    match request.body.clone() {
        Body::RaftInit { node_id, node_ids, .. } => init(node, net, &request, node_id, node_ids, now, true),
        Body::Init { node_id, node_ids, .. } => init(node, net, &request, node_id, node_ids, now, false),

        Body::RequestVote { body, .. } => {
            let resp = node.handle_request_vote(&body, now);
            net.reply(&my_id, &request, Body::RequestVoteRes { header: Header::default(), body: resp });
        }

        Body::AppendEntries { body, .. } => {
            let resp = node.handle_append_entries(body, now);
            net.reply(&my_id, &request, Body::AppendEntriesRes { header: Header::default(), body: resp });
        }

        Body::Read { key, .. } => route_client_op(node, net, &request, msg_id, OperationKind::Read { key }),
        Body::Write { key, value, .. } => {
            route_client_op(node, net, &request, msg_id, OperationKind::Write { key, value })
        }
        Body::Cas { key, from, to, .. } => {
            route_client_op(node, net, &request, msg_id, OperationKind::Cas { key, from, to })
        }

        other => warn!("{}: no handler for inbound {:?}", my_id, other),
    }
}

fn init(
    node: &mut RaftNode,
    net: &mut Net,
    request: &Envelope,
    node_id: String,
    node_ids: Vec<String>,
    now: f64,
    raft_init_spelling: bool,
) {
    match node.init(node_id.clone(), node_ids, now) {
        Ok(()) => {
            info!("{}: initialized with peers {:?}", node_id, node.peers());
            let header = Header { msg_id: None, in_reply_to: request.body.header().msg_id };
            let body = if raft_init_spelling {
                Body::RaftInitOk { header }
            } else {
                Body::InitOk { header }
            };
            net.send(&node_id, &request.src, body);
        }
        Err(e) => error!("raft_init rejected: {}", e),
    }
}

fn route_client_op(
    node: &mut RaftNode,
    net: &mut Net,
    request: &Envelope,
    msg_id: Option<u64>,
    op: OperationKind,
) {
    let msg_id = match msg_id {
        Some(id) => id,
        None => {
            warn!("client op with no msg_id, dropping");
            return;
        }
    };
    match node.client_request(request.src.clone(), msg_id, op) {
        ClientRequestOutcome::Accepted => {
            // The reply is produced later, when the entry is applied.
        }
        ClientRequestOutcome::Proxy(leader) => {
            net.send(&request.src, &leader, request.body.clone());
        }
        ClientRequestOutcome::NotLeader => {
            net.reply(
                node.id(),
                request,
                Body::Error {
                    header: Header::default(),
                    code: raft::state_machine::ERR_NOT_LEADER,
                    text: "not a leader".to_string(),
                },
            );
        }
    }
}

/// Broadcasts `RequestVote` to every peer, wiring each response to a
/// closure that captures the term this campaign was started in — a late
/// reply from a stale campaign can then never be mistaken for a current one.
pub fn broadcast_request_vote(node: &mut RaftNode, net: &mut Net, req: raft::message::RequestVoteRequest, now: f64) {
    let my_id = node.id().clone();
    let sent_term = req.term;
    for peer in node.peers().to_vec() {
        let body = Body::RequestVote { header: Header::default(), body: req.clone() };
        net.rpc(
            &my_id,
            &peer,
            body,
            Box::new(move |node, _net, from, reply, now| match reply {
                Body::RequestVoteRes { body, .. } => {
                    node.handle_request_vote_response(from, sent_term, body, now);
                }
                other => warn!("expected request_vote_res from {}, got {:?}", from, other),
            }),
        );
    }
}

/// Runs one leader replication pass, wiring each AppendEntries response to
/// a closure capturing the term/peer/probe-window it was sent with.
pub fn replicate(node: &mut RaftNode, net: &mut Net, now: f64) -> bool {
    let plans = node.replicate(now);
    if plans.is_empty() {
        return false;
    }
    let my_id = node.id().clone();
    let sent_term = node.current_term();
    for (peer, ni, body) in plans {
        let entries_len = body.entries.len() as u64;
        net.rpc(
            &my_id,
            &peer,
            Body::AppendEntries { header: Header::default(), body },
            Box::new(move |node, _net, from, reply, now| match reply {
                Body::AppendEntriesRes { body, .. } => {
                    node.handle_append_entries_response(&from, sent_term, ni, entries_len, body, now);
                }
                other => warn!("expected append_entries_res from {}, got {:?}", from, other),
            }),
        );
    }
    true
}

/// Runs one iteration of the main loop's six-step dispatch order, returning
/// whether any step did work. Exposed separately from [`run_loop`] so tests
/// can drive the loop deterministically instead of racing a real clock.
pub fn tick(node: &mut RaftNode, net: &mut Net, now: f64) -> bool {
    let mut did_work = false;

    match net.poll_one(node, now) {
        PollOutcome::Idle => {}
        PollOutcome::ReplyHandled => did_work = true,
        PollOutcome::Request(request) => {
            dispatch(node, net, request, now);
            did_work = true;
        }
    }

    if !did_work && node.step_down_tick(now) {
        did_work = true;
    }

    if !did_work && replicate(node, net, now) {
        did_work = true;
    }

    if !did_work {
        if let Some(req) = node.election_tick(now) {
            broadcast_request_vote(node, net, req, now);
            did_work = true;
        }
    }

    node.advance_commit_index();

    if let Some(applied) = node.advance_state_machine() {
        let body = applied_entry_to_body(&applied);
        let my_id = node.id().clone();
        net.send(&my_id, &applied.client, body);
        did_work = true;
    }

    did_work
}

/// Drives the event loop forever: dispatch, step-down check, replication,
/// election check, commit advancement, state-machine advancement, sleeping
/// briefly only when none of those did work. `node` and `net` are only ever
/// touched from this call stack — there are no locks because there is no
/// concurrent access.
pub fn run_loop(mut node: RaftNode, mut net: Net, now: impl Fn() -> f64) {
    loop {
        let did_work = tick(&mut node, &mut net, now());
        if !did_work {
            thread::sleep(Duration::from_millis(1));
        }
    }
}
