//! Entry point: wires up a real `Net` (reading Maelstrom's stdin, writing
//! its stdout) and hands it to the library's event loop.

use std::time::{SystemTime, UNIX_EPOCH};

use maelstrom_raft::net::Net;

fn now() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("clock before epoch").as_secs_f64()
}

fn main() {
    env_logger::Builder::from_default_env().target(env_logger::Target::Stderr).init();

    let node = raft::RaftNode::new();
    let net = Net::new();
    maelstrom_raft::run_loop(node, net, now);
}
