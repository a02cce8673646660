//! Consensus core for a single Raft participant backing a replicated
//! key/value store.
//!
//! This crate has no knowledge of JSON, stdin/stdout, or wall-clock time
//! beyond the `f64` seconds value callers pass into its tick methods. It
//! owns term/vote/role state, the replicated log, per-follower replication
//! bookkeeping, and the key/value state machine; the binary crate wraps it
//! with a transport and drives its event loop.

pub mod error;
pub mod log;
pub mod message;
pub mod node;
pub mod replication;
pub mod role;
pub mod state_machine;

/// A Maelstrom node id, e.g. `"n1"` or `"c3"`.
pub type NodeId = String;

pub use error::RaftError;
pub use node::{AppliedEntry, ClientRequestOutcome, Config, RaftNode};
pub use role::Role;
