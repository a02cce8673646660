//! Errors for internal invariant violations.
//!
//! These correspond to the "internal invariant violations" error category of
//! the node: calling a transition out of turn (double init, `become_leader`
//! while not a candidate) or asking the log for an illegal index. The caller
//! (the event loop) logs these and keeps running; they are never returned to
//! a client.

use thiserror::Error;

/// An internal invariant was violated.
#[derive(Debug, Error)]
pub enum RaftError {
    /// `init` was called on a node that was already initialized.
    #[error("cannot initialize a node twice")]
    AlreadyInitialized,

    /// `become_leader` was called while the node was not a candidate.
    #[error("cannot become leader from a non-candidate state")]
    NotCandidate,

    /// `from_index` was asked for a non-positive index.
    #[error("illegal log index {0}")]
    IllegalIndex(u64),

    /// `truncate_to` was asked to remove the sentinel.
    #[error("cannot truncate the log below its sentinel entry")]
    TruncateBelowSentinel,
}
