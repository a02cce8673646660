//! The four phases of a node's life.

/// Which phase of its life a node is in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Constructed but not yet `init`-ed. Ignores every message.
    Nascent,
    /// Following the leader (or candidate) of the current term, if any.
    Follower,
    /// Campaigning for leadership of the current term.
    Candidate,
    /// Leading the current term; the only role that replicates client
    /// operations and advances the commit index.
    Leader,
}
