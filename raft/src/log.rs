//! The replicated log.
//!
//! Indices are 1-based. Index 1 is a sentinel entry with `term: 0` that is
//! never replicated or applied; it exists so `last_term()`/`get()` never
//! need a special case for "the log is empty". Real entries start at index 2.

use serde::{Deserialize, Serialize};

use crate::error::RaftError;
use crate::state_machine::Operation;
use crate::NodeId;

/// One entry in the log: the term it was accepted in, the client operation
/// it carries, and — only for entries accepted directly from a client while
/// this node was leader — the id to reply to once the entry is applied.
/// The sentinel entry (index 1) carries neither.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogEntry {
    pub term: u64,
    pub op: Option<Operation>,
    pub client: Option<NodeId>,
}

impl LogEntry {
    fn sentinel() -> Self {
        LogEntry { term: 0, op: None, client: None }
    }
}

/// The log itself: a 1-indexed, append/truncate-only vector of entries.
#[derive(Clone, Debug)]
pub struct Log {
    entries: Vec<LogEntry>,
}

impl Default for Log {
    fn default() -> Self {
        Self::new()
    }
}

impl Log {
    /// A fresh log holding only the sentinel entry at index 1.
    pub fn new() -> Self {
        Log { entries: vec![LogEntry::sentinel()] }
    }

    /// Number of entries including the sentinel — also the index of the
    /// last entry, since indices are 1-based.
    pub fn size(&self) -> u64 {
        self.entries.len() as u64
    }

    /// The entry at `index`, or `None` if `index` is out of range.
    pub fn get(&self, index: u64) -> Option<&LogEntry> {
        if index == 0 {
            return None;
        }
        self.entries.get((index - 1) as usize)
    }

    /// The last entry in the log (always present — the sentinel at minimum).
    pub fn last(&self) -> &LogEntry {
        self.entries.last().expect("log always holds at least the sentinel")
    }

    /// Index of the last entry.
    pub fn last_index(&self) -> u64 {
        self.size()
    }

    /// Term of the last entry.
    pub fn last_term(&self) -> u64 {
        self.last().term
    }

    /// Appends `entry`, returning its new index.
    pub fn append(&mut self, entry: LogEntry) -> u64 {
        self.entries.push(entry);
        self.last_index()
    }

    /// All entries from `index` to the end, inclusive. `index` must be >= 1.
    pub fn from_index(&self, index: u64) -> Result<&[LogEntry], RaftError> {
        if index == 0 {
            return Err(RaftError::IllegalIndex(index));
        }
        if index > self.size() {
            return Ok(&[]);
        }
        Ok(&self.entries[(index - 1) as usize..])
    }

    /// Keeps only indices `1..=index`, dropping everything after. `index: 0`
    /// would discard the sentinel and is forbidden.
    pub fn truncate_to(&mut self, index: u64) -> Result<(), RaftError> {
        if index == 0 {
            return Err(RaftError::TruncateBelowSentinel);
        }
        self.entries.truncate(index as usize);
        Ok(())
    }
}
