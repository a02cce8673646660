//! The in-memory key/value state machine replicated by the Raft log.
//!
//! This is exactly the three operations required by Maelstrom's `lin-kv`
//! workload: `read`, `write`, and compare-and-swap. `apply` is a pure
//! function of (prior state, op) — any two nodes applying the same
//! committed prefix reach identical state and emit identical reply bodies.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A client-submitted operation, carrying the `msg_id` of the request that
/// produced it so the leader can later stamp the reply's `in_reply_to`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Operation {
    pub msg_id: u64,
    #[serde(flatten)]
    pub kind: OperationKind,
}

/// The operation kind, tagged the same way the wire body is (`type`).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationKind {
    Read { key: Value },
    Write { key: Value, value: Value },
    Cas { key: Value, from: Value, to: Value },
}

/// Maelstrom error code: key not found.
pub const ERR_KEY_NOT_FOUND: u32 = 20;
/// Maelstrom error code: compare-and-swap precondition failed.
pub const ERR_CAS_MISMATCH: u32 = 22;
/// Maelstrom error code: request sent to a node that is not the leader.
pub const ERR_NOT_LEADER: u32 = 11;

/// The result of applying an [`OperationKind`] to the store, independent of
/// any wire representation.
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    ReadOk { value: Value },
    WriteOk,
    CasOk,
    Error { code: u32, text: String },
}

/// A total map from opaque JSON keys to opaque JSON values, with no
/// per-key versioning.
#[derive(Default)]
pub struct KvStore {
    state: HashMap<String, Value>,
}

fn key_of(v: &Value) -> String {
    // JSON values aren't `Hash`; Maelstrom keys are scalars, so their
    // canonical JSON text is a stable, collision-free map key.
    v.to_string()
}

impl KvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `op` to the store, returning the reply to send to the client.
    /// Deterministic: identical (state, op) always yields identical output.
    pub fn apply(&mut self, op: &OperationKind) -> Reply {
        match op {
            OperationKind::Read { key } => match self.state.get(&key_of(key)) {
                Some(value) => Reply::ReadOk { value: value.clone() },
                None => Reply::Error {
                    code: ERR_KEY_NOT_FOUND,
                    text: "not found".to_string(),
                },
            },
            OperationKind::Write { key, value } => {
                self.state.insert(key_of(key), value.clone());
                Reply::WriteOk
            }
            OperationKind::Cas { key, from, to } => match self.state.get(&key_of(key)) {
                None => Reply::Error {
                    code: ERR_KEY_NOT_FOUND,
                    text: "not found".to_string(),
                },
                Some(current) if current != from => Reply::Error {
                    code: ERR_CAS_MISMATCH,
                    text: format!("expected {} but had {}", from, current),
                },
                Some(_) => {
                    self.state.insert(key_of(key), to.clone());
                    Reply::CasOk
                }
            },
        }
    }
}
