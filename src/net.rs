//! Transport adapter: framed JSON lines over stdin/stdout plus the
//! `msg_id` allocator and reply-callback table.
//!
//! Non-blocking reads are simulated with a dedicated reader thread that does
//! ordinary blocking `read_line` calls and forwards each decoded line to the
//! event loop over a bounded channel; the loop only ever does a non-blocking
//! `try_recv`. This keeps every byte of Raft state touched by exactly one
//! thread of control, matching the concurrency model a crossbeam-channel
//! reader thread feeding a single-owner core typically uses: hand data
//! across a thread boundary, then let a single owner act on it.

use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::thread;

use crossbeam_channel::{bounded, Receiver};
use log::{debug, error, warn};

use raft::state_machine::Reply;
use raft::{AppliedEntry, RaftNode};

use crate::wire::{Body, Envelope, Header};

/// Where outbound lines are written. Production always uses real stdout;
/// tests substitute an in-memory sink so a full dispatch round-trip can be
/// asserted on without touching the process's actual stdio.
type Sink = Box<dyn Write + Send>;

/// A reply handler, captured at RPC-send time with whatever term/context it
/// needs to validate the reply is still meaningful (pass `(term, ...)`
/// explicitly rather than relying on ambient state). Invoked
/// with the node so it can safety-check role/term before acting, and with
/// `net` in case acting on the reply requires sending more messages.
pub type Callback = Box<dyn FnOnce(&mut RaftNode, &mut Net, String, Body, f64) + Send>;

/// Reads framed JSON lines from stdin on a background thread and writes
/// framed JSON lines to stdout, pairing replies to outstanding callbacks.
pub struct Net {
    inbox: Receiver<Envelope>,
    next_msg_id: u64,
    callbacks: HashMap<u64, Callback>,
    out: Sink,
}

/// What `poll_one` found, if anything.
pub enum PollOutcome {
    /// Nothing was waiting.
    Idle,
    /// A reply arrived and its callback was already invoked.
    ReplyHandled,
    /// A request arrived and needs routing by the caller.
    Request(Envelope),
}

impl Net {
    /// Spawns the reader thread and returns the adapter.
    pub fn new() -> Self {
        let (tx, rx) = bounded(1024);
        thread::Builder::new()
            .name("stdin-reader".to_string())
            .spawn(move || {
                let stdin = io::stdin();
                for line in stdin.lock().lines() {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            error!("stdin read error: {}", e);
                            break;
                        }
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Envelope>(&line) {
                        Ok(envelope) => {
                            if tx.send(envelope).is_err() {
                                break;
                            }
                        }
                        Err(e) => error!("malformed line {:?}: {}", line, e),
                    }
                }
            })
            .expect("failed to spawn stdin reader thread");

        Net::with_io(rx, Box::new(io::stdout()))
    }

    /// Builds a `Net` from an already-wired inbox and output sink. `new`
    /// uses this with a real stdin-reading thread and real stdout; tests use
    /// it with a channel and buffer they control directly, exercising the
    /// exact same dispatch/RPC machinery without touching process stdio.
    pub fn with_io(inbox: Receiver<Envelope>, out: Sink) -> Self {
        Net { inbox, next_msg_id: 0, callbacks: HashMap::new(), out }
    }

    fn fresh_msg_id(&mut self) -> u64 {
        self.next_msg_id += 1;
        self.next_msg_id
    }

    fn write_line(&mut self, envelope: &Envelope) {
        let line = serde_json::to_string(envelope).expect("Body always serializes");
        let _ = writeln!(self.out, "{}", line);
        let _ = self.out.flush();
    }

    /// Emits a one-shot message (no reply is ever awaited for it).
    pub fn send(&mut self, src: &str, dest: &str, body: Body) {
        debug!("{} -> {}: {:?}", src, dest, body);
        self.write_line(&Envelope { src: src.to_string(), dest: dest.to_string(), body });
    }

    /// Allocates a fresh `msg_id`, stores `handler` against it, stamps the
    /// body, and emits. `handler` fires exactly once, when (and if) a reply
    /// with matching `in_reply_to` arrives.
    pub fn rpc(&mut self, src: &str, dest: &str, mut body: Body, handler: Callback) {
        let id = self.fresh_msg_id();
        body.header_mut().msg_id = Some(id);
        self.callbacks.insert(id, handler);
        debug!("{} -rpc-> {}: {:?}", src, dest, body);
        self.write_line(&Envelope { src: src.to_string(), dest: dest.to_string(), body });
    }

    /// Replies to `request`, stamping `in_reply_to` from its `msg_id`.
    pub fn reply(&mut self, src: &str, request: &Envelope, mut body: Body) {
        body.header_mut().in_reply_to = request.body.header().msg_id;
        self.write_line(&Envelope { src: src.to_string(), dest: request.src.clone(), body });
    }

    /// Non-blockingly checks for one ready message. A reply (`in_reply_to`
    /// set) is dispatched to its stored callback and never handed back to
    /// the caller; a request is returned for the caller to route by `type`.
    /// Duplicate replies (no callback registered under that id, because it
    /// already fired) are logged and dropped.
    pub fn poll_one(&mut self, node: &mut RaftNode, now: f64) -> PollOutcome {
        let envelope = match self.inbox.try_recv() {
            Ok(envelope) => envelope,
            Err(_) => return PollOutcome::Idle,
        };

        if let Some(id) = envelope.body.header().in_reply_to {
            match self.callbacks.remove(&id) {
                Some(handler) => handler(node, self, envelope.src, envelope.body, now),
                None => warn!("dropping reply with unknown or already-consumed in_reply_to={}", id),
            }
            PollOutcome::ReplyHandled
        } else {
            PollOutcome::Request(envelope)
        }
    }
}

impl Default for Net {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns an applied log entry's reply into the wire `Body` to send to the
/// client that originated it.
pub fn applied_entry_to_body(applied: &AppliedEntry) -> Body {
    let header = Header { msg_id: None, in_reply_to: Some(applied.msg_id) };
    match &applied.reply {
        Reply::ReadOk { value } => Body::ReadOk { header, value: value.clone() },
        Reply::WriteOk => Body::WriteOk { header },
        Reply::CasOk => Body::CasOk { header },
        Reply::Error { code, text } => Body::Error { header, code: *code, text: text.clone() },
    }
}
