//! The Maelstrom wire format: one JSON object per line, `{src, dest, body}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use raft::message::{AppendEntriesRequest, AppendEntriesResponse, RequestVoteRequest, RequestVoteResponse};

/// A complete Maelstrom message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub src: String,
    pub dest: String,
    pub body: Body,
}

/// `msg_id`/`in_reply_to` are carried by every body regardless of `type`;
/// `#[serde(flatten)]` composes this header into each tagged variant below
/// without repeating the two fields in every struct.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Header {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<u64>,
}

/// Every inbound and outbound message body this node sends or understands.
///
/// `raft_init`/`init` and their `*_ok` replies are kept as distinct variants
/// rather than aliased together: the Maelstrom demo repo's two variants of
/// this exercise disagree on which name the harness sends, and keeping them
/// distinct lets the reply echo back whichever name the request used.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Body {
    RaftInit {
        #[serde(flatten)]
        header: Header,
        node_id: String,
        node_ids: Vec<String>,
    },
    Init {
        #[serde(flatten)]
        header: Header,
        node_id: String,
        node_ids: Vec<String>,
    },
    #[serde(rename = "raft_init_ok")]
    RaftInitOk {
        #[serde(flatten)]
        header: Header,
    },
    #[serde(rename = "init_ok")]
    InitOk {
        #[serde(flatten)]
        header: Header,
    },

    RequestVote {
        #[serde(flatten)]
        header: Header,
        #[serde(flatten)]
        body: RequestVoteRequest,
    },
    RequestVoteRes {
        #[serde(flatten)]
        header: Header,
        #[serde(flatten)]
        body: RequestVoteResponse,
    },

    AppendEntries {
        #[serde(flatten)]
        header: Header,
        #[serde(flatten)]
        body: AppendEntriesRequest,
    },
    AppendEntriesRes {
        #[serde(flatten)]
        header: Header,
        #[serde(flatten)]
        body: AppendEntriesResponse,
    },

    Read {
        #[serde(flatten)]
        header: Header,
        key: Value,
    },
    Write {
        #[serde(flatten)]
        header: Header,
        key: Value,
        value: Value,
    },
    Cas {
        #[serde(flatten)]
        header: Header,
        key: Value,
        from: Value,
        to: Value,
    },

    ReadOk {
        #[serde(flatten)]
        header: Header,
        value: Value,
    },
    WriteOk {
        #[serde(flatten)]
        header: Header,
    },
    CasOk {
        #[serde(flatten)]
        header: Header,
    },
    Error {
        #[serde(flatten)]
        header: Header,
        code: u32,
        text: String,
    },
}

impl Body {
    /// The header every variant carries, regardless of `type`.
    pub fn header(&self) -> &Header {
        match self {
            Body::RaftInit { header, .. }
            | Body::Init { header, .. }
            | Body::RaftInitOk { header }
            | Body::InitOk { header }
            | Body::RequestVote { header, .. }
            | Body::RequestVoteRes { header, .. }
            | Body::AppendEntries { header, .. }
            | Body::AppendEntriesRes { header, .. }
            | Body::Read { header, .. }
            | Body::Write { header, .. }
            | Body::Cas { header, .. }
            | Body::ReadOk { header, .. }
            | Body::WriteOk { header }
            | Body::CasOk { header }
            | Body::Error { header, .. } => header,
        }
    }

    pub fn header_mut(&mut self) -> &mut Header {
        match self {
            Body::RaftInit { header, .. }
            | Body::Init { header, .. }
            | Body::RaftInitOk { header }
            | Body::InitOk { header }
            | Body::RequestVote { header, .. }
            | Body::RequestVoteRes { header, .. }
            | Body::AppendEntries { header, .. }
            | Body::AppendEntriesRes { header, .. }
            | Body::Read { header, .. }
            | Body::Write { header, .. }
            | Body::Cas { header, .. }
            | Body::ReadOk { header, .. }
            | Body::WriteOk { header }
            | Body::CasOk { header }
            | Body::Error { header, .. } => header,
        }
    }
}
