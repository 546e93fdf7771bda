//! Session wire messages and frame signing.
//!
//! Every WebSocket text frame is `<signature>\n<json>`. The signature is the
//! hex BLAKE3 keyed hash of the JSON bytes under the session key, or empty
//! when the session runs without a key.
//!
//! ```text
//! 3f9a…c1\n{"id":"…","kind":"stream","parent":"…","content":{"name":"stdout","text":"42\n"}}
//! ```

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use super::error::SessionError;

// =============================================================================
// Message
// =============================================================================

/// Message kinds the monitor cares about. Everything else is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    ExecuteRequest,
    ExecuteReply,
    Stream,
    Status,
    #[serde(other)]
    Other,
}

/// One protocol message on either channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique id of this message. For requests this is the correlation id.
    pub id: String,
    pub kind: MessageKind,
    /// Correlation id of the request this message answers or belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub content: Value,
}

impl Message {
    /// Build an `execute_request` with a fresh correlation id.
    pub fn execute_request(code: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: MessageKind::ExecuteRequest,
            parent: None,
            content: json!({ "code": code, "silent": false }),
        }
    }

    /// Build a message that belongs to request `parent`.
    pub fn child_of(parent: &str, kind: MessageKind, content: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            parent: Some(parent.to_owned()),
            content,
        }
    }

    /// Does this message belong to request `id`?
    pub fn is_child_of(&self, id: &str) -> bool {
        self.parent.as_deref() == Some(id)
    }

    /// Code carried by an `execute_request`.
    pub fn code(&self) -> Option<&str> {
        match self.kind {
            MessageKind::ExecuteRequest => self.content.get("code")?.as_str(),
            _ => None,
        }
    }

    /// Text carried by a `stream` notification.
    pub fn stream_text(&self) -> Option<&str> {
        match self.kind {
            MessageKind::Stream => self.content.get("text")?.as_str(),
            _ => None,
        }
    }

    /// `execution_state` carried by a `status` notification.
    pub fn execution_state(&self) -> Option<&str> {
        match self.kind {
            MessageKind::Status => self.content.get("execution_state")?.as_str(),
            _ => None,
        }
    }

    /// Is this the `idle` status that closes a request's output?
    pub fn is_idle(&self) -> bool {
        self.execution_state() == Some("idle")
    }

    /// Outcome reported by an `execute_reply`.
    pub fn reply_status(&self) -> ReplyStatus {
        let field = |name: &str| {
            self.content
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned()
        };

        match self.content.get("status").and_then(Value::as_str) {
            Some("ok") => ReplyStatus::Ok,
            Some("error") => ReplyStatus::Error {
                ename: field("ename"),
                evalue: field("evalue"),
            },
            Some("abort" | "aborted") => ReplyStatus::Aborted,
            _ => ReplyStatus::Unknown,
        }
    }
}

/// Outcome of one execution as reported by its terminal reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyStatus {
    Ok,
    Error { ename: String, evalue: String },
    Aborted,
    Unknown,
}

// =============================================================================
// ExecutionRequest
// =============================================================================

/// A submitted request, tracked until its terminal reply arrives.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub id: String,
    pub submitted_at: Instant,
    complete: bool,
}

impl ExecutionRequest {
    pub fn new(id: String) -> Self {
        Self {
            id,
            submitted_at: Instant::now(),
            complete: false,
        }
    }

    pub fn mark_complete(&mut self) {
        self.complete = true;
    }

    pub const fn is_complete(&self) -> bool {
        self.complete
    }
}

// =============================================================================
// Signer
// =============================================================================

/// Signs outgoing frames and verifies incoming ones.
#[derive(Clone)]
pub struct Signer {
    key: Option<[u8; 32]>,
}

impl Signer {
    /// Build from the hex key in the connection file. Empty disables signing.
    pub fn from_hex(key: &str) -> Result<Self, SessionError> {
        if key.is_empty() {
            return Ok(Self { key: None });
        }

        let bytes = hex::decode(key).map_err(|e| SessionError::Key(e.to_string()))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| SessionError::Key(format!("expected 32 bytes, got {}", b.len())))?;
        Ok(Self { key: Some(key) })
    }

    fn sign(&self, body: &[u8]) -> String {
        match &self.key {
            Some(key) => blake3::keyed_hash(key, body).to_hex().to_string(),
            None => String::new(),
        }
    }

    /// Serialize and sign a message into one text frame.
    pub fn encode(&self, msg: &Message) -> Result<String, SessionError> {
        let body = serde_json::to_string(msg)?;
        Ok(format!("{}\n{}", self.sign(body.as_bytes()), body))
    }

    /// Verify and parse one text frame.
    pub fn decode(&self, frame: &str) -> Result<Message, SessionError> {
        let (signature, body) = frame.split_once('\n').ok_or(SessionError::Frame)?;

        if let Some(key) = &self.key {
            let claimed =
                blake3::Hash::from_hex(signature).map_err(|_| SessionError::Signature)?;
            // Hash equality is constant-time.
            if claimed != blake3::keyed_hash(key, body.as_bytes()) {
                return Err(SessionError::Signature);
            }
        }

        Ok(serde_json::from_str(body)?)
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("signed", &self.key.is_some())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
