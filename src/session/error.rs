//! Session error types.

use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Which of the two session channels an error concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Request/terminal-reply channel.
    Control,
    /// Broadcast notification channel.
    Notify,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Control => "control",
            Self::Notify => "notification",
        })
    }
}

/// Errors raised while talking to the interpreter session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot access connection file `{0}`")]
    Handle(PathBuf, #[source] std::io::Error),

    #[error("malformed connection file `{0}`")]
    HandleFormat(PathBuf, #[source] serde_json::Error),

    #[error("invalid session key: {0}")]
    Key(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("websocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),

    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed frame: missing signature line")]
    Frame,

    #[error("message signature mismatch")]
    Signature,

    #[error("{0} channel closed")]
    ChannelClosed(Channel),

    #[error("timed out after {0:?} waiting for a reply")]
    Timeout(Duration),

    #[error("interpreter did not accept connections within {0:?}")]
    NotReady(Duration),

    #[error("interpreter exited with {0}")]
    Exited(ExitStatus),

    #[error("interrupted")]
    Interrupted,
}

impl From<tungstenite::Error> for SessionError {
    fn from(err: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}
