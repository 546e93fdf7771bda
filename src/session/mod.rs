//! Interpreter session: connection file, wire messages and the two-channel
//! client.
//!
//! # Module Structure
//!
//! ```text
//! session/
//! ├── handle     # SessionHandle (connection file, readiness probe)
//! ├── message    # Message, Signer, ExecutionRequest
//! ├── client     # SessionClient (control + notification channels)
//! └── error      # SessionError
//! ```

pub mod client;
mod error;
mod handle;
pub mod message;
#[cfg(test)]
pub mod testing;

pub use client::SessionClient;
pub use error::{Channel, SessionError};
pub use handle::SessionHandle;
pub use message::{MessageKind, ReplyStatus};
