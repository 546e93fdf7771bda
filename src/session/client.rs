//! Client side of the interpreter session.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────── control socket ────────────┐
//! submit() ──► RequestSink ──► IO thread ──► interpreter ──┘
//!                                  │
//! replies ◄────────────────────────┘
//!
//! notifications ◄── IO thread ◄── notify socket ◄── interpreter (broadcast)
//! ```
//!
//! Each socket is owned by a blocking IO thread. Incoming frames are decoded
//! and forwarded through unbounded tokio channels, so the monitor can
//! `select!` over both channels while the launcher polls them synchronously.

use std::net::TcpStream;
use std::sync::mpsc as std_mpsc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, error::TryRecvError};
use tungstenite::handshake::HandshakeError;
use tungstenite::protocol::Message as WsMessage;
use tungstenite::WebSocket;

use super::error::{Channel, SessionError};
use super::handle::SessionHandle;
use super::message::{ExecutionRequest, Message, Signer};

/// Socket read timeout. Bounds how long an outgoing request waits for the
/// IO thread to notice it.
const READ_POLL: Duration = Duration::from_millis(20);

/// Decoded messages (or the error that ended a channel) from one socket.
pub type Incoming = mpsc::UnboundedReceiver<Result<Message, SessionError>>;

/// Where execution requests go.
pub trait RequestSink: Send {
    fn send(&mut self, msg: &Message) -> Result<(), SessionError>;
}

/// Hands signed frames to the control socket's IO thread.
struct WsRequestSink {
    tx: std_mpsc::Sender<String>,
    signer: Signer,
}

impl RequestSink for WsRequestSink {
    fn send(&mut self, msg: &Message) -> Result<(), SessionError> {
        let frame = self.signer.encode(msg)?;
        self.tx
            .send(frame)
            .map_err(|_| SessionError::ChannelClosed(Channel::Control))
    }
}

/// A connection to the interpreter over both channels.
pub struct SessionClient {
    sink: Box<dyn RequestSink>,
    replies: Incoming,
    notifications: Incoming,
}

impl SessionClient {
    /// Connect both channels of the session described by `handle`.
    pub fn connect(handle: &SessionHandle) -> Result<Self, SessionError> {
        let signer = handle.signer()?;

        let control = open_socket(handle, Channel::Control)?;
        let notify = open_socket(handle, Channel::Notify)?;

        let (out_tx, out_rx) = std_mpsc::channel();
        let (reply_tx, replies) = mpsc::unbounded_channel();
        let (notify_tx, notifications) = mpsc::unbounded_channel();

        spawn_io(Channel::Control, control, signer.clone(), Some(out_rx), reply_tx)?;
        spawn_io(Channel::Notify, notify, signer.clone(), None, notify_tx)?;

        crate::debug!("session"; "connected to {} and {}",
            handle.url(Channel::Control), handle.url(Channel::Notify));

        Ok(Self::from_parts(
            Box::new(WsRequestSink { tx: out_tx, signer }),
            replies,
            notifications,
        ))
    }

    /// Assemble a client from an arbitrary sink and incoming channels.
    pub fn from_parts(sink: Box<dyn RequestSink>, replies: Incoming, notifications: Incoming) -> Self {
        Self {
            sink,
            replies,
            notifications,
        }
    }

    /// Send `code` for execution. Returns the request to correlate against.
    pub fn submit(&mut self, code: &str) -> Result<ExecutionRequest, SessionError> {
        let msg = Message::execute_request(code);
        self.sink.send(&msg)?;
        crate::debug!("session"; "submitted request {}", msg.id);
        Ok(ExecutionRequest::new(msg.id))
    }

    /// Both incoming channels, for `select!`.
    pub fn receivers(&mut self) -> (&mut Incoming, &mut Incoming) {
        (&mut self.replies, &mut self.notifications)
    }

    /// Drop everything already queued. Returns the number of discarded
    /// messages; a queued channel error is returned instead.
    pub fn discard_pending(&mut self) -> Result<usize, SessionError> {
        let mut discarded = 0;
        for rx in [&mut self.replies, &mut self.notifications] {
            while let Ok(item) = rx.try_recv() {
                item?;
                discarded += 1;
            }
        }
        Ok(discarded)
    }

    /// Block until the terminal reply for `request` arrives.
    ///
    /// Notifications are discarded while waiting. Used outside the async
    /// runtime, for the launcher's setup commands.
    pub fn await_reply(
        &mut self,
        request: &mut ExecutionRequest,
        timeout: Duration,
    ) -> Result<Message, SessionError> {
        let deadline = Instant::now() + timeout;

        loop {
            while let Ok(item) = self.notifications.try_recv() {
                item?;
            }

            match self.replies.try_recv() {
                Ok(Ok(reply)) if reply.is_child_of(&request.id) => {
                    request.mark_complete();
                    return Ok(reply);
                }
                Ok(Ok(stale)) => {
                    crate::debug!("session"; "discarding reply to {:?}", stale.parent);
                }
                Ok(Err(e)) => return Err(e),
                Err(TryRecvError::Disconnected) => {
                    return Err(SessionError::ChannelClosed(Channel::Control));
                }
                Err(TryRecvError::Empty) => {
                    if Instant::now() >= deadline {
                        return Err(SessionError::Timeout(timeout));
                    }
                    std::thread::sleep(READ_POLL);
                }
            }
        }
    }
}

// =============================================================================
// Socket IO
// =============================================================================

fn open_socket(
    handle: &SessionHandle,
    channel: Channel,
) -> Result<WebSocket<TcpStream>, SessionError> {
    let stream = TcpStream::connect(handle.socket_addr(channel)?)?;
    stream.set_nodelay(true)?;

    let (ws, _response) =
        tungstenite::client(handle.url(channel).as_str(), stream).map_err(|e| match e {
            HandshakeError::Failure(err) => SessionError::from(err),
            HandshakeError::Interrupted(_) => SessionError::Io(std::io::Error::new(
                std::io::ErrorKind::Interrupted,
                format!("{channel} handshake interrupted"),
            )),
        })?;

    // Switch to timed reads so the IO thread can interleave writes.
    ws.get_ref().set_read_timeout(Some(READ_POLL))?;
    Ok(ws)
}

fn spawn_io(
    channel: Channel,
    ws: WebSocket<TcpStream>,
    signer: Signer,
    outgoing: Option<std_mpsc::Receiver<String>>,
    incoming: mpsc::UnboundedSender<Result<Message, SessionError>>,
) -> Result<(), SessionError> {
    std::thread::Builder::new()
        .name(format!("session-{channel}"))
        .spawn(move || io_loop(channel, ws, &signer, outgoing, &incoming))?;
    Ok(())
}

fn io_loop(
    channel: Channel,
    mut ws: WebSocket<TcpStream>,
    signer: &Signer,
    outgoing: Option<std_mpsc::Receiver<String>>,
    incoming: &mpsc::UnboundedSender<Result<Message, SessionError>>,
) {
    loop {
        if let Some(out) = &outgoing {
            loop {
                match out.try_recv() {
                    Ok(frame) => {
                        if let Err(e) = ws.send(WsMessage::Text(frame.into())) {
                            let _ = incoming.send(Err(e.into()));
                            return;
                        }
                    }
                    Err(std_mpsc::TryRecvError::Empty) => break,
                    Err(std_mpsc::TryRecvError::Disconnected) => {
                        let _ = ws.close(None);
                        return;
                    }
                }
            }
        }

        if incoming.is_closed() {
            let _ = ws.close(None);
            return;
        }

        match ws.read() {
            Ok(WsMessage::Text(text)) => {
                if incoming.send(signer.decode(text.as_str())).is_err() {
                    return;
                }
            }
            Ok(WsMessage::Close(_))
            | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                crate::debug!("session"; "{} channel closed by interpreter", channel);
                let _ = incoming.send(Err(SessionError::ChannelClosed(channel)));
                return;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(ref e))
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) => {}
            Err(e) => {
                let _ = incoming.send(Err(e.into()));
                return;
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
