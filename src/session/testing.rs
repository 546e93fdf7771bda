//! In-process interpreter stand-in for tests.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::client::{RequestSink, SessionClient};
use super::error::{Channel, SessionError};
use super::message::Message;

type Responder = Box<dyn FnMut(&Message) -> Vec<(Channel, Message)> + Send>;
pub type Feed = mpsc::UnboundedSender<Result<Message, SessionError>>;

/// Records every request and answers it with whatever `respond` returns.
struct ScriptedSink {
    sent: Arc<Mutex<Vec<Message>>>,
    respond: Responder,
    replies: Feed,
    notifications: Feed,
}

impl RequestSink for ScriptedSink {
    fn send(&mut self, msg: &Message) -> Result<(), SessionError> {
        self.sent.lock().push(msg.clone());
        for (channel, response) in (self.respond)(msg) {
            let feed = match channel {
                Channel::Control => &self.replies,
                Channel::Notify => &self.notifications,
            };
            let _ = feed.send(Ok(response));
        }
        Ok(())
    }
}

/// Build a client whose interpreter is the `respond` closure.
///
/// Responses are queued in the order returned, per channel.
pub fn scripted<F>(respond: F) -> (SessionClient, Arc<Mutex<Vec<Message>>>)
where
    F: FnMut(&Message) -> Vec<(Channel, Message)> + Send + 'static,
{
    let sent = Arc::new(Mutex::new(Vec::new()));
    let (reply_tx, replies) = mpsc::unbounded_channel();
    let (notify_tx, notifications) = mpsc::unbounded_channel();

    let sink = ScriptedSink {
        sent: Arc::clone(&sent),
        respond: Box::new(respond),
        replies: reply_tx,
        notifications: notify_tx,
    };

    (
        SessionClient::from_parts(Box::new(sink), replies, notifications),
        sent,
    )
}

/// Build a client that only records requests. The returned feeds deliver
/// replies and notifications whenever the test decides.
pub fn manual() -> (SessionClient, Arc<Mutex<Vec<Message>>>, Feed, Feed) {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let (reply_tx, replies) = mpsc::unbounded_channel();
    let (notify_tx, notifications) = mpsc::unbounded_channel();

    let sink = ScriptedSink {
        sent: Arc::clone(&sent),
        respond: Box::new(|_| Vec::new()),
        replies: reply_tx.clone(),
        notifications: notify_tx.clone(),
    };

    (
        SessionClient::from_parts(Box::new(sink), replies, notifications),
        sent,
        reply_tx,
        notify_tx,
    )
}
