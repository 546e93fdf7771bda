//! Re-runs the watched file in the interpreter and relays its output.
//!
//! One run is one `execute_request`. The reply arrives on the control
//! channel and the output on the notification channel, with no ordering
//! guarantee between the two:
//!
//! ```text
//! submit ──► [notify]  stream* ... status(idle)
//!            [control] execute_reply
//! ```
//!
//! A run ends once its reply has arrived and its idle status has been seen,
//! or `grace` after the reply if the idle status never shows up.

use std::io::{Write, stdout};
use std::path::Path;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};

use crate::config::{AppConfig, render_template};
use crate::log;
use crate::session::{Channel, MessageKind, ReplyStatus, SessionClient, SessionError};

/// Where run output goes.
pub trait Console {
    fn write_output(&mut self, text: &str);

    /// Called once per run, after all of its output.
    fn finish_run(&mut self, prompt: &str);
}

/// The terminal shared with the interactive console.
pub struct StdoutConsole;

impl Console for StdoutConsole {
    fn write_output(&mut self, text: &str) {
        let mut stdout = stdout().lock();
        stdout.write_all(text.as_bytes()).ok();
        stdout.flush().ok();
    }

    fn finish_run(&mut self, prompt: &str) {
        let mut stdout = stdout().lock();
        write!(stdout, "\n{prompt}").ok();
        stdout.flush().ok();
    }
}

pub struct ExecutionCoordinator<C: Console> {
    session: SessionClient,
    console: C,
    run_template: String,
    prompt: String,
    grace: Duration,
}

impl<C: Console> ExecutionCoordinator<C> {
    pub fn new(session: SessionClient, console: C, config: &AppConfig) -> Self {
        Self {
            session,
            console,
            run_template: config.interpreter.run_template.clone(),
            prompt: config.interpreter.prompt.clone(),
            grace: config.monitor.grace(),
        }
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    /// Run `path` once and wait for it to finish.
    ///
    /// Never fails: session errors end the run with a log line.
    pub async fn run_once(&mut self, path: &Path) {
        let code = render_template(&self.run_template, path);

        match self.execute(&code).await {
            Ok(ReplyStatus::Ok) => {}
            Ok(ReplyStatus::Error { ename, evalue }) => {
                self.console.write_output(&format!("{ename}: {evalue}\n"));
            }
            Ok(ReplyStatus::Aborted) => log!("monitor"; "run aborted by interpreter"),
            Ok(ReplyStatus::Unknown) => crate::debug!("monitor"; "reply without a status"),
            Err(e) => log!("error"; "error sending command: {}", e),
        }

        self.console.finish_run(&self.prompt);
    }

    async fn execute(&mut self, code: &str) -> Result<ReplyStatus, SessionError> {
        let stale = self.session.discard_pending()?;
        if stale > 0 {
            crate::debug!("monitor"; "discarded {} queued messages", stale);
        }

        let mut request = self.session.submit(code)?;
        let (replies, notifications) = self.session.receivers();

        let mut status = None;
        let mut idle = false;
        let mut deadline: Option<Instant> = None;

        while status.is_none() || !idle {
            tokio::select! {
                biased;

                item = notifications.recv() => {
                    // once the reply is in, a closed channel has nothing left to drain
                    let msg = match item {
                        Some(Ok(msg)) => msg,
                        Some(Err(e)) if status.is_none() => return Err(e),
                        None if status.is_none() => {
                            return Err(SessionError::ChannelClosed(Channel::Notify));
                        }
                        Some(Err(_)) | None => {
                            crate::debug!("monitor"; "notification channel ended after reply");
                            break;
                        }
                    };
                    if !msg.is_child_of(&request.id) {
                        crate::debug!("monitor"; "discarding {:?} for {:?}", msg.kind, msg.parent);
                        continue;
                    }
                    match msg.kind {
                        MessageKind::Stream => {
                            if let Some(text) = msg.stream_text() {
                                self.console.write_output(text);
                            }
                        }
                        MessageKind::Status => idle |= msg.is_idle(),
                        _ => {}
                    }
                }

                item = replies.recv(), if status.is_none() => {
                    let msg = item.ok_or(SessionError::ChannelClosed(Channel::Control))??;
                    if !msg.is_child_of(&request.id) {
                        crate::debug!("monitor"; "discarding reply to {:?}", msg.parent);
                        continue;
                    }
                    request.mark_complete();
                    status = Some(msg.reply_status());
                    deadline = Some(Instant::now() + self.grace);
                }

                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    crate::debug!("monitor"; "no idle status within {:?}", self.grace);
                    break;
                }
            }
        }

        crate::debug!("monitor"; "run {} finished in {:?}",
            request.id, request.submitted_at.elapsed());
        Ok(status.unwrap_or(ReplyStatus::Unknown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::client::RequestSink;
    use crate::session::message::Message;
    use crate::session::testing::{manual, scripted};
    use serde_json::json;
    use std::path::PathBuf;

    #[derive(Default)]
    struct BufferConsole {
        chunks: Vec<String>,
        prompts: usize,
    }

    impl Console for BufferConsole {
        fn write_output(&mut self, text: &str) {
            self.chunks.push(text.to_owned());
        }

        fn finish_run(&mut self, _prompt: &str) {
            self.prompts += 1;
        }
    }

    fn stream(parent: &str, text: &str) -> (Channel, Message) {
        (
            Channel::Notify,
            Message::child_of(parent, MessageKind::Stream, json!({"name": "stdout", "text": text})),
        )
    }

    fn idle(parent: &str) -> (Channel, Message) {
        (
            Channel::Notify,
            Message::child_of(parent, MessageKind::Status, json!({"execution_state": "idle"})),
        )
    }

    fn reply(parent: &str, content: serde_json::Value) -> (Channel, Message) {
        (
            Channel::Control,
            Message::child_of(parent, MessageKind::ExecuteReply, content),
        )
    }

    fn coordinator(
        session: SessionClient,
        grace_ms: u64,
    ) -> ExecutionCoordinator<BufferConsole> {
        let mut config = AppConfig::default();
        config.monitor.grace_ms = grace_ms;
        ExecutionCoordinator::new(session, BufferConsole::default(), &config)
    }

    #[tokio::test]
    async fn test_streams_then_reply_printed_in_order() {
        let (session, sent) = scripted(|req| {
            vec![
                stream(&req.id, "a\n"),
                stream(&req.id, "b\n"),
                stream(&req.id, "c\n"),
                reply(&req.id, json!({"status": "ok"})),
                idle(&req.id),
            ]
        });
        let mut coordinator = coordinator(session, 200);

        coordinator.run_once(&PathBuf::from("/w/part.py")).await;

        assert_eq!(coordinator.console().chunks, vec!["a\n", "b\n", "c\n"]);
        assert_eq!(coordinator.console().prompts, 1);
        assert_eq!(sent.lock()[0].code(), Some("%run \"/w/part.py\""));
    }

    #[tokio::test]
    async fn test_stale_output_from_previous_run_discarded() {
        let mut first_id: Option<String> = None;
        let (session, _sent) = scripted(move |req| match first_id.clone() {
            None => {
                first_id = Some(req.id.clone());
                vec![reply(&req.id, json!({"status": "ok"})), idle(&req.id)]
            }
            Some(r1) => vec![
                stream(&r1, "late output from run 1\n"),
                stream(&req.id, "run 2\n"),
                reply(&r1, json!({"status": "ok"})),
                reply(&req.id, json!({"status": "ok"})),
                idle(&req.id),
            ],
        });
        let mut coordinator = coordinator(session, 200);
        let path = PathBuf::from("/w/part.py");

        coordinator.run_once(&path).await;
        coordinator.run_once(&path).await;

        assert_eq!(coordinator.console().chunks, vec!["run 2\n"]);
        assert_eq!(coordinator.console().prompts, 2);
    }

    #[tokio::test]
    async fn test_reply_before_output_drains_until_idle() {
        let (session, sent, reply_tx, notify_tx) = manual();
        let mut coordinator = coordinator(session, 5_000);

        let feeder = tokio::spawn(async move {
            let id = loop {
                let first = sent.lock().first().map(|msg| msg.id.clone());
                if let Some(id) = first {
                    break id;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            };
            let _ = reply_tx.send(Ok(reply(&id, json!({"status": "ok"})).1));
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = notify_tx.send(Ok(stream(&id, "late\n").1));
            let _ = notify_tx.send(Ok(idle(&id).1));
        });

        let started = std::time::Instant::now();
        coordinator.run_once(Path::new("/w/a.py")).await;
        feeder.await.unwrap();

        assert_eq!(coordinator.console().chunks, vec!["late\n"]);
        // ended on the idle status, not the grace deadline
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_notifications_closing_after_reply_keeps_status() {
        let (session, sent, reply_tx, notify_tx) = manual();
        let mut coordinator = coordinator(session, 5_000);

        let feeder = tokio::spawn(async move {
            let id = loop {
                let first = sent.lock().first().map(|msg| msg.id.clone());
                if let Some(id) = first {
                    break id;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            };
            let error = json!({"status": "error", "ename": "KeyError", "evalue": "'x'"});
            let _ = reply_tx.send(Ok(reply(&id, error).1));
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = notify_tx.send(Err(SessionError::ChannelClosed(Channel::Notify)));
            drop(notify_tx);
        });

        let started = std::time::Instant::now();
        coordinator.run_once(Path::new("/w/a.py")).await;
        feeder.await.unwrap();

        assert_eq!(coordinator.console().chunks, vec!["KeyError: 'x'\n"]);
        assert_eq!(coordinator.console().prompts, 1);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_missing_idle_ends_after_grace() {
        let (session, _sent) = scripted(|req| {
            vec![
                stream(&req.id, "out\n"),
                reply(&req.id, json!({"status": "ok"})),
            ]
        });
        let mut coordinator = coordinator(session, 50);

        tokio::time::timeout(Duration::from_secs(2), coordinator.run_once(Path::new("/w/a.py")))
            .await
            .unwrap();

        assert_eq!(coordinator.console().chunks, vec!["out\n"]);
        assert_eq!(coordinator.console().prompts, 1);
    }

    #[tokio::test]
    async fn test_error_reply_prints_summary() {
        let (session, _sent) = scripted(|req| {
            vec![
                reply(
                    &req.id,
                    json!({"status": "error", "ename": "ZeroDivisionError", "evalue": "division by zero"}),
                ),
                idle(&req.id),
            ]
        });
        let mut coordinator = coordinator(session, 200);

        coordinator.run_once(Path::new("/w/a.py")).await;

        assert_eq!(
            coordinator.console().chunks,
            vec!["ZeroDivisionError: division by zero\n"]
        );
    }

    #[tokio::test]
    async fn test_closed_channel_ends_run_with_prompt() {
        struct NullSink;
        impl RequestSink for NullSink {
            fn send(&mut self, _msg: &Message) -> Result<(), SessionError> {
                Ok(())
            }
        }

        let (_reply_tx, replies) = tokio::sync::mpsc::unbounded_channel();
        let (notify_tx, notifications) = tokio::sync::mpsc::unbounded_channel();
        drop(notify_tx);
        let session = SessionClient::from_parts(Box::new(NullSink), replies, notifications);
        let mut coordinator = coordinator(session, 200);

        coordinator.run_once(Path::new("/w/a.py")).await;

        assert!(coordinator.console().chunks.is_empty());
        assert_eq!(coordinator.console().prompts, 1);
    }

    #[tokio::test]
    async fn test_no_deadline_without_reply() {
        let (session, _sent) = scripted(|req| vec![stream(&req.id, "still running\n")]);
        let mut coordinator = coordinator(session, 50);

        let run = coordinator.run_once(Path::new("/w/a.py"));
        assert!(
            tokio::time::timeout(Duration::from_millis(300), run)
                .await
                .is_err()
        );
    }
}
