//! Change detection for the watched file.
//!
//! ```text
//! notify (parent dir) → bridge thread → ChangeFilter → Debouncer → change_tx
//! ```
//!
//! The watcher is started in `new` so events that arrive while the monitor
//! is still connecting are buffered, not lost.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::{self, error::TrySendError};

use super::debouncer::Debouncer;
use crate::utils::path::normalize_file_path;

/// Decides whether a raw notify event concerns the watched file.
#[derive(Debug, Clone)]
pub struct ChangeFilter {
    target: PathBuf,
}

impl ChangeFilter {
    /// `target` must already be normalized.
    pub fn new(target: PathBuf) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn matches(&self, event: &Event) -> bool {
        if !is_content_change(&event.kind) {
            return false;
        }

        // A rename reports [from, to]; only the destination counts.
        let paths: &[PathBuf] = match event.kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                event.paths.last().map(std::slice::from_ref).unwrap_or_default()
            }
            _ => &event.paths,
        };

        paths
            .iter()
            .any(|path| !path.is_dir() && normalize_file_path(path) == self.target)
    }
}

/// Event kinds that can leave new content at a path.
fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(CreateKind::File | CreateKind::Any | CreateKind::Other)
            | EventKind::Modify(
                ModifyKind::Data(_)
                    | ModifyKind::Any
                    | ModifyKind::Other
                    | ModifyKind::Name(RenameMode::To | RenameMode::Both | RenameMode::Any)
            )
    )
}

/// Watches one file and emits debounced change signals.
pub struct ChangeDetector {
    /// Channel to receive notify events (sync -> async bridge)
    notify_rx: std::sync::mpsc::Receiver<notify::Result<Event>>,
    /// Watcher handle (must be kept alive)
    _watcher: RecommendedWatcher,
    filter: ChangeFilter,
    debouncer: Debouncer,
}

impl ChangeDetector {
    /// Start watching the parent directory of `target`.
    pub fn new(target: PathBuf, interval: Duration) -> notify::Result<Self> {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;

        let parent = target
            .parent()
            .ok_or_else(|| notify::Error::generic("watched file has no parent directory"))?;
        watcher.watch(parent, RecursiveMode::NonRecursive)?;

        Ok(Self {
            notify_rx,
            _watcher: watcher,
            filter: ChangeFilter::new(target),
            debouncer: Debouncer::new(interval),
        })
    }

    /// Forward admitted changes to `change_tx` until its receiver is dropped.
    ///
    /// `change_tx` should have capacity 1: a change that finds one already
    /// pending is coalesced into it.
    pub async fn run(self, change_tx: mpsc::Sender<()>) {
        let notify_rx = self.notify_rx;
        let filter = self.filter;
        let mut debouncer = self.debouncer;

        let (async_tx, mut async_rx) = mpsc::channel::<Event>(64);

        // Spawn a thread to poll notify events and send to async channel
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break; // Receiver dropped
                        }
                    }
                    Err(e) => crate::log!("monitor"; "watch error: {}", e),
                }
            }
        });

        while let Some(event) = async_rx.recv().await {
            if !filter.matches(&event) {
                continue;
            }

            crate::debug!("monitor"; "event {:?} {:?}", event.kind, event.paths);

            let now = Instant::now();
            if !debouncer.admit(now) {
                crate::debug!("monitor"; "debounced, next run possible in {:?}",
                    debouncer.remaining(now));
                continue;
            }

            match change_tx.try_send(()) {
                Ok(()) => {}
                Err(TrySendError::Full(())) => {
                    crate::debug!("monitor"; "run already pending, change coalesced");
                }
                Err(TrySendError::Closed(())) => break,
            }
        }
    }
}
