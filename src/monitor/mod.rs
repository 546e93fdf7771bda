//! File monitor subprocess.
//!
//! Started by the launcher as `kernwatch monitor <FILE> <CONNECTION_FILE>`.
//! Watches FILE and re-runs it in the interpreter on every save.
//!
//! # Architecture
//!
//! ```text
//! ChangeDetector ──[capacity 1]──► main loop ──► ExecutionCoordinator ──► interpreter
//!                                      ▲
//! stdin EOF (launcher gone) ───────────┘
//! ```
//!
//! Runs are strictly sequential. Changes that arrive during a run coalesce
//! into at most one follow-up run.

mod coordinator;
mod debouncer;
mod detector;

use coordinator::{ExecutionCoordinator, StdoutConsole};
use detector::ChangeDetector;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};

use crate::config::AppConfig;
use crate::core::{InterruptPolicy, setup_shutdown_handler};
use crate::log;
use crate::session::{SessionClient, SessionHandle};
use crate::utils::path::normalize_file_path;

/// Entry point of the `monitor` subcommand.
pub fn run(file: &Path, connection_file: &Path, config: &AppConfig) -> Result<()> {
    setup_shutdown_handler(InterruptPolicy::Ignore)?;

    let target = normalize_file_path(file);
    let handle = SessionHandle::load(connection_file)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    rt.block_on(monitor_loop(target, handle, config))
}

async fn monitor_loop(target: PathBuf, handle: SessionHandle, config: &AppConfig) -> Result<()> {
    // Watcher first, so saves during the connect are not missed
    let detector = ChangeDetector::new(target.clone(), config.monitor.debounce())
        .with_context(|| format!("failed to watch {}", target.display()))?;
    log!("monitor"; "monitoring {}", target.display());

    let session = SessionClient::connect(&handle).context("failed to connect to interpreter")?;
    log!("monitor"; "connected to interpreter");

    let mut coordinator = ExecutionCoordinator::new(session, StdoutConsole, config);

    let (change_tx, mut change_rx) = mpsc::channel(1);
    tokio::spawn(detector.run(change_tx));
    let mut launcher_gone = watch_launcher();

    loop {
        tokio::select! {
            biased;

            _ = &mut launcher_gone => {
                crate::debug!("monitor"; "launcher gone, exiting");
                break;
            }

            signal = change_rx.recv() => {
                if signal.is_none() {
                    log!("monitor"; "watcher stopped");
                    break;
                }
                log!("monitor"; "change detected, running {}", target.display());
                coordinator.run_once(&target).await;
            }
        }
    }

    Ok(())
}

/// Resolves when stdin reaches EOF, i.e. the launcher closed the pipe or died.
fn watch_launcher() -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        let _ = io::copy(&mut io::stdin().lock(), &mut io::sink());
        let _ = tx.send(());
    });
    rx
}
