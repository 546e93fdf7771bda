//! Process-wide shutdown state.
//!
//! Ctrl+C is delivered to the whole foreground process group, so the launcher,
//! the monitor and the console all see it. The console owns the interrupt; the
//! other processes only record it:
//! - Launcher: sets SHUTDOWN so startup steps bail out early, and notifies any
//!   registered listener. The console wait is not interrupted.
//! - Monitor: ignores it. The monitor stops when its parent goes away.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::channel::Sender;

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Shutdown signal sender for a listener that wants to be woken
static SHUTDOWN_TX: OnceLock<Sender<()>> = OnceLock::new();

/// How this process reacts to Ctrl+C.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptPolicy {
    /// Record the interrupt and wake listeners.
    Record,
    /// Leave the interrupt to the console sharing our process group.
    Ignore,
}

/// Setup the global Ctrl+C handler. Call once at program start.
pub fn setup_shutdown_handler(policy: InterruptPolicy) -> anyhow::Result<()> {
    ctrlc::set_handler(move || match policy {
        InterruptPolicy::Record => request_shutdown(),
        InterruptPolicy::Ignore => crate::debug!("monitor"; "interrupt ignored"),
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Register a channel that receives `()` once shutdown is requested.
pub fn register_shutdown_listener(tx: Sender<()>) {
    let _ = SHUTDOWN_TX.set(tx);
}

/// Mark shutdown as requested and wake the registered listener.
pub fn request_shutdown() {
    SHUTDOWN.store(true, Ordering::SeqCst);
    if let Some(tx) = SHUTDOWN_TX.get() {
        let _ = tx.try_send(());
    }
}

/// Check if shutdown has been requested
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}
