//! Ordered teardown of everything the launcher started.
//!
//! Each startup step registers its cleanup right after it succeeds. Cleanups
//! run in reverse registration order, from `shutdown()` or from `Drop` when
//! an early `?` unwinds the launcher.
//!
//! ```text
//! register: interpreter → monitor → viewer
//! shutdown: viewer → monitor → interpreter
//! ```

use std::io;
use std::process::{Child, ExitStatus};
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::log;

/// Poll interval while waiting for a child to exit on its own.
const EXIT_POLL: Duration = Duration::from_millis(20);

/// A spawned child plus how politely to stop it.
pub struct ManagedChild {
    label: String,
    child: Child,
    /// How long to wait for a voluntary exit after closing stdin.
    grace: Duration,
}

impl ManagedChild {
    pub fn new(label: impl Into<String>, child: Child) -> Self {
        Self {
            label: label.into(),
            child,
            grace: Duration::ZERO,
        }
    }

    /// Give the child `grace` to exit after its stdin is closed.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Exit status if the child has already exited.
    pub fn try_wait(&mut self) -> Option<ExitStatus> {
        self.child.try_wait().ok().flatten()
    }

    /// Stop the child and reap it. An already exited child is fine.
    pub fn terminate(&mut self) -> io::Result<()> {
        // EOF on stdin is the polite request to stop
        drop(self.child.stdin.take());

        let deadline = Instant::now() + self.grace;
        loop {
            if let Some(status) = self.child.try_wait()? {
                crate::debug!("launcher"; "{} exited with {}", self.label, status);
                return Ok(());
            }
            if Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(EXIT_POLL);
        }

        match self.child.kill() {
            // raced with a natural exit
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => {}
            other => other?,
        }
        self.child.wait()?;
        crate::debug!("launcher"; "{} stopped", self.label);
        Ok(())
    }
}

struct Cleanup {
    label: String,
    action: Box<dyn FnOnce() -> Result<()> + Send>,
}

/// Stack of cleanup actions, released last-in first-out.
#[derive(Default)]
pub struct ProcessSupervisor {
    cleanups: Vec<Cleanup>,
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an arbitrary cleanup action.
    pub fn register<F>(&mut self, label: impl Into<String>, action: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.cleanups.push(Cleanup {
            label: label.into(),
            action: Box::new(action),
        });
    }

    /// Take ownership of a child; it is terminated on shutdown.
    pub fn adopt(&mut self, mut child: ManagedChild) {
        let label = child.label().to_owned();
        crate::debug!("launcher"; "{} running as pid {}", label, child.id());
        self.register(label, move || Ok(child.terminate()?));
    }

    pub fn len(&self) -> usize {
        self.cleanups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cleanups.is_empty()
    }

    /// Run every registered cleanup in reverse order.
    ///
    /// Failures are logged and do not stop the remaining cleanups.
    pub fn shutdown(&mut self) {
        while let Some(cleanup) = self.cleanups.pop() {
            crate::debug!("launcher"; "stopping {}", cleanup.label);
            if let Err(e) = (cleanup.action)() {
                log!("error"; "failed to stop {}: {:#}", cleanup.label, e);
            }
        }
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
