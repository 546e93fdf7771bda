//! `[monitor]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [monitor]
//! debounce_ms = 1000       # minimum gap between two triggered runs
//! grace_ms = 200           # output drain window after the terminal reply
//! startup_grace_ms = 500   # pause before handing over to the console
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// File monitor timing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub debounce_ms: u64,
    pub grace_ms: u64,
    pub startup_grace_ms: u64,
}

impl MonitorConfig {
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub const fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    pub const fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1000,
            grace_ms: 200,
            startup_grace_ms: 500,
        }
    }
}
