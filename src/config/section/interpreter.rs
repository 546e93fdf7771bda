//! `[interpreter]` section configuration.
//!
//! The interpreter is the long-lived process that executes the watched
//! script. It must speak the session protocol: read the connection file named
//! by `$KERNWATCH_CONNECTION_FILE` and serve the control and notification
//! WebSocket endpoints listed in it.
//!
//! There is no default `command`: kernwatch does not ship an interpreter, so
//! the section must name one.
//!
//! # Example
//!
//! ```toml
//! [interpreter]
//! command = ["my-kernel", "--connection-file", "$KERNWATCH_CONNECTION_FILE"]
//! ip = "127.0.0.1"
//! startup_timeout_ms = 30000
//! run_template = '%run "{path}"'
//! prompt = ">>> "
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Interpreter process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Program and arguments. `$KERNWATCH_*` variables are resolved.
    pub command: Vec<String>,

    /// Interface the session endpoints bind to.
    pub ip: IpAddr,

    /// How long to wait for the control endpoint to accept connections.
    pub startup_timeout_ms: u64,

    /// Code submitted on every change. `{path}` is the absolute script path.
    pub run_template: String,

    /// Prompt marker printed after each run so the console looks unbroken.
    pub prompt: String,
}

impl InterpreterConfig {
    pub const fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            startup_timeout_ms: 30_000,
            run_template: "%run \"{path}\"".into(),
            prompt: ">>> ".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use crate::config::test_parse_config;

    #[test]
    fn test_interpreter_defaults() {
        let config = test_parse_config("");
        assert!(config.interpreter.command.is_empty());
        assert_eq!(config.interpreter.ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.interpreter.startup_timeout_ms, 30_000);
        assert_eq!(config.interpreter.run_template, "%run \"{path}\"");
        assert_eq!(config.interpreter.prompt, ">>> ");
    }

    #[test]
    fn test_interpreter_override() {
        let config = test_parse_config(
            "[interpreter]\ncommand = [\"my-kernel\", \"$KERNWATCH_CONNECTION_FILE\"]\nprompt = \"In: \"",
        );
        assert_eq!(
            config.interpreter.command,
            vec!["my-kernel", "$KERNWATCH_CONNECTION_FILE"]
        );
        assert_eq!(config.interpreter.prompt, "In: ");
        // untouched fields keep defaults
        assert_eq!(config.interpreter.startup_timeout_ms, 30_000);
    }
}
