//! `[console]` section configuration.
//!
//! The console is the interactive front end the user types into. It attaches
//! to the same interpreter session and owns the terminal until it exits.
//! Like `[interpreter]`, it has no default command.
//!
//! # Example
//!
//! ```toml
//! [console]
//! command = ["my-repl", "--existing", "$KERNWATCH_CONNECTION_FILE"]
//! ```

use serde::{Deserialize, Serialize};

/// Interactive console settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Program and arguments. `$KERNWATCH_*` variables are resolved.
    pub command: Vec<String>,
}
