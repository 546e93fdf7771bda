//! `[setup]` section configuration.
//!
//! Setup commands are submitted once over the control channel after the
//! interpreter is up, before the console starts. Each one waits for its reply;
//! the first failure skips the rest.
//!
//! # Example
//!
//! ```toml
//! [setup]
//! rerun_command = '''
//! from IPython.core.magic import register_line_magic
//! @register_line_magic
//! def rerun(line=""):
//!     get_ipython().run_line_magic("run", '"{path}"')
//! '''
//! autoreload_commands = ["%load_ext autoreload", "%autoreload 2"]
//! reply_timeout_ms = 10000
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One-time session setup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupConfig {
    /// Defines a manual re-run command in the interpreter. `{path}` is the
    /// absolute script path. Empty disables it.
    pub rerun_command: String,

    /// Submitted only with `--autoreload`.
    pub autoreload_commands: Vec<String>,

    /// How long to wait for each setup reply.
    pub reply_timeout_ms: u64,
}

impl SetupConfig {
    pub const fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            rerun_command: concat!(
                "from IPython.core.magic import register_line_magic\n",
                "@register_line_magic\n",
                "def rerun(line=\"\"):\n",
                "    get_ipython().run_line_magic(\"run\", '\"{path}\"')\n",
            )
            .into(),
            autoreload_commands: vec!["%load_ext autoreload".into(), "%autoreload 2".into()],
            reply_timeout_ms: 10_000,
        }
    }
}
