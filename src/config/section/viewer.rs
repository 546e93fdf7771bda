//! `[viewer]` section configuration.
//!
//! The visualization tool runs alongside the session. Its combined
//! stdout/stderr is relayed to the console with a `[label]` tag, minus lines
//! starting with one of `quiet_prefixes`.
//!
//! # Example
//!
//! ```toml
//! [viewer]
//! enable = true
//! command = ["python3", "-m", "ocp_vscode"]
//! label = "ocp_vscode"
//! quiet_prefixes = ["DEBUG:", "INFO: [ocp_vscode]", "127.0.0.1 - -"]
//! ```

use serde::{Deserialize, Serialize};

/// Visualization tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Start the visualization tool at all.
    pub enable: bool,

    /// Program and arguments. `$KERNWATCH_*` variables are resolved.
    pub command: Vec<String>,

    /// Tag printed in front of relayed lines.
    pub label: String,

    /// Relayed lines starting with any of these (after trimming) are dropped.
    pub quiet_prefixes: Vec<String>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            enable: true,
            command: vec!["python3".into(), "-m".into(), "ocp_vscode".into()],
            label: "ocp_vscode".into(),
            quiet_prefixes: vec![
                "DEBUG:".into(),
                "INFO: [ocp_vscode]".into(),
                "127.0.0.1 - -".into(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_viewer_defaults() {
        let config = test_parse_config("");
        assert!(config.viewer.enable);
        assert_eq!(config.viewer.label, "ocp_vscode");
        assert_eq!(config.viewer.quiet_prefixes.len(), 3);
    }

    #[test]
    fn test_viewer_disabled() {
        let config = test_parse_config("[viewer]\nenable = false");
        assert!(!config.viewer.enable);
        assert_eq!(config.viewer.command, vec!["python3", "-m", "ocp_vscode"]);
    }
}
