//! Configuration management for `kernwatch.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! ├── error          # ConfigError
//! ├── util           # config lookup, template rendering
//! └── mod.rs         # AppConfig (this file)
//! ```
//!
//! The config file is optional. Without one every section uses its defaults.
//! The launcher passes the resolved config path down to the monitor so both
//! processes agree on timing and templates.

mod error;
pub mod section;
mod util;

pub use error::ConfigError;
pub use section::{ConsoleConfig, InterpreterConfig, MonitorConfig, SetupConfig, ViewerConfig};
pub use util::{find_config_file, render_template};

use crate::{cli::Cli, log};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing kernwatch.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Absolute path to the loaded config file, if any (internal use only)
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    #[serde(default)]
    pub interpreter: InterpreterConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub viewer: ViewerConfig,

    #[serde(default)]
    pub console: ConsoleConfig,

    #[serde(default)]
    pub setup: SetupConfig,
}

impl AppConfig {
    /// Load configuration from CLI arguments.
    ///
    /// Searches upward from cwd for the config file; a missing file means
    /// defaults.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config = match find_config_file(&cli.config) {
            Some(path) => {
                let path = crate::utils::path::normalize_path(&path);
                let mut config = Self::from_path(&path)?;
                config.config_path = Some(path);
                config
            }
            None => {
                crate::debug!("launcher"; "no {} found, using defaults", cli.config.display());
                Self::default()
            }
        };

        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;

        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {} (ignored): {}", display_path, fields.join(", "));
    }

    /// Apply CLI flag overrides.
    fn apply_cli(&mut self, cli: &Cli) {
        crate::logger::set_verbose(cli.verbose);

        if cli.no_viewer {
            self.viewer.enable = false;
        }
    }

    /// Validate values that would otherwise fail late, after processes started.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.interpreter.command.is_empty() {
            problems.push(
                "interpreter.command is required: set it in kernwatch.toml to a program \
                 that serves the session endpoints named in $KERNWATCH_CONNECTION_FILE",
            );
        }
        if self.console.command.is_empty() {
            problems.push("console.command is required: set it in kernwatch.toml");
        }
        if self.viewer.enable && self.viewer.command.is_empty() {
            problems.push("viewer.command must not be empty when viewer.enable = true");
        }
        if !self.interpreter.run_template.contains("{path}") {
            problems.push("interpreter.run_template must contain {path}");
        }
        if self.monitor.debounce_ms == 0 {
            problems.push("monitor.debounce_ms must be greater than 0");
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(problems.join("; ")))
        }
    }

    /// Check that every program the launcher will spawn can be found.
    ///
    /// Programs containing `$KERNWATCH_` variables are resolved at spawn time
    /// and are skipped here.
    pub fn check_programs(&self) -> Result<(), ConfigError> {
        let mut commands = vec![
            ("interpreter", &self.interpreter.command),
            ("console", &self.console.command),
        ];
        if self.viewer.enable {
            commands.push(("viewer", &self.viewer.command));
        }

        for (section, command) in commands {
            let Some(program) = command.first() else {
                continue;
            };
            if program.contains("$KERNWATCH_") {
                continue;
            }
            let program = crate::utils::path::expand_tilde(program);
            if which::which(&program).is_err() {
                return Err(ConfigError::ProgramNotFound { section, program });
            }
        }

        Ok(())
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config and panic on unknown fields (to catch config typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> AppConfig {
    let (parsed, ignored) = AppConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_invalid_toml() {
        let result = AppConfig::from_str("[interpreter\nprompt = \"> \"");
        assert!(result.is_err());
    }

    const COMMANDS: &str =
        "[interpreter]\ncommand = [\"my-kernel\"]\n[console]\ncommand = [\"my-repl\"]\n";

    #[test]
    fn test_default_config_requires_commands() {
        let message = format!("{}", AppConfig::default().validate().unwrap_err());
        assert!(message.contains("interpreter.command is required"));
        assert!(message.contains("console.command is required"));
    }

    #[test]
    fn test_config_with_commands_is_valid() {
        assert!(test_parse_config(COMMANDS).validate().is_ok());
    }

    #[test]
    fn test_unknown_fields_detected() {
        let content = "[viewer]\nlabel = \"cad\"\n[unknown_section]\nfield = \"value\"";
        let (config, ignored) = AppConfig::parse_with_ignored(content).unwrap();

        assert_eq!(config.viewer.label, "cad");
        assert!(ignored.iter().any(|f| f.contains("unknown_section")));
    }

    #[test]
    fn test_validate_rejects_template_without_path() {
        let config = test_parse_config("[interpreter]\ncommand = [\"k\"]\nrun_template = \"exec(open('x').read())\"");
        let err = config.validate().unwrap_err();
        assert!(format!("{err}").contains("run_template"));
    }

    #[test]
    fn test_validate_collects_all_problems() {
        let config = test_parse_config("[console]\ncommand = []\n[monitor]\ndebounce_ms = 0");
        let message = format!("{}", config.validate().unwrap_err());
        assert!(message.contains("console.command"));
        assert!(message.contains("debounce_ms"));
    }

    #[test]
    fn test_disabled_viewer_may_have_empty_command() {
        let config = test_parse_config(&format!("{COMMANDS}[viewer]\nenable = false\ncommand = []"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_check_programs_reports_missing_program() {
        let config = test_parse_config(
            "[interpreter]\ncommand = [\"kernwatch-test-no-such-program-xyz\"]",
        );
        match config.check_programs() {
            Err(ConfigError::ProgramNotFound { section, program }) => {
                assert_eq!(section, "interpreter");
                assert_eq!(program, "kernwatch-test-no-such-program-xyz");
            }
            other => panic!("expected ProgramNotFound, got {other:?}"),
        }
    }
}
