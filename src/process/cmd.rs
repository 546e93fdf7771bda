//! Child process spawning.
//!
//! # Examples
//!
//! ```ignore
//! use crate::process::{Cmd, StdinMode};
//!
//! // Long-lived child with merged output for relaying
//! let (child, output) = Cmd::from_slice(&config.viewer.command)
//!     .stdin(StdinMode::Null)
//!     .merged_output(true)
//!     .spawn()?;
//!
//! // Foreground child sharing the terminal
//! let status = Cmd::from_slice(&console_args).status()?;
//! ```

use crate::utils::path::expand_tilde;
use anyhow::{Context, Result};
use os_pipe::PipeReader;
use std::{
    ffi::{OsStr, OsString},
    process::{Child, Command, ExitStatus, Stdio},
};

/// What the child's stdin is connected to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StdinMode {
    /// Share the launcher's terminal.
    #[default]
    Inherit,
    /// A pipe held by the parent. The child sees EOF once the parent drops
    /// the handle or dies.
    Piped,
    /// Keep the child off the terminal so it cannot steal console input.
    Null,
}

/// Command builder for the supervised children.
#[derive(Default)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    envs: Vec<(String, String)>,
    stdin: StdinMode,
    merged_output: bool,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            ..Default::default()
        }
    }

    /// Create from a command array (e.g., `["python3", "-m", "ocp_vscode"]`).
    ///
    /// A leading `~` in the program is expanded, matching the PATH check in
    /// `AppConfig::check_programs`.
    pub fn from_slice<S: AsRef<OsStr>>(cmd: &[S]) -> Self {
        let mut iter = cmd.iter();
        let program = iter
            .next()
            .map(|s| expand_program(s.as_ref()))
            .unwrap_or_default();
        let args: Vec<_> = iter.map(|s| s.as_ref().to_owned()).collect();
        Self {
            program,
            args,
            ..Default::default()
        }
    }

    /// Add a single argument.
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        let arg = arg.as_ref();
        if !arg.is_empty() {
            self.args.push(arg.to_owned());
        }
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    /// Set environment variables for the subprocess.
    pub fn envs<K, V, I>(mut self, vars: I) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in vars {
            self.envs.push((k.as_ref().to_owned(), v.as_ref().to_owned()));
        }
        self
    }

    /// Set what the child's stdin is connected to.
    pub fn stdin(mut self, mode: StdinMode) -> Self {
        self.stdin = mode;
        self
    }

    /// Send stdout and stderr into a single pipe returned by `spawn`.
    pub fn merged_output(mut self, enable: bool) -> Self {
        self.merged_output = enable;
        self
    }

    /// Get the program name for error messages.
    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().to_string()
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).envs(self.envs.iter().cloned());
        match self.stdin {
            StdinMode::Inherit => {}
            StdinMode::Piped => {
                cmd.stdin(Stdio::piped());
            }
            StdinMode::Null => {
                cmd.stdin(Stdio::null());
            }
        }
        cmd
    }

    /// Start the child without waiting for it.
    ///
    /// With `merged_output`, the read end of the output pipe is returned.
    pub fn spawn(self) -> Result<(Child, Option<PipeReader>)> {
        let name = self.program_name();
        let mut cmd = self.command();

        let reader = if self.merged_output {
            let (reader, writer) = os_pipe::pipe().context("Failed to create output pipe")?;
            let writer_clone = writer
                .try_clone()
                .context("Failed to duplicate output pipe")?;
            cmd.stdout(writer).stderr(writer_clone);
            Some(reader)
        } else {
            None
        };

        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn `{name}`"))?;

        // Release our copies of the write end so the reader sees EOF when
        // the child exits.
        drop(cmd);

        Ok((child, reader))
    }

    /// Run in the foreground, inheriting the terminal, and wait for exit.
    pub fn status(self) -> Result<ExitStatus> {
        let name = self.program_name();
        self.command()
            .status()
            .with_context(|| format!("Failed to execute `{name}`"))
    }
}

fn expand_program(program: &OsStr) -> OsString {
    match program.to_str() {
        Some(raw) if raw.starts_with('~') => expand_tilde(raw).into(),
        _ => program.to_owned(),
    }
}
