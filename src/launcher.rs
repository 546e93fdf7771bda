//! Launcher: starts every cooperating process and hands the terminal to the
//! console.
//!
//! # Startup
//!
//! ```text
//! 1. connection file + interpreter ── wait for control port
//! 2. monitor subprocess (stdin pipe = launcher liveness)
//! 3. viewer, output relayed through FilterRule      (optional)
//! 4. setup commands over the control channel        (first failure skips rest)
//! 5. console in the foreground ── blocks until the user quits
//! ```
//!
//! Every step registers its cleanup with the `ProcessSupervisor` as soon as
//! it succeeds. Returning early with `?` drops the supervisor, which tears
//! down whatever was started so far.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::ColorChoice;
use crossbeam::channel::Receiver;
use rustc_hash::FxHashMap;

use crate::cli::Cli;
use crate::config::{AppConfig, render_template};
use crate::core::{InterruptPolicy, is_shutdown, register_shutdown_listener, setup_shutdown_handler};
use crate::log;
use crate::logger::rule;
use crate::process::{
    Cmd, FilterRule, ManagedChild, OutputRelay, ProcessSupervisor, StdinMode, build_session_vars,
    resolve_args,
};
use crate::session::{ReplyStatus, SessionClient, SessionHandle};

/// Time the monitor gets to exit on its own after its stdin closes.
const MONITOR_EXIT_GRACE: Duration = Duration::from_millis(500);

/// Start everything, run the console, tear everything down.
pub fn launch(cli: &Cli, target: &Path, config: &AppConfig) -> Result<()> {
    config.check_programs()?;

    setup_shutdown_handler(InterruptPolicy::Record)?;
    let (shutdown_tx, shutdown_rx) = crossbeam::channel::bounded(1);
    register_shutdown_listener(shutdown_tx);

    let mut supervisor = ProcessSupervisor::new();

    let handle = start_interpreter(&mut supervisor, config, target, &shutdown_rx)?;
    let vars = build_session_vars(&handle.path, target);
    check_interrupted()?;

    start_monitor(&mut supervisor, cli, config, target, &handle)?;
    check_interrupted()?;

    if config.viewer.enable {
        start_viewer(&mut supervisor, config, &vars)?;
        check_interrupted()?;
    }

    inject_setup(&handle, config, target, cli.autoreload);
    check_interrupted()?;

    // let the monitor connect before the console takes over the terminal
    std::thread::sleep(config.monitor.startup_grace());

    run_console(config, &vars)?;

    supervisor.shutdown();
    Ok(())
}

fn check_interrupted() -> Result<()> {
    if is_shutdown() {
        anyhow::bail!("interrupted during startup");
    }
    Ok(())
}

// ============================================================================
// Startup steps
// ============================================================================

fn start_interpreter(
    supervisor: &mut ProcessSupervisor,
    config: &AppConfig,
    target: &Path,
    shutdown_rx: &Receiver<()>,
) -> Result<SessionHandle> {
    log!("launcher"; "starting interpreter");

    let handle = SessionHandle::allocate(config.interpreter.ip)?;
    handle.write()?;
    log!("launcher"; "connection file {}", handle.path.display());

    // Registered first so it is removed after the interpreter is gone.
    let file = handle.clone();
    supervisor.register("connection file", move || Ok(file.remove()?));

    let vars = build_session_vars(&handle.path, target);
    let args = resolve_args(&config.interpreter.command, &vars);
    let (child, _) = Cmd::from_slice(&args)
        .envs(&vars)
        .stdin(StdinMode::Null)
        .spawn()?;

    let mut child = ManagedChild::new("interpreter", child);
    let ready = handle.wait_ready(config.interpreter.startup_timeout(), shutdown_rx, || {
        child.try_wait()
    });
    supervisor.adopt(child);
    ready.context("interpreter failed to start")?;
    crate::debug!("launcher"; "interpreter listening on {}", handle.control_port);

    Ok(handle)
}

fn start_monitor(
    supervisor: &mut ProcessSupervisor,
    cli: &Cli,
    config: &AppConfig,
    target: &Path,
    handle: &SessionHandle,
) -> Result<()> {
    log!("launcher"; "starting monitor");

    let exe = std::env::current_exe().context("cannot locate the kernwatch executable")?;

    let mut cmd = Cmd::new(exe)
        .arg("monitor")
        .arg(target)
        .arg(&handle.path)
        .args(["--color", color_arg(cli.color)]);
    if let Some(path) = &config.config_path {
        cmd = cmd.arg("-C").arg(path);
    }
    if crate::logger::is_verbose() {
        cmd = cmd.arg("--verbose");
    }

    let (child, _) = cmd.stdin(StdinMode::Piped).spawn()?;
    supervisor.adopt(ManagedChild::new("monitor", child).with_grace(MONITOR_EXIT_GRACE));
    Ok(())
}

fn start_viewer(
    supervisor: &mut ProcessSupervisor,
    config: &AppConfig,
    vars: &FxHashMap<String, String>,
) -> Result<()> {
    let viewer = &config.viewer;
    log!("launcher"; "starting {}", viewer.label);

    let args = resolve_args(&viewer.command, vars);
    let (child, output) = Cmd::from_slice(&args)
        .envs(vars)
        .stdin(StdinMode::Null)
        .merged_output(true)
        .spawn()?;
    supervisor.adopt(ManagedChild::new(viewer.label.as_str(), child));

    if let Some(output) = output {
        let filter = FilterRule::new(viewer.quiet_prefixes.iter().cloned());
        OutputRelay::spawn(viewer.label.clone(), output, filter)
            .context("failed to start output relay")?;
    }
    Ok(())
}

/// Submit the one-time setup commands. Failures are logged, never fatal.
fn inject_setup(handle: &SessionHandle, config: &AppConfig, target: &Path, autoreload: bool) {
    let commands = setup_commands(config, target, autoreload);
    if commands.is_empty() {
        return;
    }

    let result = SessionClient::connect(handle)
        .context("cannot connect to interpreter")
        .and_then(|mut client| {
            submit_all(&mut client, &commands, config.setup.reply_timeout(), is_shutdown)
        });
    if let Err(e) = result {
        log!("error"; "setup failed, skipping remaining setup: {:#}", e);
    }
}

fn setup_commands(config: &AppConfig, target: &Path, autoreload: bool) -> Vec<String> {
    let mut commands = Vec::new();
    if !config.setup.rerun_command.is_empty() {
        commands.push(render_template(&config.setup.rerun_command, target));
    }
    if autoreload {
        commands.extend(config.setup.autoreload_commands.iter().cloned());
    }
    commands
}

/// Submit `commands` in order, stopping at the first one that fails or
/// raises in the interpreter.
fn submit_all(
    client: &mut SessionClient,
    commands: &[String],
    timeout: Duration,
    interrupted: impl Fn() -> bool,
) -> Result<()> {
    for code in commands {
        if interrupted() {
            anyhow::bail!("interrupted during setup");
        }

        let summary = code.lines().next().unwrap_or_default();
        crate::debug!("launcher"; "setup: {}", summary);

        let mut request = client.submit(code)?;
        let reply = client
            .await_reply(&mut request, timeout)
            .with_context(|| format!("`{summary}`"))?;

        if let ReplyStatus::Error { ename, evalue } = reply.reply_status() {
            anyhow::bail!("`{summary}` raised {ename}: {evalue}");
        }
    }

    Ok(())
}

fn run_console(config: &AppConfig, vars: &FxHashMap<String, String>) -> Result<()> {
    log!("launcher"; "handing over to console");
    rule();

    let args = resolve_args(&config.console.command, vars);
    let status = Cmd::from_slice(&args).envs(vars).status()?;

    rule();
    if !status.success() {
        crate::debug!("launcher"; "console exited with {}", status);
    }
    log!("launcher"; "console exited, shutting down");
    Ok(())
}

const fn color_arg(choice: ColorChoice) -> &'static str {
    match choice {
        ColorChoice::Always => "always",
        ColorChoice::Never => "never",
        ColorChoice::Auto => "auto",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;
    use crate::session::message::Message;
    use crate::session::testing::scripted;
    use crate::session::{Channel, MessageKind};
    use serde_json::json;
    use std::path::PathBuf;
    use std::time::Instant;

    fn setup_script() -> Vec<String> {
        vec!["def rerun(): pass".to_owned(), "%load_ext autoreload".to_owned()]
    }

    fn reply_to(request: &Message, content: serde_json::Value) -> Vec<(Channel, Message)> {
        vec![(
            Channel::Control,
            Message::child_of(&request.id, MessageKind::ExecuteReply, content),
        )]
    }

    #[test]
    fn test_setup_commands_without_autoreload() {
        let config = AppConfig::default();
        let target = PathBuf::from("/w/part.py");

        let commands = setup_commands(&config, &target, false);

        assert_eq!(commands.len(), 1);
        assert!(commands[0].contains("\"/w/part.py\""));
        assert!(commands[0].contains("def rerun"));
    }

    #[test]
    fn test_setup_commands_with_autoreload() {
        let config = AppConfig::default();
        let commands = setup_commands(&config, Path::new("/w/part.py"), true);

        assert_eq!(commands[1..], ["%load_ext autoreload", "%autoreload 2"]);
    }

    #[test]
    fn test_empty_rerun_command_skipped() {
        let config = test_parse_config("[setup]\nrerun_command = \"\"");
        assert!(setup_commands(&config, Path::new("/w/a.py"), false).is_empty());
    }

    #[test]
    fn test_color_arg() {
        assert_eq!(color_arg(ColorChoice::Never), "never");
        assert_eq!(color_arg(ColorChoice::Auto), "auto");
    }

    #[test]
    fn test_submit_all_runs_every_command() {
        let (mut client, sent) = scripted(|req| reply_to(req, json!({"status": "ok"})));

        submit_all(&mut client, &setup_script(), Duration::from_secs(1), || false).unwrap();

        let codes: Vec<_> = sent.lock().iter().filter_map(|m| m.code().map(str::to_owned)).collect();
        assert_eq!(codes, setup_script());
    }

    #[test]
    fn test_error_reply_skips_remaining_setup() {
        let (mut client, sent) = scripted(|req| {
            reply_to(req, json!({"status": "error", "ename": "NameError", "evalue": "x"}))
        });

        let err = submit_all(&mut client, &setup_script(), Duration::from_secs(1), || false)
            .unwrap_err();

        assert!(format!("{err:#}").contains("NameError"));
        assert_eq!(sent.lock().len(), 1);
    }

    #[test]
    fn test_setup_reply_timeout_is_an_error() {
        let (mut client, sent) = scripted(|_| Vec::new());

        let err = submit_all(&mut client, &setup_script(), Duration::from_millis(50), || false)
            .unwrap_err();

        assert!(format!("{err:#}").contains("timed out"));
        assert_eq!(sent.lock().len(), 1);
    }

    #[test]
    fn test_interrupted_setup_submits_nothing() {
        let (mut client, sent) = scripted(|req| reply_to(req, json!({"status": "ok"})));

        assert!(submit_all(&mut client, &setup_script(), Duration::from_secs(1), || true).is_err());
        assert!(sent.lock().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_interpreter_exiting_at_startup_fails_fast() {
        let config = test_parse_config(
            "[interpreter]\ncommand = [\"sh\", \"-c\", \"exit 3\"]\nstartup_timeout_ms = 10000",
        );
        let (_tx, rx) = crossbeam::channel::bounded(1);
        let mut supervisor = ProcessSupervisor::new();

        let started = Instant::now();
        let err = start_interpreter(&mut supervisor, &config, Path::new("/w/a.py"), &rx)
            .unwrap_err();

        assert!(format!("{err:#}").contains("exited"));
        assert!(started.elapsed() < Duration::from_secs(5));
        // the connection file cleanup is still registered
        assert!(!supervisor.is_empty());
    }
}
