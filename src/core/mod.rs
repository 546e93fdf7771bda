//! Core process state shared across the launcher and the monitor.

mod state;

pub use state::{InterruptPolicy, is_shutdown, register_shutdown_listener, setup_shutdown_handler};
