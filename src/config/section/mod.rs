//! Configuration section definitions.
//!
//! Each module corresponds to a section in `kernwatch.toml`:
//!
//! | Module        | TOML Section    | Purpose                               |
//! |---------------|-----------------|---------------------------------------|
//! | `interpreter` | `[interpreter]` | Interpreter command, run template     |
//! | `monitor`     | `[monitor]`     | Debounce and drain timing             |
//! | `viewer`      | `[viewer]`      | Visualization tool and output filter  |
//! | `console`     | `[console]`     | Interactive console command           |
//! | `setup`       | `[setup]`       | One-time session setup commands       |

mod console;
mod interpreter;
mod monitor;
mod setup;
mod viewer;

pub use console::ConsoleConfig;
pub use interpreter::InterpreterConfig;
pub use monitor::MonitorConfig;
pub use setup::SetupConfig;
pub use viewer::ViewerConfig;
