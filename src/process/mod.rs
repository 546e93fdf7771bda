//! Child process plumbing for the launcher.
//!
//! # Module Structure
//!
//! ```text
//! process/
//! ├── cmd          # Cmd builder (stdin mode, merged output)
//! ├── relay        # OutputRelay, FilterRule
//! ├── supervisor   # ProcessSupervisor, ManagedChild
//! └── vars         # $KERNWATCH_* substitution
//! ```

mod cmd;
mod relay;
mod supervisor;
mod vars;

pub use cmd::{Cmd, StdinMode};
pub use relay::{FilterRule, OutputRelay};
pub use supervisor::{ManagedChild, ProcessSupervisor};
pub use vars::{build_session_vars, resolve_args};
