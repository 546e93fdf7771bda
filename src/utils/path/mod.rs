//! Path utilities.
//!
//! - [`fs`]: Filesystem path normalization (`normalize_path`, `normalize_file_path`)

pub mod fs;

pub use fs::{expand_tilde, normalize_file_path, normalize_path};
