//! Small shared helpers.

pub mod path;
