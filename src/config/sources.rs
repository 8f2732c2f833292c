//! Configuration sources, lowest precedence first.

pub mod env_vars;
pub mod global_file;
pub mod workspace_file;
