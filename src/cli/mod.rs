//! Command-line interface module.

mod args;
pub mod init;
pub mod list;
pub mod render;

pub use args::{Cli, Commands};
