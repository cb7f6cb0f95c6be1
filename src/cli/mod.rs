//! CLI argument parsing and command dispatch.

pub mod args;
pub mod cache;
pub mod calls;
pub mod stats;
pub mod trunks;

pub use args::{Cli, Commands, OutputFormat};
