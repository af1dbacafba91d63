//! CLI layer for recordkit.
//!
//! Provides the command-line interface using clap, with commands for
//! creating, finding, counting and deleting records and for managing the
//! store.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
