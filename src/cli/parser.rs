//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default application name; also the store file stem.
pub const DEFAULT_APP_NAME: &str = "recordkit";

/// recordkit: active-record finders over a `SQLite` store.
///
/// Creates, finds, counts and deletes records of the entities declared in
/// a JSON schema definition.
#[derive(Parser, Debug)]
#[command(name = "recordkit")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Application name. The store file is `<store-dir>/<app-name>.sqlite`.
    #[arg(long, env = "RECORDKIT_APP_NAME", default_value = DEFAULT_APP_NAME, global = true)]
    pub app_name: String,

    /// Directory holding the store file.
    ///
    /// Defaults to the platform data directory.
    #[arg(long, env = "RECORDKIT_STORE_DIR", global = true)]
    pub store_dir: Option<PathBuf>,

    /// Path to the JSON schema definition.
    #[arg(short, long, env = "RECORDKIT_SCHEMA", global = true)]
    pub schema: Option<PathBuf>,

    /// Run against a transient in-memory store instead of the store file.
    #[arg(long, global = true)]
    pub in_memory: bool,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show store status and record counts.
    Status,

    /// Create and save a record.
    Create {
        /// Entity name.
        entity: String,

        /// Attributes as a JSON object, e.g. `{"first_name": "John"}`.
        #[arg(default_value = "{}")]
        attributes: String,
    },

    /// Find records matching a condition.
    Where {
        /// Entity name.
        entity: String,

        /// Condition: a JSON object of field equalities, or a raw SQL
        /// expression such as `age > 30`.
        condition: String,

        /// Sort order, e.g. `"lastName ASC, firstName"`.
        #[arg(short, long)]
        order: Option<String>,

        /// Maximum number of records.
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List every record of an entity.
    All {
        /// Entity name.
        entity: String,

        /// Sort order.
        #[arg(short, long)]
        order: Option<String>,
    },

    /// Count records.
    Count {
        /// Entity name.
        entity: String,

        /// Optional condition, as for `where`.
        #[arg(short, long)]
        condition: Option<String>,
    },

    /// Delete every record of an entity.
    #[command(name = "delete-all")]
    DeleteAll {
        /// Entity name.
        entity: String,
    },

    /// Delete the store file and start over with an empty store.
    Reset {
        /// Skip confirmation prompt.
        #[arg(short = 'y', long)]
        yes: bool,
    },
}
