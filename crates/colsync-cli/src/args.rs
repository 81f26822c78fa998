//! Command-line arguments.
//!
//! Every connection flag falls back to a `COLSYNC_*` environment variable,
//! so credentials can live in a `.env` file instead of the shell history.

use clap::{Args, Parser, Subcommand};
use colsync::{DatabaseConfig, Reconciler};

/// Reconcile a target database's columns with a reference database.
#[derive(Parser, Debug)]
#[command(name = "colsync", author, version, about, long_about = None)]
pub struct Cli {
    /// Log at debug level (RUST_LOG overrides this)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the column changes a sync would make, and their SQL
    Diff {
        #[command(flatten)]
        databases: DatabaseArgs,

        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Apply the column changes to the target database
    Sync {
        #[command(flatten)]
        databases: DatabaseArgs,

        #[command(flatten)]
        filter: FilterArgs,

        /// Stop at the first failed statement instead of carrying on
        #[arg(long)]
        abort_on_error: bool,

        /// Skip the check for statement separators and comments in column types
        #[arg(long)]
        no_validate: bool,
    },
}

#[derive(Args, Debug)]
pub struct DatabaseArgs {
    #[arg(long, env = "COLSYNC_REFERENCE_HOST", default_value = "localhost")]
    pub reference_host: String,

    #[arg(long, env = "COLSYNC_REFERENCE_PORT", default_value_t = DatabaseConfig::DEFAULT_PORT)]
    pub reference_port: u16,

    #[arg(long, env = "COLSYNC_REFERENCE_DB")]
    pub reference_db: String,

    #[arg(long, env = "COLSYNC_REFERENCE_USER")]
    pub reference_user: String,

    #[arg(long, env = "COLSYNC_REFERENCE_PASSWORD", default_value = "", hide_env_values = true)]
    pub reference_password: String,

    #[arg(long, env = "COLSYNC_TARGET_HOST", default_value = "localhost")]
    pub target_host: String,

    #[arg(long, env = "COLSYNC_TARGET_PORT", default_value_t = DatabaseConfig::DEFAULT_PORT)]
    pub target_port: u16,

    #[arg(long, env = "COLSYNC_TARGET_DB")]
    pub target_db: String,

    #[arg(long, env = "COLSYNC_TARGET_USER")]
    pub target_user: String,

    #[arg(long, env = "COLSYNC_TARGET_PASSWORD", default_value = "", hide_env_values = true)]
    pub target_password: String,
}

impl DatabaseArgs {
    pub fn reference(&self) -> DatabaseConfig {
        DatabaseConfig::new(
            &self.reference_host,
            &self.reference_db,
            &self.reference_user,
            &self.reference_password,
        )
        .port(self.reference_port)
    }

    pub fn target(&self) -> DatabaseConfig {
        DatabaseConfig::new(
            &self.target_host,
            &self.target_db,
            &self.target_user,
            &self.target_password,
        )
        .port(self.target_port)
    }
}

#[derive(Args, Debug)]
pub struct FilterArgs {
    /// Leave this table alone (repeatable)
    #[arg(long = "exclude", value_name = "TABLE")]
    pub exclude: Vec<String>,
}

impl FilterArgs {
    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new().exclude(self.exclude.iter().cloned())
    }
}
