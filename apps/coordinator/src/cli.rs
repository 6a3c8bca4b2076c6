// [apps/coordinator/src/cli.rs]
//! Command surface: a worker-facing subcommand that runs the full
//! ingestion loop, and two operator-facing subcommands for inspecting
//! and cancelling a run.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ingest-coordinator",
    version,
    about = "Distributed document-ingestion coordinator"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Joins (or starts) a run and processes the work queue until it
    /// drains or the process is signalled to stop.
    Worker {
        /// Path to the ingestion config TOML.
        #[arg(long, env = "INGEST_CONFIG")]
        config: PathBuf,
    },
    /// Prints the status and queue summary of one run.
    RunStatus {
        run_id: String,
        #[arg(long, env = "COORD_DB_URL", default_value = "file:coordinator.db")]
        db_url: String,
    },
    /// Marks a run `abandoned` regardless of its current queue state.
    RunCancel {
        run_id: String,
        #[arg(long, env = "COORD_DB_URL", default_value = "file:coordinator.db")]
        db_url: String,
    },
}
