use std::path::PathBuf;

use clap::{Parser, Subcommand};
use jobwatch_status::JobStatus;

/// jobwatch - inspect tracked jobs and ask them to stop
#[derive(Parser, Debug)]
#[command(name = "jobwatch")]
#[command(version)]
#[command(about = "Inspect job status records and request kills", long_about = None)]
pub struct Cli {
    /// Configuration file (overrides JOBWATCH_CONFIG_PATH)
    #[arg(short = 'c', long = "config-path", global = true)]
    pub config_path: Option<PathBuf>,

    /// Redis URL (overrides the configured one)
    #[arg(long = "redis-url", global = true)]
    pub redis_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print one status record as JSON
    Show { job_id: String },

    /// List stored records in job id order
    List {
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Maximum number of records to print
        #[arg(long)]
        limit: Option<usize>,

        /// Print whole records instead of `job_id status`
        #[arg(long)]
        full: bool,
    },

    /// Print the number of stored records
    Count,

    /// Ask a waiting or working job to stop
    Kill { job_id: String },

    /// List outstanding kill requests
    Kills,

    /// Delete records, optionally only those in the given statuses
    Purge {
        #[arg(long = "status", value_name = "STATUS")]
        statuses: Vec<JobStatus>,
    },

    /// Delete one record and its kill request
    Delete { job_id: String },
}
