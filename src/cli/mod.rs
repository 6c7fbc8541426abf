use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod build;
pub mod database;
pub mod deploy;
pub mod full;
pub mod help;
pub mod logs;
pub mod setup;
pub mod status;

#[derive(Parser)]
#[command(
    name = "hmsg-deploy",
    version,
    about = "Build, provision and deploy the health message app to a single host",
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Path to hmsg.toml
    #[arg(short, long, default_value = "hmsg.toml", global = true)]
    pub config: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create local working directories (logs/, .hmsg/)
    Setup,

    /// Build the image for the deploy platform and push it
    Build {
        /// Image tag (defaults to a timestamp)
        tag: Option<String>,
    },

    /// Replace the running container for an environment
    Deploy {
        /// Target environment (defaults to $ENVIRONMENT, then production)
        environment: Option<String>,
        /// Host port for the frontend
        #[arg(long)]
        frontend_port: Option<u16>,
        /// Host port for the backend
        #[arg(long)]
        backend_port: Option<u16>,
        /// Database is managed elsewhere; do not require the local config file
        #[arg(long)]
        external_db: bool,
        /// Image tag to deploy
        #[arg(long, default_value = "latest")]
        tag: String,
    },

    /// Provision PostgreSQL on the host, or print managed database instructions
    Database {
        #[arg(value_enum, default_value_t = DatabaseMode::Local)]
        mode: DatabaseMode,
    },

    /// Build, push, then deploy the new tag
    Full {
        /// Target environment (defaults to $ENVIRONMENT, then production)
        environment: Option<String>,
        /// Image tag (defaults to a timestamp)
        #[arg(long)]
        tag: Option<String>,
    },

    /// Show containers, database service and disk usage on the host
    Status,

    /// Tail logs of an environment's container
    Logs {
        /// Target environment (defaults to $ENVIRONMENT, then production)
        environment: Option<String>,
        /// Number of lines to tail
        #[arg(short = 'n', long, default_value = "100")]
        lines: usize,
    },

    /// Show usage and required environment variables
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DatabaseMode {
    /// PostgreSQL on the deploy host
    Local,
    /// Managed instance, instructions only
    Rds,
}
