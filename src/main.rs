mod cli;
mod config;
mod database;
mod deploy;
mod error;
mod image;
mod os;
mod output;
mod release;
mod retry;
mod shell;
mod ssh;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use console::style;
use tracing_subscriber::EnvFilter;

use cli::deploy::DeployArgs;
use cli::{Cli, Command};
use config::{HmsgConfig, Settings};
use error::DeployError;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup tracing
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    let project_root = std::env::current_dir()?;

    let Some(command) = cli.command else {
        cli::help::run();
        return Ok(());
    };

    match command {
        Command::Help => cli::help::run(),

        Command::Setup => cli::setup::run(&project_root)?,

        Command::Build { tag } => {
            let settings = load_settings(&cli.config)?;
            cli::build::run(&settings, tag.as_deref(), &project_root)?;
        }

        Command::Deploy {
            environment,
            frontend_port,
            backend_port,
            external_db,
            tag,
        } => {
            let settings = load_settings(&cli.config)?;
            cli::deploy::run(
                &settings,
                DeployArgs {
                    environment: environment.as_deref(),
                    frontend_port,
                    backend_port,
                    external_db,
                    tag: &tag,
                },
            )
            .await?;
        }

        Command::Database { mode } => {
            let settings = load_settings(&cli.config)?;
            cli::database::run(&settings, mode).await?;
        }

        Command::Full { environment, tag } => {
            let settings = load_settings(&cli.config)?;
            cli::full::run(&settings, environment.as_deref(), tag.as_deref(), &project_root).await?;
        }

        Command::Status => {
            let settings = load_settings(&cli.config)?;
            cli::status::run(&settings).await?;
        }

        Command::Logs { environment, lines } => {
            let settings = load_settings(&cli.config)?;
            cli::logs::run(&settings, environment.as_deref(), lines).await?;
        }
    }

    Ok(())
}

fn load_settings(path: &std::path::Path) -> Result<Settings> {
    let config = HmsgConfig::load(path)?;
    Ok(Settings::from_env(config))
}

fn report(err: &anyhow::Error) {
    output::error(&format!("{:#}", err));

    if let Some(hint) = err.chain().find_map(|e| e.downcast_ref::<DeployError>()).and_then(DeployError::hint) {
        eprintln!();
        for line in hint.lines() {
            eprintln!("  {}", style(line).dim());
        }
    }
}
