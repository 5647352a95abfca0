use anyhow::Result;
use clap::Parser;
use log::info;

use payday_cli::cli::commands::{handle_fetch_command, handle_raw_command, handle_status_command};
use payday_cli::cli::{Cli, Commands};
use payday_cli::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger to file (truncate on each run)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("payday-cli.log")?;
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    let cli = Cli::parse();
    info!("Starting payday-cli");

    let config = Config::load(cli.config.as_deref())?;
    let profile = cli.profile.as_deref();

    match cli.command {
        Commands::Raw(args) => {
            if !handle_raw_command(args, &config, profile).await? {
                std::process::exit(1);
            }
        }
        Commands::Status(args) => handle_status_command(args, &config, profile).await?,
        Commands::Fetch(args) => {
            if !handle_fetch_command(args, &config, profile).await? {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
