use super::commands::{FetchCommands, RawCommands, StatusCommands};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "payday-cli")]
#[command(about = "A CLI tool for calling the Payday accounting API")]
pub struct Cli {
    /// Path to the config file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Profile to use instead of the configured current profile
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a single API call and print the result envelope
    Raw(RawCommands),
    /// Show the active profile, token lifetime and rate-limit state
    Status(StatusCommands),
    /// Page through resources and write JSONL snapshots
    Fetch(FetchCommands),
}
