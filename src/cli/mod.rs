//! CLI parser and command dispatch.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "solvetrack")]
#[command(about = "Tracks accepted online-judge solutions and republishes them to task boards")]
#[command(version)]
pub struct Cli {
    /// Config file path (defaults to ./solvetrack.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape all configured judges, then deliver new submissions
    Run,

    /// Show stored submissions and consumer cursors
    Status,

    /// Show or store an API token for a delivery site
    Token {
        /// Site the token belongs to, e.g. "trello"
        site: String,
        /// Token value to store; prints the current token when omitted
        #[arg(long)]
        set: Option<String>,
    },

    /// Reset the ledger database, dropping all stored data
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run => commands::cmd_run(&settings).await,
        Commands::Status => commands::cmd_status(&settings).await,
        Commands::Token { site, set } => commands::cmd_token(&settings, &site, set.as_deref()).await,
        Commands::Reset { yes } => commands::cmd_reset(&settings, yes).await,
    }
}
