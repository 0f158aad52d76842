//! solvetrack - accepted-solution tracking and republishing.
//!
//! A tool for collecting accepted submissions from online-judge websites
//! and republishing new ones to external task boards.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use solvetrack::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if cli::is_verbose() {
        "solvetrack=debug"
    } else {
        "solvetrack=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    cli::run().await
}
