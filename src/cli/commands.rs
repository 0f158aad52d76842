//! CLI command implementations.

use std::collections::HashMap;
use std::io::{self, Write as _};

use console::style;
use tracing::warn;

use crate::config::Settings;
use crate::delivery::{self, DeliveryContext};
use crate::repository::{CredentialRepository, LedgerPool, LedgerRepository};
use crate::scrapers;
use crate::services::{deliver, ingest};

async fn open_ledger(settings: &Settings) -> anyhow::Result<(LedgerPool, LedgerRepository)> {
    let path = settings.database_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let pool = LedgerPool::from_path(&path);
    let ledger = LedgerRepository::open(pool.clone()).await?;
    Ok((pool, ledger))
}

pub async fn cmd_run(settings: &Settings) -> anyhow::Result<()> {
    let (pool, ledger) = open_ledger(settings).await?;

    let scrapers = scrapers::build_scrapers(&settings.sources)?;
    if scrapers.is_empty() {
        warn!("no sources configured, nothing will be scraped");
    }

    // Config-file tokens win; the credential store backs the rest.
    let credentials = CredentialRepository::new(pool);
    let mut tokens = HashMap::new();
    for consumer in &settings.consumers {
        if consumer.token.is_none() {
            if let Some(token) = credentials.latest_token(&consumer.kind).await? {
                tokens.insert(consumer.kind.clone(), token);
            }
        }
    }
    let context = DeliveryContext {
        tokens,
        submit_time_format: settings.submit_time_format.clone(),
    };
    let deliverers = delivery::build_deliverers(&settings.consumers, &context)?;
    if deliverers.is_empty() {
        warn!("no consumers configured, nothing will be delivered");
    }

    ingest::run_ingest_pass(&ledger, &scrapers).await?;
    deliver::run_delivery_pass(&ledger, &deliverers).await?;

    println!("{} Run complete", style("✓").green());
    Ok(())
}

pub async fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    let (_pool, ledger) = open_ledger(settings).await?;

    let counts = ledger.submission_counts().await?;
    if counts.is_empty() {
        println!("{} Ledger is empty", style("!").yellow());
    } else {
        println!("Stored submissions:");
        for (judge, count) in &counts {
            println!("  {judge:<16} {count}");
        }
    }

    if !settings.consumers.is_empty() {
        println!("Consumers:");
    }
    for consumer in &settings.consumers {
        let name = consumer.consumer_name();
        let pending = ledger.submissions_since(name).await?.len();
        match ledger.latest_watermark(name).await? {
            Some(watermark) => println!(
                "  {:<16} watermark {} (advanced {}), {} pending",
                name,
                watermark.submission_sequence_id,
                watermark.updated_at.format("%Y-%m-%d %H:%M"),
                pending
            ),
            None => println!("  {name:<16} no watermark yet, {pending} pending"),
        }
    }
    Ok(())
}

pub async fn cmd_token(settings: &Settings, site: &str, set: Option<&str>) -> anyhow::Result<()> {
    let (pool, _ledger) = open_ledger(settings).await?;
    let credentials = CredentialRepository::new(pool);

    match set {
        Some(token) => {
            credentials.save_token(site, token).await?;
            println!("{} Stored token for {}", style("✓").green(), site);
        }
        None => match credentials.latest_token(site).await? {
            Some(token) => println!("{token}"),
            None => println!("{} No token stored for {}", style("!").yellow(), site),
        },
    }
    Ok(())
}

pub async fn cmd_reset(settings: &Settings, yes: bool) -> anyhow::Result<()> {
    if !yes {
        print!("Reset the ledger database? This drops all stored data [y/n]: ");
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().read_line(&mut answer)?;
        if !answer.trim_start().starts_with('y') {
            println!("Aborted reset");
            return Ok(());
        }
    }

    let (_pool, ledger) = open_ledger(settings).await?;
    ledger.reset().await?;
    println!("{} Ledger database has been reset", style("✓").green());
    Ok(())
}
