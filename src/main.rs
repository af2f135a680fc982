use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;

use shelfwatch::catalogue::HttpPageSource;
use shelfwatch::config::Config;
use shelfwatch::sync::{sync_feed, SyncOptions, SyncOutcome};

#[derive(Parser, Debug)]
#[command(
    name = "shelfwatch",
    version,
    about = "Publish newly added library e-books as an Atom feed"
)]
struct Args {
    /// Configuration file (optional; defaults are used when missing)
    #[arg(long, value_name = "FILE", default_value = "shelfwatch.toml")]
    config: PathBuf,

    /// Feed file to read and update (overrides `feed_path`)
    #[arg(long, value_name = "FILE")]
    feed: Option<PathBuf>,

    /// Walk the catalogue and reconcile, but do not write the feed
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    if let Some(feed) = args.feed {
        config.feed_path = feed;
    }

    let source = HttpPageSource::new(&config).context("Failed to create HTTP client")?;
    let outcome = sync_feed(
        &config,
        &source,
        Utc::now(),
        SyncOptions {
            dry_run: args.dry_run,
        },
    )
    .await
    .context("Feed update failed; the existing feed was left untouched")?;

    match outcome {
        SyncOutcome::NothingListed => println!("No new books at the library."),
        SyncOutcome::AllSeen { .. } => println!("All new books have been seen already."),
        SyncOutcome::Updated(update) if update.written => println!(
            "Added {} new book(s), dropped {} expired; {} now has {} entries.",
            update.added,
            update.expired,
            config.feed_path.display(),
            update.total
        ),
        SyncOutcome::Updated(update) => println!(
            "Dry run: would add {} new book(s) and drop {} expired.",
            update.added, update.expired
        ),
    }

    Ok(())
}
