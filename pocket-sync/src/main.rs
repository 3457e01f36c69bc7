use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pocket_core::{source_nodes, NodeStore, PocketClient, SyncOptions, SystemClock};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pocket-sync", version, about = "Sync Pocket articles into a JSON node store")]
struct Cli {
    /// Sync options file (defaults to <config_dir>/pocket-sync/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding nodes.json (defaults to <data_dir>/pocket-sync)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Remove nodes that were neither touched nor fetched during this run
    #[arg(long)]
    prune: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();
    let cli = Cli::parse();

    let options = load_options(cli.config.as_ref())?;
    let client = PocketClient::from_options(&options).context("invalid sync options")?;

    let out_dir = cli.out.unwrap_or_else(data_dir);
    let store = NodeStore::load_from_dir(&out_dir).await;

    let report = source_nodes(&options, &SystemClock, &client, &store)
        .await
        .context("sync failed")?;

    if cli.prune {
        let removed = store.sweep_stale().await;
        info!(removed = removed.len(), "pruned stale nodes");
    }
    store
        .flush()
        .await
        .with_context(|| format!("failed to write nodes to {}", out_dir.display()))?;

    info!(
        fetched = report.fetched,
        created = report.created,
        updated = report.updated,
        unchanged = report.unchanged,
        out = %out_dir.display(),
        "done"
    );
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn data_dir() -> PathBuf {
    // Linux: ~/.local/share/pocket-sync
    let mut dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.push("pocket-sync");
    dir
}

fn load_options(path: Option<&PathBuf>) -> Result<SyncOptions> {
    let mut options = match path {
        Some(path) => SyncOptions::from_file(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => SyncOptions::load(),
    };

    if let Ok(key) = std::env::var("POCKET_CONSUMER_KEY") {
        options.consumer_key = Some(key);
    }
    if let Ok(token) = std::env::var("POCKET_ACCESS_TOKEN") {
        options.access_token = Some(token);
    }
    if options.consumer_key.is_none() || options.access_token.is_none() {
        warn!("credentials missing; set them in the config file or POCKET_CONSUMER_KEY / POCKET_ACCESS_TOKEN");
    }
    Ok(options)
}
