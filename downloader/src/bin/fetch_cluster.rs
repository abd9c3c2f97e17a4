//! Download filtered Gaia DR2 photometry for stellar clusters.
//!
//! Resolves each cluster name through MAST, runs the paginated cone-search
//! download with quality filtering, and writes the surviving rows into the
//! JSON row cache used by the cluster model.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use clusters::{known_clusters, CacheStore};
use downloader::{download_cluster_data, FetchConfig, MastClient, PagePolicy, DEFAULT_WORKERS};

#[derive(Parser, Debug)]
#[command(
    name = "fetch_cluster",
    about = "Download quality-filtered Gaia DR2 rows for stellar clusters",
    long_about = None
)]
struct Args {
    /// Cluster name to download, e.g. "NGC 6475"
    #[arg(required_unless_present = "all")]
    name: Option<String>,

    /// Download every cluster in the known table
    #[arg(long, conflicts_with = "name")]
    all: bool,

    /// Directory for cached row files
    #[arg(long, default_value = "cache")]
    cache_dir: PathBuf,

    /// Maximum simultaneous page requests
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    concurrency: usize,

    /// Keep going when a page fetch fails instead of aborting the run
    #[arg(long)]
    skip_failed_pages: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let client = MastClient::new();
    let store = CacheStore::with_path(args.cache_dir.clone());
    let config = FetchConfig {
        workers: args.concurrency,
        page_policy: if args.skip_failed_pages {
            PagePolicy::SkipFailed
        } else {
            PagePolicy::Abort
        },
        ..FetchConfig::default()
    };

    let names: Vec<String> = if args.all {
        known_clusters().iter().map(|c| c.name.clone()).collect()
    } else {
        vec![args.name.clone().expect("clap requires name without --all")]
    };

    for name in names {
        let rows = download_cluster_data(&client, &name, &config)
            .with_context(|| format!("downloading {name}"))?;
        let path = store
            .save(&name, &rows)
            .with_context(|| format!("caching rows for {name}"))?;
        log::info!("wrote {} rows for {name} to {}", rows.len(), path.display());
    }

    Ok(())
}
