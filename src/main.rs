//! trend-digest CLI entrypoint.
//! Reads snapshot/history/new-item JSON (or RSS entries), runs the
//! classification and ranking engine, and prints the digest as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trend_digest::analyze::{build_digest, build_rss_digest, load_rules_file};
use trend_digest::config::{DigestConfig, DisplayMode};
use trend_digest::metrics::Metrics;
use trend_digest::{History, NewItemsIndex, ReportMode, RssItem, Snapshot};

#[derive(Debug, Parser)]
#[command(name = "trend-digest", about = "Classify and rank trending titles into a digest")]
struct Cli {
    /// Digest config (TOML). Defaults to $DIGEST_CONFIG_PATH or config/digest.toml.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Rule file; overrides `rules_path` from the config.
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Snapshot JSON: source_id -> title -> {ranks, url, mobile_url, image_url}.
    #[arg(long, conflicts_with = "rss")]
    snapshot: Option<PathBuf>,

    /// History JSON: source_id -> title -> {first_time, last_time, count, ranks, ...}.
    #[arg(long)]
    history: Option<PathBuf>,

    /// New-items JSON: source_id -> [title].
    #[arg(long)]
    new_items: Option<PathBuf>,

    /// RSS entries JSON: [{title, feed_id, feed_name, url, published_at}].
    #[arg(long)]
    rss: Option<PathBuf>,

    /// New RSS entries JSON (same shape as --rss).
    #[arg(long, requires = "rss")]
    rss_new: Option<PathBuf>,

    /// Report mode override: daily | current | incremental.
    #[arg(long)]
    mode: Option<ReportMode>,

    /// Display mode override: keyword | platform.
    #[arg(long)]
    display: Option<String>,

    /// Print Prometheus exposition to stderr after the run.
    #[arg(long)]
    metrics: bool,
}

/// Compact tracing to stderr; RUST_LOG wins over the default filter.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("digest=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
}

fn read_json_or_default<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    match path {
        Some(p) => read_json(p),
        None => Ok(T::default()),
    }
}

fn parse_display(raw: &str) -> Result<DisplayMode> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "keyword" => Ok(DisplayMode::Keyword),
        "platform" => Ok(DisplayMode::Platform),
        other => anyhow::bail!("unknown display mode: {other}"),
    }
}

fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();

    let metrics = if cli.metrics {
        Some(Metrics::init()?)
    } else {
        None
    };

    let mut cfg = match &cli.config {
        Some(p) => {
            let mut cfg = DigestConfig::load_from_file(p)?;
            cfg.apply_env_overrides()?;
            cfg
        }
        None => DigestConfig::load_default()?,
    };
    if let Some(mode) = cli.mode {
        cfg.report_mode = mode;
    }
    if let Some(display) = &cli.display {
        cfg.display_mode = parse_display(display)?;
    }

    let rules_path = cli.rules.clone().unwrap_or_else(|| cfg.rules_path.clone());
    let rules = if rules_path.exists() {
        load_rules_file(&rules_path)?
    } else {
        info!(target: "digest", path = %rules_path.display(), "rule file not found; reporting everything");
        Default::default()
    };

    let digest = if let Some(rss_path) = &cli.rss {
        let items: Vec<RssItem> = read_json(rss_path)?;
        let new_items: Vec<RssItem> = read_json_or_default(cli.rss_new.as_deref())?;
        build_rss_digest(&items, &new_items, &rules, &cfg)
    } else {
        let snapshot_path = cli
            .snapshot
            .as_deref()
            .context("either --snapshot or --rss is required")?;
        let snapshot: Snapshot = read_json(snapshot_path)?;
        let history: History = read_json_or_default(cli.history.as_deref())?;
        let new_index: NewItemsIndex = read_json_or_default(cli.new_items.as_deref())?;
        build_digest(&snapshot, &history, &new_index, &rules, &cfg)
    };

    let out = serde_json::to_string_pretty(&digest).context("serializing digest")?;
    println!("{out}");

    if let Some(m) = metrics {
        eprintln!("{}", m.render());
    }
    Ok(())
}
