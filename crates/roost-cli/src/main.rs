//! roost: loads Airbnb listing extracts into a star-schema SQLite warehouse.
//!
//! Reads `roost.toml` (or the path given with `--config`), opens the
//! warehouse, and runs one of:
//!
//! ```text
//! roost init
//! roost load --hosts hosts.jsonl --listings Listings.csv --reviews Reviews.csv
//! roost counts
//! ```
//!
//! Only `init` creates a missing database file.

mod report;
mod settings;
mod source;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};
use clap::{Args, Parser, Subcommand};
use roost_core::{
  loader::{LoadMode, SchemaLoader},
  pipeline::FilterSummary,
};
use roost_store_sqlite::SqliteStore;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

use crate::{settings::Settings, source::SourceFiles};

#[derive(Parser)]
#[command(author, version, about = "Roost listing warehouse loader")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, global = true, default_value = "roost.toml")]
  config: PathBuf,

  /// Warehouse database, overriding `database_path` from the config.
  #[arg(long, global = true)]
  database: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Create the warehouse file and schema if they do not exist.
  Init,
  /// Load CSV or JSON Lines extracts, dimensions first.
  Load(LoadArgs),
  /// Print the row count of every table.
  Counts,
}

#[derive(Args)]
struct LoadArgs {
  #[arg(long)]
  dates:    Option<PathBuf>,
  #[arg(long)]
  hosts:    Option<PathBuf>,
  #[arg(long)]
  listings: Option<PathBuf>,
  #[arg(long)]
  reviews:  Option<PathBuf>,

  /// `fail-fast` or `skip` (skip-and-continue).
  #[arg(long)]
  mode: Option<LoadMode>,

  /// Keep only listings in this city, and their reviews.
  #[arg(long)]
  city: Option<String>,

  /// Write the full report, every rejection included, as JSON.
  #[arg(long)]
  report: Option<PathBuf>,

  /// Do not generate `dim_date` rows when no dates file is given.
  #[arg(long)]
  no_calendar: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Logs go to stderr so the summary on stdout stays clean.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config)?;
  let db_path = cli.database.unwrap_or_else(|| settings.database_path());

  let store = open_store(&db_path, matches!(cli.command, Command::Init)).await?;

  match cli.command {
    Command::Init => {
      let version = store.schema_version().await?;
      println!("{} ready (schema version {version})", db_path.display());
    }
    Command::Counts => {
      let loader = SchemaLoader::new(settings.mode, settings.eras);
      let counts = loader.counts(&store).await?;
      print!("{}", report::counts(&counts));
    }
    Command::Load(args) => load(&store, settings, args).await?,
  }

  Ok(())
}

/// Open the warehouse at `path`, creating it only when `create` is set.
async fn open_store(path: &Path, create: bool) -> anyhow::Result<SqliteStore> {
  if !create && !path.exists() {
    bail!("no warehouse at {}; run `roost init` first", path.display());
  }
  let store = SqliteStore::open(path)
    .await
    .with_context(|| format!("failed to open warehouse at {}", path.display()))?;
  info!(path = %path.display(), "warehouse opened");
  Ok(store)
}

async fn load(store: &SqliteStore, settings: Settings, args: LoadArgs) -> anyhow::Result<()> {
  let mode = args.mode.unwrap_or(settings.mode);
  let city = args.city.or(settings.city);

  let sources = SourceFiles {
    dates:    args.dates,
    hosts:    args.hosts,
    listings: args.listings,
    reviews:  args.reviews,
  };
  let mut dataset = sources.read()?;

  let filtered = match city.as_deref() {
    Some(city) => {
      let summary = dataset.retain_city(city);
      info!(city, listings = summary.listings, reviews = summary.reviews, "filtered by city");
      summary
    }
    None => FilterSummary::default(),
  };

  if !args.no_calendar {
    let generated = dataset.fill_calendar(&settings.eras);
    if generated > 0 {
      info!(days = generated, "generated date dimension");
    }
  }

  let loader = SchemaLoader::new(mode, settings.eras);
  let mut report = match loader.run(store, dataset).await {
    Ok(report) => report,
    Err(e) => {
      if let Some(rejection) = e.rejection() {
        warn!(%rejection, "fail-fast load aborted");
      }
      return Err(e).context("load aborted; completed stages remain committed");
    }
  };
  report.filtered = filtered;

  print!("{}", report::summary(&report));
  if let Some(path) = args.report {
    report::write_json(&path, &report)?;
    info!(path = %path.display(), "report written");
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn scratch(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("roost-{name}-{}.db", std::process::id()))
  }

  fn remove(path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
      let mut file = path.as_os_str().to_owned();
      file.push(suffix);
      let _ = std::fs::remove_file(file);
    }
  }

  #[tokio::test]
  async fn only_init_creates_a_missing_warehouse() {
    let path = scratch("open");
    remove(&path);

    let err = open_store(&path, false).await.err().unwrap();
    assert!(err.to_string().contains("roost init"), "{err}");
    assert!(!path.exists());

    let store = open_store(&path, true).await.unwrap();
    assert_eq!(store.schema_version().await.unwrap(), 1);
    drop(store);
    assert!(open_store(&path, false).await.is_ok());

    remove(&path);
  }
}
