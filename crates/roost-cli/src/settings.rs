//! Runtime configuration, layered from an optional TOML file and `ROOST_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use roost_core::{calendar::EraCalendar, loader::LoadMode};
use serde::Deserialize;

/// Settings deserialised from `roost.toml`.
///
/// ```toml
/// database_path = "~/warehouse/roost.db"
/// mode = "skip"
/// city = "Paris"
///
/// [eras]
/// regulation_start = "2015-01-01"
/// covid_start = "2020-03-01"
/// covid_end = "2021-12-31"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub database_path: PathBuf,
  pub mode:          LoadMode,
  /// Restrict listings (and their reviews) to one city.
  pub city:          Option<String>,
  pub eras:          EraCalendar,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      database_path: PathBuf::from("roost.db"),
      mode:          LoadMode::default(),
      city:          None,
      eras:          EraCalendar::default(),
    }
  }
}

impl Settings {
  /// Read `path` if it exists, then apply environment overrides such as
  /// `ROOST_MODE` or `ROOST_ERAS__COVID_END`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let cfg = config::Config::builder()
      .add_source(config::File::from(path.to_path_buf()).required(false))
      .add_source(
        config::Environment::with_prefix("ROOST")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()
      .with_context(|| format!("failed to read config file {}", path.display()))?;
    Self::from_config(cfg)
  }

  fn from_config(cfg: config::Config) -> anyhow::Result<Self> {
    cfg
      .try_deserialize()
      .context("failed to deserialise Settings")
  }

  /// The database path with a leading `~` expanded to the home directory.
  pub fn database_path(&self) -> PathBuf { expand_tilde(&self.database_path) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
