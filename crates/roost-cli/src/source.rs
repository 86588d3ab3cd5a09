//! Source files, one per entity type.
//!
//! Files ending in `.csv` are read as CSV with a header row naming the
//! columns; anything else is read as JSON Lines, one object per line with
//! blank lines ignored. A value that does not fit its column becomes a
//! rejected record; only structurally broken input aborts the read.

use std::{
  fs::File,
  io::{BufRead, BufReader, Read},
  path::{Path, PathBuf},
};

use anyhow::{Context as _, bail};
use roost_core::{pipeline::Dataset, raw::RawRecord};
use serde::Deserialize as _;
use serde_json::{Map, Value};
use tracing::{debug, info};

/// Paths of the per-entity source files; any may be absent.
#[derive(Debug, Default)]
pub struct SourceFiles {
  pub dates:    Option<PathBuf>,
  pub hosts:    Option<PathBuf>,
  pub listings: Option<PathBuf>,
  pub reviews:  Option<PathBuf>,
}

impl SourceFiles {
  /// Read every supplied file. A structurally broken file aborts before
  /// anything is loaded.
  pub fn read(&self) -> anyhow::Result<Dataset> {
    Ok(Dataset {
      dates:    read_optional(self.dates.as_deref())?,
      hosts:    read_optional(self.hosts.as_deref())?,
      listings: read_optional(self.listings.as_deref())?,
      reviews:  read_optional(self.reviews.as_deref())?,
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
  JsonLines,
  Csv,
}

impl Format {
  fn of(path: &Path) -> Self {
    match path.extension().and_then(|e| e.to_str()) {
      Some(ext) if ext.eq_ignore_ascii_case("csv") => Self::Csv,
      _ => Self::JsonLines,
    }
  }
}

fn read_optional<T: RawRecord>(path: Option<&Path>) -> anyhow::Result<Vec<T>> {
  let Some(path) = path else { return Ok(Vec::new()) };
  let file = File::open(path)
    .with_context(|| format!("failed to open {}", path.display()))?;
  let origin = path.display().to_string();
  let format = Format::of(path);
  let records = match format {
    Format::Csv => parse_csv(file, &origin)?,
    Format::JsonLines => parse_lines(BufReader::new(file), &origin)?,
  };
  info!(path = %origin, ?format, records = records.len(), "source file read");
  Ok(records)
}

// ─── JSON Lines ──────────────────────────────────────────────────────────────

/// Decode one record per non-blank line of `reader`. `origin` names the
/// source in error messages.
pub fn parse_lines<T, R>(reader: R, origin: &str) -> anyhow::Result<Vec<T>>
where
  T: RawRecord,
  R: BufRead,
{
  let mut records = Vec::new();
  for (index, line) in reader.lines().enumerate() {
    let line = line.with_context(|| format!("failed to read {origin}"))?;
    if line.trim().is_empty() {
      continue;
    }
    let value: Value = serde_json::from_str(&line)
      .with_context(|| format!("{origin}:{}: malformed JSON", index + 1))?;
    if !value.is_object() {
      bail!("{origin}:{}: expected a JSON object", index + 1);
    }
    records.push(decode_object(value, origin, index + 1));
  }
  Ok(records)
}

/// Decode a JSON object, or build an undecodable record naming the first
/// column whose value does not fit.
fn decode_object<T: RawRecord>(value: Value, origin: &str, line: usize) -> T {
  let err = match T::deserialize(&value) {
    Ok(record) => return record,
    Err(e) => e,
  };

  let key = value.get(T::KEY).and_then(Value::as_i64);
  for (name, field) in value.as_object().into_iter().flatten() {
    let single = Value::Object(Map::from_iter([(name.clone(), field.clone())]));
    if let Err(e) = T::deserialize(&single) {
      debug!(origin, line, column = %name, error = %e, "undecodable value");
      return T::undecodable(key, name, e);
    }
  }
  T::undecodable(key, "record", err)
}

// ─── CSV ─────────────────────────────────────────────────────────────────────

/// Decode one record per CSV row, matching columns to fields by the header
/// row. Empty cells read as absent.
pub fn parse_csv<T, R>(reader: R, origin: &str) -> anyhow::Result<Vec<T>>
where
  T: RawRecord,
  R: Read,
{
  let mut reader = csv::ReaderBuilder::new()
    .has_headers(true)
    .trim(csv::Trim::All)
    .from_reader(reader);
  let headers = reader
    .headers()
    .with_context(|| format!("{origin}: unreadable header row"))?
    .clone();
  let key_column = headers.iter().position(|h| h == T::KEY);

  let mut records = Vec::new();
  for row in reader.records() {
    let row = row.with_context(|| format!("{origin}: malformed CSV row"))?;
    let record = match row.deserialize::<T>(Some(&headers)) {
      Ok(record) => record,
      Err(e) => {
        let key = key_column
          .and_then(|i| row.get(i))
          .and_then(|k| k.parse().ok());
        let line = row.position().map(|p| p.line());
        match e.kind() {
          csv::ErrorKind::Deserialize { err, .. } => {
            let column = err
              .field()
              .and_then(|i| headers.get(i as usize))
              .unwrap_or("record");
            debug!(origin, ?line, column, error = %err, "undecodable value");
            T::undecodable(key, column, err.kind())
          }
          _ => T::undecodable(key, "record", &e),
        }
      }
    };
    records.push(record);
  }
  Ok(records)
}
