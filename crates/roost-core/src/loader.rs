//! The schema loader: validates raw record batches against the warehouse
//! constraints and writes the accepted rows through a [`Warehouse`].
//!
//! Each record is checked in three steps, in this order:
//!
//! 1. field validation (required columns present, values well formed);
//! 2. primary and unique keys, against stored rows and against the records
//!    already accepted from the same batch;
//! 3. foreign keys, against stored rows only.
//!
//! The loader never reorders work. Loading listings before their hosts is
//! reported as a referential violation, not repaired.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
  Error, Rejection, Result, Violation,
  calendar::EraCalendar,
  model::{Table, TableCounts},
  raw::{RawDate, RawHost, RawListing, RawReview},
  store::Warehouse,
};

// ─── Configuration ───────────────────────────────────────────────────────────

/// What a load call does with a record that breaks a constraint.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(ascii_case_insensitive)]
pub enum LoadMode {
  /// Abort the whole batch on the first violation; nothing is written.
  #[default]
  #[strum(serialize = "fail-fast")]
  FailFast,
  /// Exclude the record, record a rejection and carry on.
  #[serde(alias = "skip")]
  #[strum(to_string = "skip-and-continue", serialize = "skip")]
  SkipAndContinue,
}

/// The outcome of one load call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
  pub table:      Table,
  pub inserted:   usize,
  pub rejections: Vec<Rejection>,
}

// ─── Batch bookkeeping ───────────────────────────────────────────────────────

struct Batch<T> {
  table:      Table,
  mode:       LoadMode,
  rows:       Vec<T>,
  rejections: Vec<Rejection>,
}

impl<T> Batch<T> {
  fn new(table: Table, mode: LoadMode) -> Self {
    Self { table, mode, rows: Vec::new(), rejections: Vec::new() }
  }

  fn accept(&mut self, row: T) { self.rows.push(row); }

  /// Record a rejection, or abort the batch when running fail-fast.
  fn reject(
    &mut self,
    position: usize,
    record: Option<i64>,
    violation: Violation,
  ) -> Result<()> {
    let rejection = Rejection { table: self.table, position, record, violation };
    match self.mode {
      LoadMode::FailFast => Err(Error::Rejected(rejection)),
      LoadMode::SkipAndContinue => {
        warn!(%rejection, "record rejected");
        self.rejections.push(rejection);
        Ok(())
      }
    }
  }

  fn report(self, inserted: usize) -> BatchReport {
    debug!(
      table = %self.table,
      inserted,
      rejected = self.rejections.len(),
      "batch written"
    );
    BatchReport { table: self.table, inserted, rejections: self.rejections }
  }
}

fn duplicate(constraint: &'static str, value: impl ToString) -> Violation {
  Violation::DuplicateKey { constraint, value: value.to_string() }
}

fn dangling(field: &'static str, value: impl ToString, target: Table) -> Violation {
  Violation::ReferentialIntegrity { field, value: value.to_string(), target }
}

// ─── Loader ──────────────────────────────────────────────────────────────────

/// Validates and writes record batches. Holds configuration only; table state
/// lives in the [`Warehouse`] passed to each call.
#[derive(Debug, Clone, Default)]
pub struct SchemaLoader {
  mode: LoadMode,
  eras: EraCalendar,
}

impl SchemaLoader {
  pub fn new(mode: LoadMode, eras: EraCalendar) -> Self { Self { mode, eras } }

  pub fn mode(&self) -> LoadMode { self.mode }

  pub fn eras(&self) -> &EraCalendar { &self.eras }

  /// Load `dim_date` rows. Rejects a record whose `date_key` or `full_date`
  /// is already taken.
  pub async fn load_dates<S: Warehouse>(
    &self,
    store: &S,
    records: Vec<RawDate>,
  ) -> Result<BatchReport> {
    let parsed: Vec<_> = records
      .into_iter()
      .map(|r| (r.record_key(), r.validate(&self.eras)))
      .collect();

    let keys = parsed
      .iter()
      .filter_map(|(_, r)| r.as_ref().ok())
      .map(|e| i64::from(e.date_key))
      .collect();
    let dates = parsed
      .iter()
      .filter_map(|(_, r)| r.as_ref().ok())
      .map(|e| e.full_date)
      .collect();
    let stored_keys = store
      .existing_keys(Table::Date, keys)
      .await
      .map_err(Error::store)?;
    let stored_dates = store
      .existing_full_dates(dates)
      .await
      .map_err(Error::store)?;

    let mut batch = Batch::new(Table::Date, self.mode);
    let mut seen_keys = HashSet::new();
    let mut seen_dates = HashSet::new();

    for (position, (record, parsed)) in parsed.into_iter().enumerate() {
      let entry = match parsed {
        Ok(e) => e,
        Err(v) => {
          batch.reject(position, record, v)?;
          continue;
        }
      };

      let key = i64::from(entry.date_key);
      if stored_keys.contains(&key) || seen_keys.contains(&key) {
        batch.reject(position, record, duplicate("dim_date.date_key", key))?;
        continue;
      }
      if stored_dates.contains_key(&entry.full_date)
        || seen_dates.contains(&entry.full_date)
      {
        batch.reject(
          position,
          record,
          duplicate("dim_date.full_date", entry.full_date),
        )?;
        continue;
      }

      seen_keys.insert(key);
      seen_dates.insert(entry.full_date);
      batch.accept(entry);
    }

    let rows = std::mem::take(&mut batch.rows);
    let inserted = store.insert_dates(rows).await.map_err(Error::store)?;
    Ok(batch.report(inserted))
  }

  /// Load `dim_hosts` rows. Only `host_id` is required.
  pub async fn load_hosts<S: Warehouse>(
    &self,
    store: &S,
    records: Vec<RawHost>,
  ) -> Result<BatchReport> {
    let parsed: Vec<_> = records
      .into_iter()
      .map(|r| (r.record_key(), r.validate()))
      .collect();

    let keys = parsed
      .iter()
      .filter_map(|(_, r)| r.as_ref().ok())
      .map(|h| h.host_id)
      .collect();
    let stored = store
      .existing_keys(Table::Host, keys)
      .await
      .map_err(Error::store)?;

    let mut batch = Batch::new(Table::Host, self.mode);
    let mut seen = HashSet::new();

    for (position, (record, parsed)) in parsed.into_iter().enumerate() {
      let host = match parsed {
        Ok(h) => h,
        Err(v) => {
          batch.reject(position, record, v)?;
          continue;
        }
      };

      if stored.contains(&host.host_id) || !seen.insert(host.host_id) {
        batch.reject(
          position,
          record,
          duplicate("dim_hosts.host_id", host.host_id),
        )?;
        continue;
      }
      batch.accept(host);
    }

    let rows = std::mem::take(&mut batch.rows);
    let inserted = store.insert_hosts(rows).await.map_err(Error::store)?;
    Ok(batch.report(inserted))
  }

  /// Load `dim_listings` rows. Every listing's host must already be stored.
  pub async fn load_listings<S: Warehouse>(
    &self,
    store: &S,
    records: Vec<RawListing>,
  ) -> Result<BatchReport> {
    let parsed: Vec<_> = records
      .into_iter()
      .map(|r| (r.record_key(), r.validate()))
      .collect();

    let (keys, host_ids): (Vec<_>, Vec<_>) = parsed
      .iter()
      .filter_map(|(_, r)| r.as_ref().ok())
      .map(|l| (l.listing_id, l.host_id))
      .unzip();
    let stored = store
      .existing_keys(Table::Listing, keys)
      .await
      .map_err(Error::store)?;
    let hosts = store
      .existing_keys(Table::Host, host_ids)
      .await
      .map_err(Error::store)?;

    let mut batch = Batch::new(Table::Listing, self.mode);
    let mut seen = HashSet::new();

    for (position, (record, parsed)) in parsed.into_iter().enumerate() {
      let listing = match parsed {
        Ok(l) => l,
        Err(v) => {
          batch.reject(position, record, v)?;
          continue;
        }
      };

      if stored.contains(&listing.listing_id) || seen.contains(&listing.listing_id) {
        batch.reject(
          position,
          record,
          duplicate("dim_listings.listing_id", listing.listing_id),
        )?;
        continue;
      }
      if !hosts.contains(&listing.host_id) {
        batch.reject(
          position,
          record,
          dangling("host_id", listing.host_id, Table::Host),
        )?;
        continue;
      }

      seen.insert(listing.listing_id);
      batch.accept(listing);
    }

    let rows = std::mem::take(&mut batch.rows);
    let inserted = store.insert_listings(rows).await.map_err(Error::store)?;
    Ok(batch.report(inserted))
  }

  /// Load `fact_reviews` rows. The listing, host and date each review
  /// references must already be stored; the first missing one, checked in
  /// that order, is the one reported.
  pub async fn load_reviews<S: Warehouse>(
    &self,
    store: &S,
    records: Vec<RawReview>,
  ) -> Result<BatchReport> {
    let parsed: Vec<_> = records
      .into_iter()
      .map(|r| (r.record_key(), r.validate()))
      .collect();

    let valid = || parsed.iter().filter_map(|(_, r)| r.as_ref().ok());
    let stored = store
      .existing_keys(Table::Review, valid().map(|r| r.review_id).collect())
      .await
      .map_err(Error::store)?;
    let listings = store
      .existing_keys(Table::Listing, valid().map(|r| r.listing_id).collect())
      .await
      .map_err(Error::store)?;
    let hosts = store
      .existing_keys(Table::Host, valid().map(|r| r.host_id).collect())
      .await
      .map_err(Error::store)?;
    let dates = store
      .existing_keys(
        Table::Date,
        valid().map(|r| i64::from(r.date_key)).collect(),
      )
      .await
      .map_err(Error::store)?;

    let mut batch = Batch::new(Table::Review, self.mode);
    let mut seen = HashSet::new();

    for (position, (record, parsed)) in parsed.into_iter().enumerate() {
      let review = match parsed {
        Ok(r) => r,
        Err(v) => {
          batch.reject(position, record, v)?;
          continue;
        }
      };

      if stored.contains(&review.review_id) || seen.contains(&review.review_id) {
        batch.reject(
          position,
          record,
          duplicate("fact_reviews.review_id", review.review_id),
        )?;
        continue;
      }

      let missing = if !listings.contains(&review.listing_id) {
        Some(dangling("listing_id", review.listing_id, Table::Listing))
      } else if !hosts.contains(&review.host_id) {
        Some(dangling("host_id", review.host_id, Table::Host))
      } else if !dates.contains(&i64::from(review.date_key)) {
        Some(dangling("date_key", review.date_key, Table::Date))
      } else {
        None
      };
      if let Some(violation) = missing {
        batch.reject(position, record, violation)?;
        continue;
      }

      seen.insert(review.review_id);
      batch.accept(review);
    }

    let rows = std::mem::take(&mut batch.rows);
    let inserted = store.insert_reviews(rows).await.map_err(Error::store)?;
    Ok(batch.report(inserted))
  }

  /// Current row counts, for reporting.
  pub async fn counts<S: Warehouse>(&self, store: &S) -> Result<TableCounts> {
    store.counts().await.map_err(Error::store)
  }
}

#[cfg(test)]
mod tests {
  use std::{
    collections::{BTreeMap, HashMap},
    convert::Infallible,
    sync::Mutex,
  };

  use chrono::NaiveDate;

  use super::*;
  use crate::{
    ViolationKind,
    raw::RawRecord,
    model::{DateEntry, Host, Listing, Review},
    pipeline::Dataset,
  };

  // ── In-memory warehouse ───────────────────────────────────────────────

  #[derive(Default)]
  struct Tables {
    dates:    BTreeMap<i32, DateEntry>,
    hosts:    BTreeMap<i64, Host>,
    listings: BTreeMap<i64, Listing>,
    reviews:  BTreeMap<i64, Review>,
  }

  #[derive(Default)]
  struct MemoryWarehouse(Mutex<Tables>);

  impl Warehouse for MemoryWarehouse {
    type Error = Infallible;

    async fn existing_keys(
      &self,
      table: Table,
      keys: Vec<i64>,
    ) -> Result<HashSet<i64>, Infallible> {
      let t = self.0.lock().unwrap();
      let present = |k: &i64| match table {
        Table::Date => i32::try_from(*k).is_ok_and(|k| t.dates.contains_key(&k)),
        Table::Host => t.hosts.contains_key(k),
        Table::Listing => t.listings.contains_key(k),
        Table::Review => t.reviews.contains_key(k),
      };
      Ok(keys.into_iter().filter(present).collect())
    }

    async fn existing_full_dates(
      &self,
      dates: Vec<NaiveDate>,
    ) -> Result<HashMap<NaiveDate, i32>, Infallible> {
      let t = self.0.lock().unwrap();
      Ok(
        t.dates
          .values()
          .filter(|e| dates.contains(&e.full_date))
          .map(|e| (e.full_date, e.date_key))
          .collect(),
      )
    }

    async fn insert_dates(&self, rows: Vec<DateEntry>) -> Result<usize, Infallible> {
      let mut t = self.0.lock().unwrap();
      let n = rows.len();
      t.dates.extend(rows.into_iter().map(|r| (r.date_key, r)));
      Ok(n)
    }

    async fn insert_hosts(&self, rows: Vec<Host>) -> Result<usize, Infallible> {
      let mut t = self.0.lock().unwrap();
      let n = rows.len();
      t.hosts.extend(rows.into_iter().map(|r| (r.host_id, r)));
      Ok(n)
    }

    async fn insert_listings(&self, rows: Vec<Listing>) -> Result<usize, Infallible> {
      let mut t = self.0.lock().unwrap();
      let n = rows.len();
      t.listings.extend(rows.into_iter().map(|r| (r.listing_id, r)));
      Ok(n)
    }

    async fn insert_reviews(&self, rows: Vec<Review>) -> Result<usize, Infallible> {
      let mut t = self.0.lock().unwrap();
      let n = rows.len();
      t.reviews.extend(rows.into_iter().map(|r| (r.review_id, r)));
      Ok(n)
    }

    async fn get_date(&self, date_key: i32) -> Result<Option<DateEntry>, Infallible> {
      Ok(self.0.lock().unwrap().dates.get(&date_key).cloned())
    }

    async fn get_host(&self, host_id: i64) -> Result<Option<Host>, Infallible> {
      Ok(self.0.lock().unwrap().hosts.get(&host_id).cloned())
    }

    async fn get_listing(&self, listing_id: i64) -> Result<Option<Listing>, Infallible> {
      Ok(self.0.lock().unwrap().listings.get(&listing_id).cloned())
    }

    async fn get_review(&self, review_id: i64) -> Result<Option<Review>, Infallible> {
      Ok(self.0.lock().unwrap().reviews.get(&review_id).cloned())
    }

    async fn counts(&self) -> Result<TableCounts, Infallible> {
      let t = self.0.lock().unwrap();
      Ok(TableCounts {
        dates:    t.dates.len(),
        hosts:    t.hosts.len(),
        listings: t.listings.len(),
        reviews:  t.reviews.len(),
      })
    }
  }

  fn loader(mode: LoadMode) -> SchemaLoader {
    SchemaLoader::new(mode, EraCalendar::default())
  }

  fn june_15() -> NaiveDate { NaiveDate::from_ymd_opt(2019, 6, 15).unwrap() }

  // ── Loader behaviour ──────────────────────────────────────────────────

  #[tokio::test]
  async fn fail_fast_batch_writes_nothing() {
    let store = MemoryWarehouse::default();
    let err = loader(LoadMode::FailFast)
      .load_hosts(&store, vec![RawHost::new(1), RawHost::new(2), RawHost::new(1)])
      .await
      .unwrap_err();

    let rejection = err.rejection().unwrap();
    assert_eq!(rejection.position, 2);
    assert_eq!(rejection.violation.kind(), ViolationKind::DuplicateKey);
    assert_eq!(store.counts().await.unwrap().hosts, 0);
  }

  #[tokio::test]
  async fn skip_mode_records_rejections_and_keeps_the_rest() {
    let store = MemoryWarehouse::default();
    let loader = loader(LoadMode::SkipAndContinue);
    loader.load_hosts(&store, vec![RawHost::new(100)]).await.unwrap();

    let report = loader
      .load_listings(
        &store,
        vec![RawListing::new(5000, 100), RawListing::new(5001, 999)],
      )
      .await
      .unwrap();

    assert_eq!(report.inserted, 1);
    assert_eq!(report.rejections.len(), 1);
    assert_eq!(report.rejections[0].record, Some(5001));
    assert_eq!(
      report.rejections[0].violation,
      Violation::ReferentialIntegrity {
        field:  "host_id",
        value:  "999".into(),
        target: Table::Host,
      }
    );
    assert!(store.get_listing(5001).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn key_check_precedes_foreign_keys() {
    let store = MemoryWarehouse::default();
    let loader = loader(LoadMode::SkipAndContinue);
    loader.load_hosts(&store, vec![RawHost::new(1)]).await.unwrap();

    // Second record repeats the key and also names an unknown host.
    let report = loader
      .load_listings(&store, vec![RawListing::new(7, 1), RawListing::new(7, 2)])
      .await
      .unwrap();
    assert_eq!(report.rejections[0].violation.kind(), ViolationKind::DuplicateKey);
  }

  #[tokio::test]
  async fn review_reports_listing_before_host_and_date() {
    let store = MemoryWarehouse::default();
    let report = loader(LoadMode::SkipAndContinue)
      .load_reviews(&store, vec![RawReview::new(900_000, 5000, 100, 20190615)])
      .await
      .unwrap();

    assert_eq!(
      report.rejections[0].violation.to_string(),
      "listing_id:5000 references no row in dim_listings"
    );
  }

  #[tokio::test]
  async fn missing_key_is_a_validation_error() {
    let store = MemoryWarehouse::default();
    let report = loader(LoadMode::SkipAndContinue)
      .load_hosts(&store, vec![RawHost::default()])
      .await
      .unwrap();

    assert_eq!(report.inserted, 0);
    assert_eq!(report.rejections[0].record, None);
    assert_eq!(report.rejections[0].violation.kind(), ViolationKind::Validation);
  }

  #[tokio::test]
  async fn undecodable_record_is_rejected_in_either_mode() {
    let hosts = || {
      vec![
        RawHost::new(1),
        RawHost::undecodable(Some(2), "host_response_rate", "expected f64"),
        RawHost::new(3),
      ]
    };

    let store = MemoryWarehouse::default();
    let report = loader(LoadMode::SkipAndContinue)
      .load_hosts(&store, hosts())
      .await
      .unwrap();
    assert_eq!(report.inserted, 2);
    assert_eq!(report.rejections.len(), 1);
    assert_eq!(report.rejections[0].record, Some(2));
    assert_eq!(report.rejections[0].violation.kind(), ViolationKind::Validation);

    let store = MemoryWarehouse::default();
    let err = loader(LoadMode::FailFast)
      .load_hosts(&store, hosts())
      .await
      .unwrap_err();
    let rejection = err.rejection().unwrap();
    assert_eq!(rejection.position, 1);
    assert_eq!(rejection.violation.kind(), ViolationKind::Validation);
    assert_eq!(store.counts().await.unwrap().hosts, 0);
  }

  #[tokio::test]
  async fn pipeline_stops_after_failing_stage() {
    let store = MemoryWarehouse::default();
    let dataset = Dataset {
      dates:    vec![RawDate::on(june_15())],
      hosts:    vec![RawHost::new(100)],
      listings: vec![RawListing::new(5000, 101)],
      reviews:  vec![RawReview::new(900_000, 5000, 100, 20190615)],
    };

    let err = loader(LoadMode::FailFast).run(&store, dataset).await.unwrap_err();
    assert_eq!(err.rejection().unwrap().table, Table::Listing);

    let counts = store.counts().await.unwrap();
    assert_eq!(counts, TableCounts { dates: 1, hosts: 1, listings: 0, reviews: 0 });
  }

  #[tokio::test]
  async fn pipeline_loads_in_dependency_order() {
    let store = MemoryWarehouse::default();
    let dataset = Dataset {
      dates:    vec![RawDate::on(june_15())],
      hosts:    vec![RawHost::new(100)],
      listings: vec![RawListing::new(5000, 100)],
      reviews:  vec![RawReview::new(900_000, 5000, 100, 20190615)],
    };

    let report = loader(LoadMode::FailFast).run(&store, dataset).await.unwrap();
    assert!(report.rejections.is_empty());
    assert_eq!(report.inserted, TableCounts { dates: 1, hosts: 1, listings: 1, reviews: 1 });
    assert_eq!(report.inserted, store.counts().await.unwrap());
  }

  #[test]
  fn load_mode_parses_cli_spellings() {
    assert_eq!("fail-fast".parse::<LoadMode>().unwrap(), LoadMode::FailFast);
    assert_eq!("skip".parse::<LoadMode>().unwrap(), LoadMode::SkipAndContinue);
    assert_eq!(
      "Skip-And-Continue".parse::<LoadMode>().unwrap(),
      LoadMode::SkipAndContinue
    );
    assert_eq!(LoadMode::SkipAndContinue.to_string(), "skip-and-continue");
    assert!("retry".parse::<LoadMode>().is_err());
  }

  #[test]
  fn load_mode_deserializes_from_config_values() {
    let mode: LoadMode = serde_json::from_str("\"skip\"").unwrap();
    assert_eq!(mode, LoadMode::SkipAndContinue);
    let mode: LoadMode = serde_json::from_str("\"fail-fast\"").unwrap();
    assert_eq!(mode, LoadMode::FailFast);
  }
}
