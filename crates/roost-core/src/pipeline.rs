//! The staged load pipeline.
//!
//! Dependency order is a fixed list of stages rather than something inferred
//! at run time: both dimensions without foreign keys first (dates and hosts,
//! concurrently), then listings, then reviews. A stage starts only after the
//! previous one has finished.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
  Rejection, Result,
  calendar::{EraCalendar, day_of_key},
  loader::{BatchReport, SchemaLoader},
  model::{Table, TableCounts},
  raw::{RawDate, RawHost, RawListing, RawReview},
  store::Warehouse,
};

// ─── Stages ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
  /// `dim_date` and `dim_hosts`; neither depends on the other.
  Dimensions,
  /// `dim_listings`, which references `dim_hosts`.
  Listings,
  /// `fact_reviews`, which references every dimension.
  Reviews,
}

impl Stage {
  /// Execution order.
  pub const ORDER: [Stage; 3] = [Stage::Dimensions, Stage::Listings, Stage::Reviews];

  pub fn tables(self) -> &'static [Table] {
    match self {
      Self::Dimensions => &[Table::Date, Table::Host],
      Self::Listings => &[Table::Listing],
      Self::Reviews => &[Table::Review],
    }
  }
}

// ─── Dataset ─────────────────────────────────────────────────────────────────

/// One record sequence per entity type, as supplied by the source extractor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
  pub dates:    Vec<RawDate>,
  pub hosts:    Vec<RawHost>,
  pub listings: Vec<RawListing>,
  pub reviews:  Vec<RawReview>,
}

/// Records removed from a dataset by a source filter before loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterSummary {
  pub listings: usize,
  pub reviews:  usize,
}

impl Dataset {
  /// Keep only the listings located in `city` (compared case-insensitively),
  /// together with the reviews of those listings.
  pub fn retain_city(&mut self, city: &str) -> FilterSummary {
    let city = city.trim();
    let before = (self.listings.len(), self.reviews.len());

    self.listings.retain(|l| {
      l.city
        .as_deref()
        .is_some_and(|c| c.trim().eq_ignore_ascii_case(city))
    });
    let kept: std::collections::HashSet<i64> =
      self.listings.iter().filter_map(|l| l.listing_id).collect();
    self
      .reviews
      .retain(|r| r.listing_id.is_some_and(|id| kept.contains(&id)));

    FilterSummary {
      listings: before.0 - self.listings.len(),
      reviews:  before.1 - self.reviews.len(),
    }
  }

  /// The earliest and latest calendar day mentioned by hosts (`host_since`)
  /// and reviews (`review_date`, or a `date_key` that names a real day).
  pub fn calendar_span(&self) -> Option<(NaiveDate, NaiveDate)> {
    let host_days = self.hosts.iter().filter_map(|h| {
      let text = h.host_since.as_deref()?;
      NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()
    });
    let review_days = self.reviews.iter().flat_map(|r| {
      r.review_day()
        .into_iter()
        .chain(r.date_key.and_then(day_of_key))
    });

    host_days.chain(review_days).fold(None, |span, day| match span {
      None => Some((day, day)),
      Some((lo, hi)) => Some((lo.min(day), hi.max(day))),
    })
  }

  /// When no date records were supplied, generate one per day of
  /// [`Dataset::calendar_span`]. Returns the number of records generated.
  pub fn fill_calendar(&mut self, eras: &EraCalendar) -> usize {
    if !self.dates.is_empty() {
      return 0;
    }
    let Some((from, to)) = self.calendar_span() else { return 0 };
    self.dates = eras.entries(from, to).into_iter().map(RawDate::from).collect();
    self.dates.len()
  }
}

// ─── Report ──────────────────────────────────────────────────────────────────

/// The result of a pipeline run: rows inserted per table, every rejected
/// record, and what the source filter removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
  pub inserted:   TableCounts,
  pub rejections: Vec<Rejection>,
  pub filtered:   FilterSummary,
}

impl LoadReport {
  fn absorb(&mut self, batch: BatchReport) {
    self.inserted.add(batch.table, batch.inserted);
    self.rejections.extend(batch.rejections);
  }

  pub fn rejected(&self, table: Table) -> usize {
    self.rejections.iter().filter(|r| r.table == table).count()
  }
}

// ─── Runner ──────────────────────────────────────────────────────────────────

impl SchemaLoader {
  /// Load a whole dataset, stage by stage.
  ///
  /// In fail-fast mode the first rejected batch ends the run with
  /// [`crate::Error::Rejected`]; stages that already finished stay committed.
  pub async fn run<S: Warehouse>(
    &self,
    store: &S,
    dataset: Dataset,
  ) -> Result<LoadReport> {
    let Dataset { mut dates, mut hosts, mut listings, mut reviews } = dataset;
    let mut report = LoadReport::default();

    for stage in Stage::ORDER {
      info!(%stage, mode = %self.mode(), "starting stage");
      match stage {
        Stage::Dimensions => {
          let (date_batch, host_batch) = tokio::join!(
            self.load_dates(store, std::mem::take(&mut dates)),
            self.load_hosts(store, std::mem::take(&mut hosts)),
          );
          report.absorb(date_batch?);
          report.absorb(host_batch?);
        }
        Stage::Listings => {
          report.absorb(
            self
              .load_listings(store, std::mem::take(&mut listings))
              .await?,
          );
        }
        Stage::Reviews => {
          report.absorb(
            self
              .load_reviews(store, std::mem::take(&mut reviews))
              .await?,
          );
        }
      }
      for table in stage.tables() {
        info!(
          %table,
          inserted = report.inserted.get(*table),
          rejected = report.rejected(*table),
          "stage table loaded"
        );
      }
    }

    Ok(report)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn listing_in(id: i64, city: Option<&str>) -> RawListing {
    RawListing { city: city.map(Into::into), ..RawListing::new(id, 1) }
  }

  #[test]
  fn stage_order_respects_dependencies() {
    let position = |table: Table| {
      Stage::ORDER
        .iter()
        .position(|s| s.tables().contains(&table))
        .unwrap()
    };
    assert!(position(Table::Date) < position(Table::Listing));
    assert!(position(Table::Host) < position(Table::Listing));
    assert!(position(Table::Listing) < position(Table::Review));
  }

  #[test]
  fn retain_city_drops_listings_and_their_reviews() {
    let mut dataset = Dataset {
      listings: vec![
        listing_in(1, Some("Paris")),
        listing_in(2, Some("Rome")),
        listing_in(3, None),
        listing_in(4, Some(" paris ")),
      ],
      reviews: vec![
        RawReview::new(10, 1, 1, 20190615),
        RawReview::new(11, 2, 1, 20190615),
        RawReview::new(12, 4, 1, 20190615),
      ],
      ..Dataset::default()
    };

    let filtered = dataset.retain_city("Paris");
    assert_eq!(filtered, FilterSummary { listings: 2, reviews: 1 });

    let ids: Vec<_> = dataset.listings.iter().filter_map(|l| l.listing_id).collect();
    assert_eq!(ids, [1, 4]);
    let ids: Vec<_> = dataset.reviews.iter().filter_map(|r| r.review_id).collect();
    assert_eq!(ids, [10, 12]);
  }

  #[test]
  fn fill_calendar_spans_hosts_and_reviews() {
    let mut dataset = Dataset {
      hosts: vec![RawHost {
        host_since: Some("2019-06-13".into()),
        ..RawHost::new(1)
      }],
      reviews: vec![RawReview {
        date_key: None,
        review_date: Some("2019-06-15".into()),
        ..RawReview::new(10, 1, 1, 0)
      }],
      ..Dataset::default()
    };

    assert_eq!(dataset.fill_calendar(&EraCalendar::default()), 3);
    let keys: Vec<_> = dataset.dates.iter().filter_map(|d| d.date_key).collect();
    assert_eq!(keys, [20190613, 20190614, 20190615]);

    // Supplied dates are never replaced.
    assert_eq!(dataset.fill_calendar(&EraCalendar::default()), 0);
  }

  #[test]
  fn fill_calendar_covers_reviews_known_only_by_key() {
    let mut dataset = Dataset {
      hosts: vec![RawHost {
        host_since: Some("2019-06-01".into()),
        ..RawHost::new(1)
      }],
      reviews: vec![
        RawReview::new(10, 1, 1, 20190615),
        // Not a calendar day; contributes nothing.
        RawReview::new(11, 1, 1, 20191301),
      ],
      ..Dataset::default()
    };

    assert_eq!(dataset.fill_calendar(&EraCalendar::default()), 15);
    let keys: Vec<_> = dataset.dates.iter().filter_map(|d| d.date_key).collect();
    assert_eq!(keys.first(), Some(&20190601));
    assert_eq!(keys.last(), Some(&20190615));
  }
}
