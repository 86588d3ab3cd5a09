//! [`SqliteStore`]: the SQLite implementation of [`Warehouse`].

use std::{
  collections::{HashMap, HashSet},
  path::Path,
};

use chrono::NaiveDate;
use rusqlite::OptionalExtension as _;
use tracing::debug;

use roost_core::{
  model::{DateEntry, Host, Listing, Review, Table, TableCounts},
  store::Warehouse,
};

use crate::{
  Error, Result,
  encode::{
    RawDateRow, RawHostRow, RawListingRow, encode_date,
    encode_decimal, encode_response_time, encode_room_type,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Roost warehouse backed by a single SQLite file.
///
/// Clones share one reference-counted connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a warehouse at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory warehouse.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  pub(crate) async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// The schema version stamped by [`SCHEMA`].
  pub async fn schema_version(&self) -> Result<i64> {
    let version = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("PRAGMA user_version", [], |r| r.get(0))?)
      })
      .await?;
    Ok(version)
  }

  /// Run `insert` once per row inside a single transaction. Any failure
  /// rolls back every row of the batch.
  async fn insert_batch<T, F>(
    &self,
    table: Table,
    sql: &'static str,
    rows: Vec<T>,
    insert: F,
  ) -> Result<usize>
  where
    T: Send + 'static,
    F: Fn(&mut rusqlite::Statement<'_>, &T) -> rusqlite::Result<usize>
      + Send
      + 'static,
  {
    if rows.is_empty() {
      return Ok(0);
    }

    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut written = 0;
        {
          let mut stmt = tx.prepare(sql)?;
          for row in &rows {
            written += insert(&mut stmt, row)?;
          }
        }
        tx.commit()?;
        Ok(written)
      })
      .await
      .map_err(Error::classify)?;

    debug!(%table, inserted, "transaction committed");
    Ok(inserted)
  }
}

// ─── Warehouse impl ──────────────────────────────────────────────────────────

impl Warehouse for SqliteStore {
  type Error = Error;

  // ── Lookups ───────────────────────────────────────────────────────────────

  async fn existing_keys(&self, table: Table, keys: Vec<i64>) -> Result<HashSet<i64>> {
    if keys.is_empty() {
      return Ok(HashSet::new());
    }
    let sql = format!(
      "SELECT 1 FROM {} WHERE {} = ?1",
      table.name(),
      table.key_column()
    );

    let found = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let mut found = HashSet::new();
        for key in keys {
          if stmt.exists(rusqlite::params![key])? {
            found.insert(key);
          }
        }
        Ok(found)
      })
      .await?;
    Ok(found)
  }

  async fn existing_full_dates(
    &self,
    dates: Vec<NaiveDate>,
  ) -> Result<HashMap<NaiveDate, i32>> {
    if dates.is_empty() {
      return Ok(HashMap::new());
    }

    let found = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare("SELECT date_key FROM dim_date WHERE full_date = ?1")?;
        let mut found = HashMap::new();
        for date in dates {
          let key: Option<i32> = stmt
            .query_row(rusqlite::params![encode_date(date)], |r| r.get(0))
            .optional()?;
          if let Some(key) = key {
            found.insert(date, key);
          }
        }
        Ok(found)
      })
      .await?;
    Ok(found)
  }

  // ── Batch inserts ─────────────────────────────────────────────────────────

  async fn insert_dates(&self, rows: Vec<DateEntry>) -> Result<usize> {
    self
      .insert_batch(
        Table::Date,
        "INSERT INTO dim_date (
           date_key, full_date, day_of_week, day_name, month_name,
           month, quarter, year, is_post_regulation, is_covid_period
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        rows,
        |stmt, d| {
          stmt.execute(rusqlite::params![
            d.date_key,
            encode_date(d.full_date),
            d.day_of_week,
            d.day_name,
            d.month_name,
            d.month,
            d.quarter,
            d.year,
            d.is_post_regulation,
            d.is_covid_period,
          ])
        },
      )
      .await
  }

  async fn insert_hosts(&self, rows: Vec<Host>) -> Result<usize> {
    self
      .insert_batch(
        Table::Host,
        "INSERT INTO dim_hosts (
           host_id, host_since, host_location, host_response_time,
           host_response_rate, host_acceptance_rate, host_is_superhost,
           host_has_profile_pic, host_identity_verified,
           host_total_listings_count
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        rows,
        |stmt, h| {
          stmt.execute(rusqlite::params![
            h.host_id,
            h.host_since.map(encode_date),
            h.host_location,
            h.host_response_time.map(encode_response_time),
            h.host_response_rate,
            h.host_acceptance_rate,
            h.host_is_superhost,
            h.host_has_profile_pic,
            h.host_identity_verified,
            h.host_total_listings_count,
          ])
        },
      )
      .await
  }

  async fn insert_listings(&self, rows: Vec<Listing>) -> Result<usize> {
    self
      .insert_batch(
        Table::Listing,
        "INSERT INTO dim_listings (
           listing_id, host_id, name, neighbourhood, city,
           latitude, longitude, property_type, room_type,
           analytical_room_type, accommodates, bedrooms, price,
           minimum_nights, maximum_nights, review_scores_rating,
           review_scores_value, instant_bookable
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9,
                   ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        rows,
        |stmt, l| {
          stmt.execute(rusqlite::params![
            l.listing_id,
            l.host_id,
            l.name,
            l.neighbourhood,
            l.city,
            l.latitude.map(encode_decimal),
            l.longitude.map(encode_decimal),
            l.property_type,
            l.room_type,
            l.analytical_room_type.map(encode_room_type),
            l.accommodates,
            l.bedrooms,
            l.price.map(encode_decimal),
            l.minimum_nights,
            l.maximum_nights,
            l.review_scores_rating,
            l.review_scores_value,
            l.instant_bookable,
          ])
        },
      )
      .await
  }

  async fn insert_reviews(&self, rows: Vec<Review>) -> Result<usize> {
    self
      .insert_batch(
        Table::Review,
        "INSERT INTO fact_reviews (
           review_id, listing_id, host_id, date_key, reviewer_id
         ) VALUES (?1, ?2, ?3, ?4, ?5)",
        rows,
        |stmt, r| {
          stmt.execute(rusqlite::params![
            r.review_id,
            r.listing_id,
            r.host_id,
            r.date_key,
            r.reviewer_id,
          ])
        },
      )
      .await
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_date(&self, date_key: i32) -> Result<Option<DateEntry>> {
    let raw: Option<RawDateRow> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT date_key, full_date, day_of_week, day_name, month_name,
                    month, quarter, year, is_post_regulation, is_covid_period
             FROM dim_date WHERE date_key = ?1",
            rusqlite::params![date_key],
            |row| {
              Ok(RawDateRow {
                date_key:           row.get(0)?,
                full_date:          row.get(1)?,
                day_of_week:        row.get(2)?,
                day_name:           row.get(3)?,
                month_name:         row.get(4)?,
                month:              row.get(5)?,
                quarter:            row.get(6)?,
                year:               row.get(7)?,
                is_post_regulation: row.get(8)?,
                is_covid_period:    row.get(9)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawDateRow::into_entry).transpose()
  }

  async fn get_host(&self, host_id: i64) -> Result<Option<Host>> {
    let raw: Option<RawHostRow> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT host_id, host_since, host_location, host_response_time,
                    host_response_rate, host_acceptance_rate, host_is_superhost,
                    host_has_profile_pic, host_identity_verified,
                    host_total_listings_count
             FROM dim_hosts WHERE host_id = ?1",
            rusqlite::params![host_id],
            |row| {
              Ok(RawHostRow {
                host_id:                   row.get(0)?,
                host_since:                row.get(1)?,
                host_location:             row.get(2)?,
                host_response_time:        row.get(3)?,
                host_response_rate:        row.get(4)?,
                host_acceptance_rate:      row.get(5)?,
                host_is_superhost:         row.get(6)?,
                host_has_profile_pic:      row.get(7)?,
                host_identity_verified:    row.get(8)?,
                host_total_listings_count: row.get(9)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawHostRow::into_host).transpose()
  }

  async fn get_listing(&self, listing_id: i64) -> Result<Option<Listing>> {
    let raw: Option<RawListingRow> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT listing_id, host_id, name, neighbourhood, city,
                    latitude, longitude, property_type, room_type,
                    analytical_room_type, accommodates, bedrooms, price,
                    minimum_nights, maximum_nights, review_scores_rating,
                    review_scores_value, instant_bookable
             FROM dim_listings WHERE listing_id = ?1",
            rusqlite::params![listing_id],
            |row| {
              Ok(RawListingRow {
                listing_id:           row.get(0)?,
                host_id:              row.get(1)?,
                name:                 row.get(2)?,
                neighbourhood:        row.get(3)?,
                city:                 row.get(4)?,
                latitude:             row.get(5)?,
                longitude:            row.get(6)?,
                property_type:        row.get(7)?,
                room_type:            row.get(8)?,
                analytical_room_type: row.get(9)?,
                accommodates:         row.get(10)?,
                bedrooms:             row.get(11)?,
                price:                row.get(12)?,
                minimum_nights:       row.get(13)?,
                maximum_nights:       row.get(14)?,
                review_scores_rating: row.get(15)?,
                review_scores_value:  row.get(16)?,
                instant_bookable:     row.get(17)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawListingRow::into_listing).transpose()
  }

  async fn get_review(&self, review_id: i64) -> Result<Option<Review>> {
    let review = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT review_id, listing_id, host_id, date_key, reviewer_id
             FROM fact_reviews WHERE review_id = ?1",
            rusqlite::params![review_id],
            |row| {
              Ok(Review {
                review_id:   row.get(0)?,
                listing_id:  row.get(1)?,
                host_id:     row.get(2)?,
                date_key:    row.get(3)?,
                reviewer_id: row.get(4)?,
              })
            },
          )
          .optional()?)
      })
      .await?;
    Ok(review)
  }

  async fn counts(&self) -> Result<TableCounts> {
    let counts = self
      .conn
      .call(|conn| {
        let mut counts = TableCounts::default();
        for table in Table::ALL {
          let n: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table.name()),
            [],
            |r| r.get(0),
          )?;
          counts.add(table, n as usize);
        }
        Ok(counts)
      })
      .await?;
    Ok(counts)
  }
}

/// Sanity check used by tests: every stored `full_date` decodes.
#[cfg(test)]
impl SqliteStore {
  pub(crate) async fn stored_full_dates(&self) -> Result<Vec<NaiveDate>> {
    use crate::encode::decode_date;

    let raw: Vec<String> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT full_date FROM dim_date ORDER BY date_key")?;
        let rows = stmt
          .query_map([], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raw.iter().map(|s| decode_date(s)).collect()
  }
}
