//! The `Warehouse` trait: the storage contract the loader writes through.
//!
//! The trait is implemented by storage backends (e.g. `roost-store-sqlite`).
//! The loader never holds table state itself; every load call receives the
//! store handle explicitly.

use std::{
  collections::{HashMap, HashSet},
  future::Future,
};

use chrono::NaiveDate;

use crate::model::{DateEntry, Host, Listing, Review, Table, TableCounts};

/// Abstraction over a warehouse storage backend.
///
/// Inserts are batch-atomic: each `insert_*` call writes all of its rows or
/// none of them. Backends are expected to enforce primary-key uniqueness and
/// foreign-key integrity themselves as a backstop to the loader's own
/// pre-insert validation.
pub trait Warehouse: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Lookups ───────────────────────────────────────────────────────────

  /// The subset of `keys` present as primary keys of `table`.
  fn existing_keys(
    &self,
    table: Table,
    keys: Vec<i64>,
  ) -> impl Future<Output = Result<HashSet<i64>, Self::Error>> + Send + '_;

  /// For each of `dates` already stored in `dim_date`, the key it is stored
  /// under.
  fn existing_full_dates(
    &self,
    dates: Vec<NaiveDate>,
  ) -> impl Future<Output = Result<HashMap<NaiveDate, i32>, Self::Error>> + Send + '_;

  // ── Batch inserts ─────────────────────────────────────────────────────

  /// Insert `rows` in a single transaction and return how many were written.
  fn insert_dates(
    &self,
    rows: Vec<DateEntry>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  fn insert_hosts(
    &self,
    rows: Vec<Host>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  fn insert_listings(
    &self,
    rows: Vec<Listing>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  fn insert_reviews(
    &self,
    rows: Vec<Review>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  fn get_date(
    &self,
    date_key: i32,
  ) -> impl Future<Output = Result<Option<DateEntry>, Self::Error>> + Send + '_;

  fn get_host(
    &self,
    host_id: i64,
  ) -> impl Future<Output = Result<Option<Host>, Self::Error>> + Send + '_;

  fn get_listing(
    &self,
    listing_id: i64,
  ) -> impl Future<Output = Result<Option<Listing>, Self::Error>> + Send + '_;

  fn get_review(
    &self,
    review_id: i64,
  ) -> impl Future<Output = Result<Option<Review>, Self::Error>> + Send + '_;

  /// Number of rows currently stored in each table.
  fn counts(&self) -> impl Future<Output = Result<TableCounts, Self::Error>> + Send + '_;
}
