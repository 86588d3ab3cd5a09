//! Row types for the four warehouse tables.
//!
//! Every row is created once during a bulk load and never updated; there is
//! no update or delete path anywhere in the warehouse.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ─── Tables ──────────────────────────────────────────────────────────────────

/// One of the four tables of the star schema.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::IntoStaticStr,
)]
pub enum Table {
  #[serde(rename = "dim_date")]
  #[strum(serialize = "dim_date")]
  Date,
  #[serde(rename = "dim_hosts")]
  #[strum(serialize = "dim_hosts")]
  Host,
  #[serde(rename = "dim_listings")]
  #[strum(serialize = "dim_listings")]
  Listing,
  #[serde(rename = "fact_reviews")]
  #[strum(serialize = "fact_reviews")]
  Review,
}

impl Table {
  pub const ALL: [Table; 4] =
    [Table::Date, Table::Host, Table::Listing, Table::Review];

  /// The SQL table name.
  pub fn name(self) -> &'static str { self.into() }

  /// The primary-key column.
  pub fn key_column(self) -> &'static str {
    match self {
      Self::Date => "date_key",
      Self::Host => "host_id",
      Self::Listing => "listing_id",
      Self::Review => "review_id",
    }
  }
}

/// Row counts keyed by table. Used both for "rows inserted by this run" and
/// "rows currently stored".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCounts {
  pub dates:    usize,
  pub hosts:    usize,
  pub listings: usize,
  pub reviews:  usize,
}

impl TableCounts {
  pub fn get(&self, table: Table) -> usize {
    match table {
      Table::Date => self.dates,
      Table::Host => self.hosts,
      Table::Listing => self.listings,
      Table::Review => self.reviews,
    }
  }

  pub fn add(&mut self, table: Table, n: usize) {
    match table {
      Table::Date => self.dates += n,
      Table::Host => self.hosts += n,
      Table::Listing => self.listings += n,
      Table::Review => self.reviews += n,
    }
  }

  pub fn total(&self) -> usize {
    self.dates + self.hosts + self.listings + self.reviews
  }
}

// ─── dim_date ────────────────────────────────────────────────────────────────

/// A calendar day. `date_key` is a stable surrogate (normally `YYYYMMDD`) and
/// `full_date` is unique across all entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateEntry {
  pub date_key:           i32,
  pub full_date:          NaiveDate,
  /// ISO weekday number, 1 = Monday through 7 = Sunday.
  pub day_of_week:        u8,
  pub day_name:           String,
  pub month_name:         String,
  pub month:              u8,
  pub quarter:            u8,
  pub year:               i32,
  pub is_post_regulation: bool,
  pub is_covid_period:    bool,
}

// ─── dim_hosts ───────────────────────────────────────────────────────────────

/// How quickly a host answers enquiries, as bucketed by the source data.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum ResponseTime {
  #[serde(rename = "within an hour")]
  #[strum(serialize = "within an hour")]
  WithinAnHour,
  #[serde(rename = "within a few hours")]
  #[strum(serialize = "within a few hours")]
  WithinAFewHours,
  #[serde(rename = "within a day")]
  #[strum(serialize = "within a day")]
  WithinADay,
  #[serde(rename = "a few days or more")]
  #[strum(serialize = "a few days or more")]
  AFewDaysOrMore,
}

/// A host. Only `host_id` is required; no invariant ties the other fields
/// together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
  pub host_id:                   i64,
  pub host_since:                Option<NaiveDate>,
  pub host_location:             Option<String>,
  pub host_response_time:        Option<ResponseTime>,
  /// Fraction in `[0, 1]`.
  pub host_response_rate:        Option<f64>,
  /// Fraction in `[0, 1]`.
  pub host_acceptance_rate:      Option<f64>,
  pub host_is_superhost:         Option<bool>,
  pub host_has_profile_pic:      Option<bool>,
  pub host_identity_verified:    Option<bool>,
  pub host_total_listings_count: Option<i64>,
}

impl Host {
  /// A host with every optional attribute unset.
  pub fn bare(host_id: i64) -> Self {
    Self {
      host_id,
      host_since: None,
      host_location: None,
      host_response_time: None,
      host_response_rate: None,
      host_acceptance_rate: None,
      host_is_superhost: None,
      host_has_profile_pic: None,
      host_identity_verified: None,
      host_total_listings_count: None,
    }
  }
}

// ─── dim_listings ────────────────────────────────────────────────────────────

/// Coarse room classification used by the dashboards in place of the free-form
/// `room_type` text.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AnalyticalRoomType {
  EntirePlace,
  PrivateRoom,
  SharedRoom,
  Hotel,
  Other,
}

impl AnalyticalRoomType {
  /// Classify the source's `room_type` text.
  pub fn classify(room_type: &str) -> Self {
    match room_type.trim().to_ascii_lowercase().as_str() {
      "entire place" | "entire home/apt" => Self::EntirePlace,
      "private room" => Self::PrivateRoom,
      "shared room" => Self::SharedRoom,
      "hotel room" => Self::Hotel,
      _ => Self::Other,
    }
  }
}

/// A listing; always owned by an existing host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
  pub listing_id:           i64,
  pub host_id:              i64,
  pub name:                 Option<String>,
  pub neighbourhood:        Option<String>,
  pub city:                 Option<String>,
  /// `DECIMAL(9,6)`.
  pub latitude:             Option<Decimal>,
  /// `DECIMAL(9,6)`.
  pub longitude:            Option<Decimal>,
  pub property_type:        Option<String>,
  pub room_type:            Option<String>,
  pub analytical_room_type: Option<AnalyticalRoomType>,
  pub accommodates:         Option<i64>,
  pub bedrooms:             Option<i64>,
  /// `DECIMAL(10,2)`.
  pub price:                Option<Decimal>,
  pub minimum_nights:       Option<i64>,
  pub maximum_nights:       Option<i64>,
  pub review_scores_rating: Option<i64>,
  pub review_scores_value:  Option<i64>,
  pub instant_bookable:     Option<bool>,
}

impl Listing {
  /// A listing with every optional attribute unset.
  pub fn bare(listing_id: i64, host_id: i64) -> Self {
    Self {
      listing_id,
      host_id,
      name: None,
      neighbourhood: None,
      city: None,
      latitude: None,
      longitude: None,
      property_type: None,
      room_type: None,
      analytical_room_type: None,
      accommodates: None,
      bedrooms: None,
      price: None,
      minimum_nights: None,
      maximum_nights: None,
      review_scores_rating: None,
      review_scores_value: None,
      instant_bookable: None,
    }
  }
}

// ─── fact_reviews ────────────────────────────────────────────────────────────

/// A review. `reviewer_id` is a degenerate dimension: descriptive only, with
/// no table behind it and no constraint on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
  pub review_id:   i64,
  pub listing_id:  i64,
  pub host_id:     i64,
  pub date_key:    i32,
  pub reviewer_id: Option<i64>,
}
