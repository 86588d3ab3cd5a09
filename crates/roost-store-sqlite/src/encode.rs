//! Encoding and decoding helpers between Rust row types and the plain
//! representations stored in SQLite columns.
//!
//! Calendar dates are stored as ISO 8601 text, fixed-precision decimals as
//! their canonical decimal text, and categorical columns as their display
//! strings. Booleans and integers use SQLite's native types.

use std::str::FromStr;

use chrono::NaiveDate;
use roost_core::model::{
  AnalyticalRoomType, DateEntry, Host, Listing, ResponseTime,
};
use rust_decimal::Decimal;

use crate::{Error, Result};

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Decimal ─────────────────────────────────────────────────────────────────

pub fn encode_decimal(d: Decimal) -> String { d.to_string() }

pub fn decode_decimal(column: &'static str, s: &str) -> Result<Decimal> {
  Decimal::from_str(s).map_err(|source| Error::Decimal { column, source })
}

// ─── Categorical columns ─────────────────────────────────────────────────────

pub fn encode_response_time(r: ResponseTime) -> &'static str { r.into() }

pub fn encode_room_type(r: AnalyticalRoomType) -> &'static str { r.into() }

fn decode_variant<T: FromStr>(column: &'static str, s: &str) -> Result<T> {
  s.parse()
    .map_err(|_| Error::UnknownVariant { column, value: s.to_owned() })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `dim_date` row.
pub struct RawDateRow {
  pub date_key:           i32,
  pub full_date:          String,
  pub day_of_week:        u8,
  pub day_name:           String,
  pub month_name:         String,
  pub month:              u8,
  pub quarter:            u8,
  pub year:               i32,
  pub is_post_regulation: bool,
  pub is_covid_period:    bool,
}

impl RawDateRow {
  pub fn into_entry(self) -> Result<DateEntry> {
    Ok(DateEntry {
      date_key:           self.date_key,
      full_date:          decode_date(&self.full_date)?,
      day_of_week:        self.day_of_week,
      day_name:           self.day_name,
      month_name:         self.month_name,
      month:              self.month,
      quarter:            self.quarter,
      year:               self.year,
      is_post_regulation: self.is_post_regulation,
      is_covid_period:    self.is_covid_period,
    })
  }
}

/// Raw values read directly from a `dim_hosts` row.
pub struct RawHostRow {
  pub host_id:                   i64,
  pub host_since:                Option<String>,
  pub host_location:             Option<String>,
  pub host_response_time:        Option<String>,
  pub host_response_rate:        Option<f64>,
  pub host_acceptance_rate:      Option<f64>,
  pub host_is_superhost:         Option<bool>,
  pub host_has_profile_pic:      Option<bool>,
  pub host_identity_verified:    Option<bool>,
  pub host_total_listings_count: Option<i64>,
}

impl RawHostRow {
  pub fn into_host(self) -> Result<Host> {
    Ok(Host {
      host_id:                   self.host_id,
      host_since:                self.host_since.as_deref().map(decode_date).transpose()?,
      host_location:             self.host_location,
      host_response_time:        self
        .host_response_time
        .as_deref()
        .map(|s| decode_variant("host_response_time", s))
        .transpose()?,
      host_response_rate:        self.host_response_rate,
      host_acceptance_rate:      self.host_acceptance_rate,
      host_is_superhost:         self.host_is_superhost,
      host_has_profile_pic:      self.host_has_profile_pic,
      host_identity_verified:    self.host_identity_verified,
      host_total_listings_count: self.host_total_listings_count,
    })
  }
}

/// Raw values read directly from a `dim_listings` row.
pub struct RawListingRow {
  pub listing_id:           i64,
  pub host_id:              i64,
  pub name:                 Option<String>,
  pub neighbourhood:        Option<String>,
  pub city:                 Option<String>,
  pub latitude:             Option<String>,
  pub longitude:            Option<String>,
  pub property_type:        Option<String>,
  pub room_type:            Option<String>,
  pub analytical_room_type: Option<String>,
  pub accommodates:         Option<i64>,
  pub bedrooms:             Option<i64>,
  pub price:                Option<String>,
  pub minimum_nights:       Option<i64>,
  pub maximum_nights:       Option<i64>,
  pub review_scores_rating: Option<i64>,
  pub review_scores_value:  Option<i64>,
  pub instant_bookable:     Option<bool>,
}

impl RawListingRow {
  pub fn into_listing(self) -> Result<Listing> {
    let decimal = |column: &'static str, value: Option<String>| {
      value.as_deref().map(|s| decode_decimal(column, s)).transpose()
    };

    Ok(Listing {
      listing_id:           self.listing_id,
      host_id:              self.host_id,
      name:                 self.name,
      neighbourhood:        self.neighbourhood,
      city:                 self.city,
      latitude:             decimal("latitude", self.latitude)?,
      longitude:            decimal("longitude", self.longitude)?,
      property_type:        self.property_type,
      room_type:            self.room_type,
      analytical_room_type: self
        .analytical_room_type
        .as_deref()
        .map(|s| decode_variant("analytical_room_type", s))
        .transpose()?,
      accommodates:         self.accommodates,
      bedrooms:             self.bedrooms,
      price:                decimal("price", self.price)?,
      minimum_nights:       self.minimum_nights,
      maximum_nights:       self.maximum_nights,
      review_scores_rating: self.review_scores_rating,
      review_scores_value:  self.review_scores_value,
      instant_bookable:     self.instant_bookable,
    })
  }
}
