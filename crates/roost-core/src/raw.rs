//! Raw source records and their validation into warehouse rows.
//!
//! Raw records mirror the shape the source extractor produces: every column
//! is optional so that a missing value surfaces as a [`Violation`] naming the
//! field rather than as a decode failure for the whole record. Dates arrive as
//! ISO 8601 text; booleans may use the `"t"`/`"f"` spelling of the source
//! dumps.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};

use crate::{
  Violation,
  calendar::{EraCalendar, KEY_YEARS, date_key},
  model::{AnalyticalRoomType, DateEntry, Host, Listing, ResponseTime, Review},
};

type Validated<T> = std::result::Result<T, Violation>;

// ─── Field helpers ───────────────────────────────────────────────────────────

fn required<T>(field: &'static str, value: Option<T>) -> Validated<T> {
  value.ok_or_else(|| Violation::missing(field))
}

fn parse_date(field: &'static str, value: &str) -> Validated<NaiveDate> {
  NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| {
    Violation::malformed(field, format!("is not a YYYY-MM-DD date ({value:?}: {e})"))
  })
}

fn out_of_key_range(field: &'static str, date: NaiveDate) -> Violation {
  Violation::malformed(
    field,
    format!(
      "{date} is outside years {} to {}",
      KEY_YEARS.start(),
      KEY_YEARS.end()
    ),
  )
}

/// The `YYYYMMDD` key of a parsed date.
fn keyed(field: &'static str, date: NaiveDate) -> Validated<i32> {
  date_key(date).ok_or_else(|| out_of_key_range(field, date))
}

fn optional_date(
  field: &'static str,
  value: Option<&str>,
) -> Validated<Option<NaiveDate>> {
  value
    .filter(|s| !s.trim().is_empty())
    .map(|s| parse_date(field, s))
    .transpose()
}

/// Empty and whitespace-only text is treated as absent.
fn text(value: Option<String>) -> Option<String> {
  value
    .map(|s| s.trim().to_owned())
    .filter(|s| !s.is_empty())
}

fn rate(field: &'static str, value: Option<f64>) -> Validated<Option<f64>> {
  match value {
    Some(r) if !(0.0..=1.0).contains(&r) => Err(Violation::malformed(
      field,
      format!("must be a fraction in [0, 1], got {r}"),
    )),
    other => Ok(other),
  }
}

fn non_negative(field: &'static str, value: Option<i64>) -> Validated<Option<i64>> {
  match value {
    Some(n) if n < 0 => {
      Err(Violation::malformed(field, format!("must not be negative, got {n}")))
    }
    other => Ok(other),
  }
}

/// Round to `scale` fractional digits and check the integer part fits in
/// `precision - scale` digits, the way a `DECIMAL(precision, scale)` column
/// would store it.
fn fixed_decimal(
  field: &'static str,
  value: Option<Decimal>,
  precision: u32,
  scale: u32,
) -> Validated<Option<Decimal>> {
  let Some(value) = value else { return Ok(None) };
  let mut rounded = value.round_dp(scale);
  rounded.rescale(scale);
  let limit = Decimal::from(10_i64.pow(precision - scale));
  if rounded.abs() >= limit {
    return Err(Violation::malformed(
      field,
      format!("{value} does not fit DECIMAL({precision},{scale})"),
    ));
  }
  Ok(Some(rounded))
}

fn agrees<T: PartialEq + std::fmt::Display>(
  field: &'static str,
  supplied: Option<T>,
  derived: &T,
) -> Validated<()> {
  match supplied {
    Some(s) if s != *derived => Err(Violation::malformed(
      field,
      format!("{s} disagrees with full_date (expected {derived})"),
    )),
    _ => Ok(()),
  }
}

fn agrees_ignoring_case(
  field: &'static str,
  supplied: Option<&str>,
  derived: &str,
) -> Validated<()> {
  match supplied {
    Some(s) if !s.trim().eq_ignore_ascii_case(derived) => Err(Violation::malformed(
      field,
      format!("{s:?} disagrees with full_date (expected {derived:?})"),
    )),
    _ => Ok(()),
  }
}

/// Accept JSON booleans and the `t`/`f`/`true`/`false` text spellings.
fn flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Flag {
    Bool(bool),
    Text(String),
  }

  match Option::<Flag>::deserialize(deserializer)? {
    None => Ok(None),
    Some(Flag::Bool(b)) => Ok(Some(b)),
    Some(Flag::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
      "" => Ok(None),
      "t" | "true" => Ok(Some(true)),
      "f" | "false" => Ok(Some(false)),
      other => Err(serde::de::Error::custom(format!(
        "expected a boolean or t/f, got {other:?}"
      ))),
    },
  }
}

// ─── Decoding ────────────────────────────────────────────────────────────────

/// What a source reader needs to know about a raw record type.
///
/// A value that does not fit its column's type does not abort the read:
/// the reader builds an [`RawRecord::undecodable`] record instead, which
/// carries the problem into validation like any other malformed field.
pub trait RawRecord: DeserializeOwned + Default {
  /// Every column the record reads.
  const FIELDS: &'static [&'static str];
  /// The column holding the record's key.
  const KEY: &'static str;

  /// A record that fails validation because `field` could not be decoded.
  /// `key` is kept for the rejection report.
  fn undecodable(key: Option<i64>, field: &str, problem: impl fmt::Display) -> Self;
}

fn decode_violation(
  fields: &'static [&'static str],
  field: &str,
  problem: impl fmt::Display,
) -> Violation {
  let name = fields
    .iter()
    .copied()
    .find(|f| *f == field)
    .unwrap_or("record");
  Violation::malformed(name, format!("could not be decoded ({problem})"))
}

// ─── RawDate ─────────────────────────────────────────────────────────────────

/// A source record for `dim_date`. Only `full_date` is needed; every other
/// column is derived from it when absent and checked against it when present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDate {
  pub date_key:           Option<i32>,
  pub full_date:          Option<String>,
  pub day_of_week:        Option<u8>,
  pub day_name:           Option<String>,
  pub month_name:         Option<String>,
  pub month:              Option<u8>,
  pub quarter:            Option<u8>,
  pub year:               Option<i32>,
  #[serde(default, deserialize_with = "flag")]
  pub is_post_regulation: Option<bool>,
  #[serde(default, deserialize_with = "flag")]
  pub is_covid_period:    Option<bool>,
  #[serde(skip)]
  pub decode_error:       Option<Violation>,
}

impl RawDate {
  /// A record carrying nothing but the calendar day.
  pub fn on(full_date: NaiveDate) -> Self {
    Self { full_date: Some(full_date.to_string()), ..Self::default() }
  }

  /// The surrogate key this record will be stored under, if readable.
  pub fn record_key(&self) -> Option<i64> {
    self.date_key.map(i64::from).or_else(|| {
      let full_date = self.full_date.as_deref()?;
      let day = parse_date("full_date", full_date).ok()?;
      date_key(day).map(i64::from)
    })
  }

  pub fn validate(self, eras: &EraCalendar) -> Validated<DateEntry> {
    if let Some(v) = self.decode_error {
      return Err(v);
    }
    let full_date = required("full_date", text(self.full_date))?;
    let full_date = parse_date("full_date", &full_date)?;
    let derived = eras
      .entry(full_date)
      .ok_or_else(|| out_of_key_range("full_date", full_date))?;

    let date_key = match self.date_key {
      Some(k) if k <= 0 => {
        return Err(Violation::malformed(
          "date_key",
          format!("must be positive, got {k}"),
        ));
      }
      Some(k) => k,
      None => derived.date_key,
    };

    agrees("day_of_week", self.day_of_week, &derived.day_of_week)?;
    agrees_ignoring_case("day_name", self.day_name.as_deref(), &derived.day_name)?;
    agrees_ignoring_case(
      "month_name",
      self.month_name.as_deref(),
      &derived.month_name,
    )?;
    agrees("month", self.month, &derived.month)?;
    agrees("quarter", self.quarter, &derived.quarter)?;
    agrees("year", self.year, &derived.year)?;

    Ok(DateEntry {
      date_key,
      is_post_regulation: self
        .is_post_regulation
        .unwrap_or(derived.is_post_regulation),
      is_covid_period: self.is_covid_period.unwrap_or(derived.is_covid_period),
      ..derived
    })
  }
}

impl From<DateEntry> for RawDate {
  fn from(e: DateEntry) -> Self {
    Self {
      date_key:           Some(e.date_key),
      full_date:          Some(e.full_date.to_string()),
      day_of_week:        Some(e.day_of_week),
      day_name:           Some(e.day_name),
      month_name:         Some(e.month_name),
      month:              Some(e.month),
      quarter:            Some(e.quarter),
      year:               Some(e.year),
      is_post_regulation: Some(e.is_post_regulation),
      is_covid_period:    Some(e.is_covid_period),
      decode_error:       None,
    }
  }
}

impl RawRecord for RawDate {
  const FIELDS: &'static [&'static str] = &[
    "date_key",
    "full_date",
    "day_of_week",
    "day_name",
    "month_name",
    "month",
    "quarter",
    "year",
    "is_post_regulation",
    "is_covid_period",
  ];
  const KEY: &'static str = "date_key";

  fn undecodable(key: Option<i64>, field: &str, problem: impl fmt::Display) -> Self {
    Self {
      date_key: key.and_then(|k| i32::try_from(k).ok()),
      decode_error: Some(decode_violation(Self::FIELDS, field, problem)),
      ..Self::default()
    }
  }
}

// ─── RawHost ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawHost {
  pub host_id:                   Option<i64>,
  pub host_since:                Option<String>,
  pub host_location:             Option<String>,
  pub host_response_time:        Option<String>,
  pub host_response_rate:        Option<f64>,
  pub host_acceptance_rate:      Option<f64>,
  #[serde(default, deserialize_with = "flag")]
  pub host_is_superhost:         Option<bool>,
  #[serde(default, deserialize_with = "flag")]
  pub host_has_profile_pic:      Option<bool>,
  #[serde(default, deserialize_with = "flag")]
  pub host_identity_verified:    Option<bool>,
  pub host_total_listings_count: Option<i64>,
  #[serde(skip)]
  pub decode_error:              Option<Violation>,
}

impl RawHost {
  pub fn new(host_id: i64) -> Self {
    Self { host_id: Some(host_id), ..Self::default() }
  }

  pub fn record_key(&self) -> Option<i64> { self.host_id }

  pub fn validate(self) -> Validated<Host> {
    if let Some(v) = self.decode_error {
      return Err(v);
    }
    let host_id = required("host_id", self.host_id)?;
    let host_response_time = text(self.host_response_time)
      .map(|s| {
        s.parse::<ResponseTime>().map_err(|_| {
          Violation::malformed(
            "host_response_time",
            format!("{s:?} is not a known response-time bucket"),
          )
        })
      })
      .transpose()?;

    Ok(Host {
      host_id,
      host_since: optional_date("host_since", self.host_since.as_deref())?,
      host_location: text(self.host_location),
      host_response_time,
      host_response_rate: rate("host_response_rate", self.host_response_rate)?,
      host_acceptance_rate: rate(
        "host_acceptance_rate",
        self.host_acceptance_rate,
      )?,
      host_is_superhost: self.host_is_superhost,
      host_has_profile_pic: self.host_has_profile_pic,
      host_identity_verified: self.host_identity_verified,
      host_total_listings_count: non_negative(
        "host_total_listings_count",
        self.host_total_listings_count,
      )?,
    })
  }
}

impl RawRecord for RawHost {
  const FIELDS: &'static [&'static str] = &[
    "host_id",
    "host_since",
    "host_location",
    "host_response_time",
    "host_response_rate",
    "host_acceptance_rate",
    "host_is_superhost",
    "host_has_profile_pic",
    "host_identity_verified",
    "host_total_listings_count",
  ];
  const KEY: &'static str = "host_id";

  fn undecodable(key: Option<i64>, field: &str, problem: impl fmt::Display) -> Self {
    Self {
      host_id: key,
      decode_error: Some(decode_violation(Self::FIELDS, field, problem)),
      ..Self::default()
    }
  }
}

// ─── RawListing ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawListing {
  pub listing_id:           Option<i64>,
  pub host_id:              Option<i64>,
  pub name:                 Option<String>,
  pub neighbourhood:        Option<String>,
  pub city:                 Option<String>,
  pub latitude:             Option<Decimal>,
  pub longitude:            Option<Decimal>,
  pub property_type:        Option<String>,
  pub room_type:            Option<String>,
  pub analytical_room_type: Option<String>,
  pub accommodates:         Option<i64>,
  pub bedrooms:             Option<i64>,
  pub price:                Option<Decimal>,
  pub minimum_nights:       Option<i64>,
  pub maximum_nights:       Option<i64>,
  pub review_scores_rating: Option<i64>,
  pub review_scores_value:  Option<i64>,
  #[serde(default, deserialize_with = "flag")]
  pub instant_bookable:     Option<bool>,
  #[serde(skip)]
  pub decode_error:         Option<Violation>,
}

impl RawListing {
  pub fn new(listing_id: i64, host_id: i64) -> Self {
    Self {
      listing_id: Some(listing_id),
      host_id: Some(host_id),
      ..Self::default()
    }
  }

  pub fn record_key(&self) -> Option<i64> { self.listing_id }

  pub fn validate(self) -> Validated<Listing> {
    if let Some(v) = self.decode_error {
      return Err(v);
    }
    let listing_id = required("listing_id", self.listing_id)?;
    let host_id = required("host_id", self.host_id)?;
    let room_type = text(self.room_type);

    let analytical_room_type = match text(self.analytical_room_type) {
      Some(s) => Some(s.parse::<AnalyticalRoomType>().map_err(|_| {
        Violation::malformed(
          "analytical_room_type",
          format!("{s:?} is not a known room classification"),
        )
      })?),
      None => room_type.as_deref().map(AnalyticalRoomType::classify),
    };

    let price = fixed_decimal("price", self.price, 10, 2)?;
    if let Some(p) = price.filter(|p| *p < Decimal::ZERO) {
      return Err(Violation::malformed(
        "price",
        format!("must not be negative, got {p}"),
      ));
    }

    Ok(Listing {
      listing_id,
      host_id,
      name: text(self.name),
      neighbourhood: text(self.neighbourhood),
      city: text(self.city),
      latitude: fixed_decimal("latitude", self.latitude, 9, 6)?,
      longitude: fixed_decimal("longitude", self.longitude, 9, 6)?,
      property_type: text(self.property_type),
      room_type,
      analytical_room_type,
      accommodates: non_negative("accommodates", self.accommodates)?,
      bedrooms: non_negative("bedrooms", self.bedrooms)?,
      price,
      minimum_nights: non_negative("minimum_nights", self.minimum_nights)?,
      maximum_nights: non_negative("maximum_nights", self.maximum_nights)?,
      review_scores_rating: non_negative(
        "review_scores_rating",
        self.review_scores_rating,
      )?,
      review_scores_value: non_negative(
        "review_scores_value",
        self.review_scores_value,
      )?,
      instant_bookable: self.instant_bookable,
    })
  }
}

impl RawRecord for RawListing {
  const FIELDS: &'static [&'static str] = &[
    "listing_id",
    "host_id",
    "name",
    "neighbourhood",
    "city",
    "latitude",
    "longitude",
    "property_type",
    "room_type",
    "analytical_room_type",
    "accommodates",
    "bedrooms",
    "price",
    "minimum_nights",
    "maximum_nights",
    "review_scores_rating",
    "review_scores_value",
    "instant_bookable",
  ];
  const KEY: &'static str = "listing_id";

  fn undecodable(key: Option<i64>, field: &str, problem: impl fmt::Display) -> Self {
    Self {
      listing_id: key,
      decode_error: Some(decode_violation(Self::FIELDS, field, problem)),
      ..Self::default()
    }
  }
}

// ─── RawReview ───────────────────────────────────────────────────────────────

/// A source record for `fact_reviews`. The date reference may be given either
/// as `date_key` or as the calendar `review_date` it derives from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawReview {
  pub review_id:   Option<i64>,
  pub listing_id:  Option<i64>,
  pub host_id:     Option<i64>,
  pub date_key:    Option<i32>,
  pub review_date: Option<String>,
  pub reviewer_id: Option<i64>,
  #[serde(skip)]
  pub decode_error: Option<Violation>,
}

impl RawReview {
  pub fn new(review_id: i64, listing_id: i64, host_id: i64, date_key: i32) -> Self {
    Self {
      review_id:   Some(review_id),
      listing_id:  Some(listing_id),
      host_id:     Some(host_id),
      date_key:    Some(date_key),
      review_date: None,
      reviewer_id: None,
      decode_error: None,
    }
  }

  pub fn record_key(&self) -> Option<i64> { self.review_id }

  /// The calendar day this review refers to, when it can be read.
  pub fn review_day(&self) -> Option<NaiveDate> {
    let text = self.review_date.as_deref()?;
    parse_date("review_date", text).ok()
  }

  pub fn validate(self) -> Validated<Review> {
    if let Some(v) = self.decode_error {
      return Err(v);
    }
    let review_id = required("review_id", self.review_id)?;
    let listing_id = required("listing_id", self.listing_id)?;
    let host_id = required("host_id", self.host_id)?;
    let review_date = optional_date("review_date", self.review_date.as_deref())?
      .map(|d| keyed("review_date", d).map(|k| (d, k)))
      .transpose()?;

    let date_key = match (self.date_key, review_date) {
      (Some(k), Some((d, derived))) if k != derived => {
        return Err(Violation::malformed(
          "date_key",
          format!("{k} disagrees with review_date {d}"),
        ));
      }
      (Some(k), _) => k,
      (None, Some((_, derived))) => derived,
      (None, None) => return Err(Violation::missing("date_key")),
    };

    Ok(Review {
      review_id,
      listing_id,
      host_id,
      date_key,
      reviewer_id: self.reviewer_id,
    })
  }
}

impl RawRecord for RawReview {
  const FIELDS: &'static [&'static str] = &[
    "review_id",
    "listing_id",
    "host_id",
    "date_key",
    "review_date",
    "reviewer_id",
  ];
  const KEY: &'static str = "review_id";

  fn undecodable(key: Option<i64>, field: &str, problem: impl fmt::Display) -> Self {
    Self {
      review_id: key,
      decode_error: Some(decode_violation(Self::FIELDS, field, problem)),
      ..Self::default()
    }
  }
}

#[cfg(test)]
mod tests {
  use rust_decimal_macros::dec;

  use super::*;
  use crate::ViolationKind;

  fn field_of(v: &Violation) -> &'static str {
    match v {
      Violation::Validation { field, .. } => field,
      other => panic!("expected a validation violation, got {other:?}"),
    }
  }

  #[test]
  fn date_key_defaults_to_yyyymmdd() {
    let raw = RawDate {
      full_date: Some("2019-06-15".into()),
      ..RawDate::default()
    };
    assert_eq!(raw.record_key(), Some(20190615));
    let entry = raw.validate(&EraCalendar::default()).unwrap();
    assert_eq!(entry.date_key, 20190615);
    assert_eq!(entry.day_name, "Saturday");
  }

  #[test]
  fn date_without_full_date_is_invalid() {
    let raw = RawDate { date_key: Some(20190615), ..RawDate::default() };
    let err = raw.validate(&EraCalendar::default()).unwrap_err();
    assert_eq!(err.kind(), ViolationKind::Validation);
    assert_eq!(field_of(&err), "full_date");
  }

  #[test]
  fn date_attributes_must_agree_with_full_date() {
    let raw = RawDate {
      full_date: Some("2019-06-15".into()),
      day_name: Some("Monday".into()),
      ..RawDate::default()
    };
    let err = raw.validate(&EraCalendar::default()).unwrap_err();
    assert_eq!(field_of(&err), "day_name");

    let raw = RawDate {
      full_date: Some("2019-06-15".into()),
      day_name: Some("saturday".into()),
      quarter: Some(2),
      ..RawDate::default()
    };
    assert!(raw.validate(&EraCalendar::default()).is_ok());
  }

  #[test]
  fn supplied_era_flags_win_over_derived() {
    let raw = RawDate {
      full_date: Some("2019-06-15".into()),
      is_covid_period: Some(true),
      ..RawDate::default()
    };
    let entry = raw.validate(&EraCalendar::default()).unwrap();
    assert!(entry.is_covid_period);
  }

  #[test]
  fn host_requires_only_its_key() {
    let host = RawHost::new(100).validate().unwrap();
    assert_eq!(host, Host::bare(100));

    let err = RawHost::default().validate().unwrap_err();
    assert_eq!(field_of(&err), "host_id");
  }

  #[test]
  fn host_rates_must_be_fractions() {
    let raw = RawHost {
      host_response_rate: Some(1.5),
      ..RawHost::new(1)
    };
    assert_eq!(field_of(&raw.validate().unwrap_err()), "host_response_rate");

    let raw = RawHost {
      host_acceptance_rate: Some(0.87),
      host_response_time: Some("Within A Day".into()),
      ..RawHost::new(1)
    };
    let host = raw.validate().unwrap();
    assert_eq!(host.host_acceptance_rate, Some(0.87));
    assert_eq!(host.host_response_time, Some(ResponseTime::WithinADay));
  }

  #[test]
  fn host_decodes_source_flags() {
    let raw: RawHost = serde_json::from_str(
      r#"{"host_id": 7, "host_is_superhost": "t", "host_has_profile_pic": false,
          "host_identity_verified": "", "host_since": "2011-12-03"}"#,
    )
    .unwrap();
    let host = raw.validate().unwrap();
    assert_eq!(host.host_is_superhost, Some(true));
    assert_eq!(host.host_has_profile_pic, Some(false));
    assert_eq!(host.host_identity_verified, None);
    assert_eq!(host.host_since, NaiveDate::from_ymd_opt(2011, 12, 3));
  }

  #[test]
  fn listing_derives_room_classification_and_rounds_decimals() {
    let raw = RawListing {
      room_type: Some("Private room".into()),
      latitude: Some(dec!(48.8566141)),
      longitude: Some(dec!(2.3522219)),
      price: Some(dec!(120.005)),
      ..RawListing::new(5000, 100)
    };
    let listing = raw.validate().unwrap();
    assert_eq!(
      listing.analytical_room_type,
      Some(AnalyticalRoomType::PrivateRoom)
    );
    assert_eq!(listing.latitude, Some(dec!(48.856614)));
    assert_eq!(listing.longitude, Some(dec!(2.352222)));
    assert_eq!(listing.price, Some(dec!(120.00)));
  }

  #[test]
  fn listing_rejects_out_of_precision_coordinates() {
    let raw = RawListing {
      latitude: Some(dec!(1234.5)),
      ..RawListing::new(5000, 100)
    };
    assert_eq!(field_of(&raw.validate().unwrap_err()), "latitude");
  }

  #[test]
  fn listing_requires_host() {
    let raw = RawListing { listing_id: Some(1), ..RawListing::default() };
    assert_eq!(field_of(&raw.validate().unwrap_err()), "host_id");
  }

  #[test]
  fn review_date_key_from_review_date() {
    let raw = RawReview {
      date_key: None,
      review_date: Some("2019-06-15".into()),
      ..RawReview::new(1, 2, 3, 0)
    };
    assert_eq!(raw.validate().unwrap().date_key, 20190615);

    let raw = RawReview {
      review_date: Some("2019-06-16".into()),
      ..RawReview::new(1, 2, 3, 20190615)
    };
    assert_eq!(field_of(&raw.validate().unwrap_err()), "date_key");

    let raw = RawReview { date_key: None, ..RawReview::new(1, 2, 3, 0) };
    assert_eq!(field_of(&raw.validate().unwrap_err()), "date_key");
  }

  #[test]
  fn dates_beyond_four_digit_years_are_invalid() {
    let raw = RawDate {
      full_date: Some("+250000-01-01".into()),
      ..RawDate::default()
    };
    assert_eq!(raw.record_key(), None);
    let err = raw.validate(&EraCalendar::default()).unwrap_err();
    assert_eq!(err.kind(), ViolationKind::Validation);
    assert_eq!(field_of(&err), "full_date");

    let raw = RawDate { full_date: Some("9999-12-31".into()), ..RawDate::default() };
    assert_eq!(raw.validate(&EraCalendar::default()).unwrap().date_key, 99991231);

    let raw = RawReview {
      date_key: None,
      review_date: Some("+250000-01-01".into()),
      ..RawReview::new(1, 2, 3, 0)
    };
    assert_eq!(field_of(&raw.validate().unwrap_err()), "review_date");
  }

  #[test]
  fn undecodable_records_fail_validation_on_their_field() {
    let raw = RawHost::undecodable(Some(7), "host_response_rate", "not a number");
    assert_eq!(raw.record_key(), Some(7));
    let err = raw.validate().unwrap_err();
    assert_eq!(field_of(&err), "host_response_rate");
    assert!(err.to_string().contains("not a number"), "{err}");

    let raw = RawReview::undecodable(None, "no_such_column", "bad");
    assert_eq!(field_of(&raw.validate().unwrap_err()), "record");
  }

  #[test]
  fn field_lists_match_serialized_columns() {
    fn columns<T: Serialize>(value: &T) -> Vec<String> {
      match serde_json::to_value(value).unwrap() {
        serde_json::Value::Object(map) => map.keys().cloned().collect(),
        other => panic!("expected an object, got {other}"),
      }
    }
    let sorted = |fields: &[&str]| {
      let mut v: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
      v.sort();
      v
    };
    assert_eq!(columns(&RawDate::default()), sorted(RawDate::FIELDS));
    assert_eq!(columns(&RawHost::default()), sorted(RawHost::FIELDS));
    assert_eq!(columns(&RawListing::default()), sorted(RawListing::FIELDS));
    assert_eq!(columns(&RawReview::default()), sorted(RawReview::FIELDS));
  }
}
