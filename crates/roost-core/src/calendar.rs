//! Calendar derivations for the date dimension.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model::DateEntry;

const DAY_NAMES: [&str; 7] = [
  "Monday",
  "Tuesday",
  "Wednesday",
  "Thursday",
  "Friday",
  "Saturday",
  "Sunday",
];

const MONTH_NAMES: [&str; 12] = [
  "January",
  "February",
  "March",
  "April",
  "May",
  "June",
  "July",
  "August",
  "September",
  "October",
  "November",
  "December",
];

const fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
  match NaiveDate::from_ymd_opt(year, month, day) {
    Some(date) => date,
    None => panic!("invalid calendar constant"),
  }
}

/// Years a `YYYYMMDD` key can represent.
pub const KEY_YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

/// The `YYYYMMDD` surrogate key for a calendar day, or `None` when the year
/// has no four-digit form.
pub fn date_key(date: NaiveDate) -> Option<i32> {
  if !KEY_YEARS.contains(&date.year()) {
    return None;
  }
  Some(date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32)
}

/// The calendar day a `YYYYMMDD` key names, if it names one.
pub fn day_of_key(key: i32) -> Option<NaiveDate> {
  if key <= 0 {
    return None;
  }
  NaiveDate::from_ymd_opt(key / 10_000, (key / 100 % 100) as u32, (key % 100) as u32)
}

/// Boundaries of the two analytical eras flagged on every date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EraCalendar {
  /// First day on which the short-term rental regulation applied.
  pub regulation_start: NaiveDate,
  pub covid_start:      NaiveDate,
  /// Last day of the covid period, inclusive.
  pub covid_end:        NaiveDate,
}

impl Default for EraCalendar {
  fn default() -> Self {
    Self {
      regulation_start: ymd(2015, 1, 1),
      covid_start:      ymd(2020, 3, 1),
      covid_end:        ymd(2021, 12, 31),
    }
  }
}

impl EraCalendar {
  pub fn is_post_regulation(&self, date: NaiveDate) -> bool {
    date >= self.regulation_start
  }

  pub fn is_covid_period(&self, date: NaiveDate) -> bool {
    (self.covid_start..=self.covid_end).contains(&date)
  }

  /// The fully-derived date dimension row for `date`, or `None` when the
  /// day has no [`date_key`].
  pub fn entry(&self, date: NaiveDate) -> Option<DateEntry> {
    let month = date.month();
    Some(DateEntry {
      date_key:           date_key(date)?,
      full_date:          date,
      day_of_week:        date.weekday().number_from_monday() as u8,
      day_name:           DAY_NAMES[date.weekday().num_days_from_monday() as usize]
        .to_owned(),
      month_name:         MONTH_NAMES[month as usize - 1].to_owned(),
      month:              month as u8,
      quarter:            ((month - 1) / 3 + 1) as u8,
      year:               date.year(),
      is_post_regulation: self.is_post_regulation(date),
      is_covid_period:    self.is_covid_period(date),
    })
  }

  /// One entry per keyable day in `from..=to`. Empty when `to < from`.
  pub fn entries(&self, from: NaiveDate, to: NaiveDate) -> Vec<DateEntry> {
    from
      .iter_days()
      .take_while(|d| *d <= to)
      .filter_map(|d| self.entry(d))
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn derives_calendar_attributes() {
    let eras = EraCalendar::default();
    let entry = eras.entry(ymd(2019, 6, 15)).unwrap();

    assert_eq!(entry.date_key, 20190615);
    assert_eq!(entry.day_of_week, 6);
    assert_eq!(entry.day_name, "Saturday");
    assert_eq!(entry.month_name, "June");
    assert_eq!(entry.month, 6);
    assert_eq!(entry.quarter, 2);
    assert_eq!(entry.year, 2019);
    assert!(entry.is_post_regulation);
    assert!(!entry.is_covid_period);
  }

  #[test]
  fn era_boundaries_are_inclusive() {
    let eras = EraCalendar::default();
    assert!(!eras.is_post_regulation(ymd(2014, 12, 31)));
    assert!(eras.is_post_regulation(ymd(2015, 1, 1)));
    assert!(eras.is_covid_period(ymd(2020, 3, 1)));
    assert!(eras.is_covid_period(ymd(2021, 12, 31)));
    assert!(!eras.is_covid_period(ymd(2022, 1, 1)));
  }

  #[test]
  fn entries_cover_range_inclusive() {
    let eras = EraCalendar::default();
    let days = eras.entries(ymd(2020, 2, 27), ymd(2020, 3, 1));
    let keys: Vec<_> = days.iter().map(|d| d.date_key).collect();
    assert_eq!(keys, [20200227, 20200228, 20200229, 20200301]);

    assert!(eras.entries(ymd(2020, 3, 1), ymd(2020, 2, 1)).is_empty());
  }

  #[test]
  fn keys_exist_only_for_four_digit_years() {
    assert_eq!(date_key(ymd(1, 1, 1)), Some(10101));
    assert_eq!(date_key(ymd(9999, 12, 31)), Some(99991231));
    assert_eq!(date_key(ymd(0, 12, 31)), None);
    assert_eq!(date_key(ymd(10_000, 1, 1)), None);
    assert_eq!(date_key(ymd(250_000, 1, 1)), None);
    assert!(EraCalendar::default().entry(ymd(-1, 1, 1)).is_none());
  }

  #[test]
  fn keys_decode_back_to_days() {
    assert_eq!(day_of_key(20190615), Some(ymd(2019, 6, 15)));
    assert_eq!(day_of_key(20190631), None);
    assert_eq!(day_of_key(0), None);
    assert_eq!(day_of_key(-20190615), None);
  }
}
