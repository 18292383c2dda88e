//! Calendar keys derived from UTC timestamps.
//!
//! * [`DateKey`]: one UTC calendar day, rendered `yyyymmdd`.
//! * [`CycleKey`]: one case cycle within a day, rendered `yyyymmdd-HHMM`
//!   where `HHMM` is the UTC start of the cycle bucket.
//! * [`WeekKey`]: one ISO-8601 week, rendered `YYYY-Www`.
//!
//! All keys order chronologically.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const SECS_PER_DAY: u32 = 86_400;

// ─── DateKey ─────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct DateKey(NaiveDate);

impl DateKey {
  /// The UTC calendar day containing `at`.
  pub fn of(at: DateTime<Utc>) -> Self { Self(at.date_naive()) }

  /// The day before. `None` only at the edge of the representable range.
  pub fn previous(self) -> Option<Self> { self.0.pred_opt().map(Self) }

  pub fn week(self) -> WeekKey {
    let iso = self.0.iso_week();
    WeekKey {
      year: iso.year(),
      week: iso.week(),
    }
  }

  /// Zero-based day of the year, used to rotate the seed deck.
  pub fn day_of_year(self) -> u32 { self.0.ordinal0() }
}

impl fmt::Display for DateKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0.format("%Y%m%d"))
  }
}

impl FromStr for DateKey {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
      return Err(Error::InvalidInput(format!("invalid date key: {s:?}")));
    }
    NaiveDate::parse_from_str(s, "%Y%m%d")
      .map(Self)
      .map_err(|_| Error::InvalidInput(format!("invalid date key: {s:?}")))
  }
}

impl TryFrom<String> for DateKey {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { s.parse() }
}

impl From<DateKey> for String {
  fn from(key: DateKey) -> Self { key.to_string() }
}

// ─── CycleKey ────────────────────────────────────────────────────────────────

/// Identifies one case cycle: the UTC day plus the minute the bucket starts.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct CycleKey {
  date:         DateKey,
  start_minute: u32,
}

impl CycleKey {
  /// The cycle bucket containing `at`. Buckets are `cycle_secs` long and
  /// counted from UTC midnight; the last bucket of a day may be shorter.
  pub fn containing(at: DateTime<Utc>, cycle_secs: u32) -> Self {
    let cycle = cycle_secs.clamp(60, SECS_PER_DAY);
    let secs = at.num_seconds_from_midnight();
    let start = secs - secs % cycle;
    Self {
      date:         DateKey::of(at),
      start_minute: start / 60,
    }
  }

  pub fn date(self) -> DateKey { self.date }
}

impl fmt::Display for CycleKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}-{:02}{:02}",
      self.date,
      self.start_minute / 60,
      self.start_minute % 60
    )
  }
}

impl FromStr for CycleKey {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let invalid = || Error::InvalidInput(format!("invalid cycle key: {s:?}"));
    let (date, time) = s.split_once('-').ok_or_else(invalid)?;
    if time.len() != 4 || !time.bytes().all(|b| b.is_ascii_digit()) {
      return Err(invalid());
    }
    let hours: u32 = time[..2].parse().map_err(|_| invalid())?;
    let minutes: u32 = time[2..].parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
      return Err(invalid());
    }
    Ok(Self {
      date:         date.parse()?,
      start_minute: hours * 60 + minutes,
    })
  }
}

impl TryFrom<String> for CycleKey {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { s.parse() }
}

impl From<CycleKey> for String {
  fn from(key: CycleKey) -> Self { key.to_string() }
}

// ─── WeekKey ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeekKey {
  year: i32,
  week: u32,
}

impl WeekKey {
  pub fn of(at: DateTime<Utc>) -> Self { DateKey::of(at).week() }
}

impl fmt::Display for WeekKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-W{:02}", self.year, self.week)
  }
}
