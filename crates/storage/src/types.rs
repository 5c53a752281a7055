//! Common types used across storage operations.
//!
//! Besides the raw [`KeyValue`] pair returned by range scans, this module
//! owns the two identifiers every other component agrees on: [`UserId`] and
//! [`CalendarDay`]. Quota accounting compares counts keyed by both, so their
//! encodings are defined exactly once, here.

use std::{fmt, str::FromStr};

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Key-value pair returned from range queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    /// The key identifying this entry.
    pub key: Bytes,

    /// The value stored at this key.
    pub value: Bytes,
}

impl KeyValue {
    /// Creates a new key-value pair.
    pub fn new(key: Bytes, value: Bytes) -> Self {
        Self { key, value }
    }
}

/// Opaque, non-empty handle identifying a user.
///
/// # Examples
///
/// ```
/// use togo_storage::UserId;
///
/// let id = UserId::parse("firstUser").unwrap();
/// assert_eq!(id.as_str(), "firstUser");
/// assert!(UserId::parse("").is_none());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wraps `value`, rejecting the empty string.
    #[must_use]
    pub fn parse(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.is_empty() { None } else { Some(Self(value)) }
    }

    /// The raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Format used for every rendering and parsing of a [`CalendarDay`].
const DAY_FORMAT: &str = "%Y-%m-%d";

/// A UTC calendar day, always rendered as `YYYY-MM-DD`.
///
/// Counts are looked up and rows are written under the same rendering, so
/// this type is the only place a date is turned into a string or back.
///
/// # Examples
///
/// ```
/// use togo_storage::CalendarDay;
///
/// let day: CalendarDay = "2026-10-16".parse().unwrap();
/// assert_eq!(day.to_string(), "2026-10-16");
/// assert!("2026-1-5".parse::<CalendarDay>().is_err());
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CalendarDay(NaiveDate);

impl CalendarDay {
    /// The UTC day containing `instant`.
    #[must_use]
    pub fn from_utc(instant: DateTime<Utc>) -> Self {
        Self(instant.date_naive())
    }

    /// The current UTC day.
    #[must_use]
    pub fn today() -> Self {
        Self::from_utc(Utc::now())
    }

    /// Wraps an already-constructed date.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    /// The following day, saturating at the end of the representable range.
    #[must_use]
    pub fn succ(self) -> Self {
        Self(self.0.succ_opt().unwrap_or(self.0))
    }
}

impl fmt::Display for CalendarDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DAY_FORMAT))
    }
}

/// Error returned when a string is not a `YYYY-MM-DD` day.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid calendar day '{0}', expected YYYY-MM-DD")]
pub struct InvalidCalendarDay(pub String);

impl FromStr for CalendarDay {
    type Err = InvalidCalendarDay;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // chrono accepts unpadded fields; stored keys never contain them.
        if s.len() != 10 {
            return Err(InvalidCalendarDay(s.to_owned()));
        }
        NaiveDate::parse_from_str(s, DAY_FORMAT)
            .map(Self)
            .map_err(|_| InvalidCalendarDay(s.to_owned()))
    }
}

impl Serialize for CalendarDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CalendarDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
