//! Calendar day key used to partition todos.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{Datelike, Local, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};

static DAY_KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").expect("Invalid regex"));

/// A calendar day, rendered as zero-padded `YYYY-MM-DD`.
///
/// Parsing also accepts the legacy unpadded `YYYY-M-D` form so older stored
/// records keep loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub const fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// The current day in the local timezone.
    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    pub const fn date(self) -> NaiveDate {
        self.0
    }

    /// Unpadded `YYYY-M-D` rendering used by older storage keys.
    pub fn legacy_format(self) -> String {
        format!("{}-{}-{}", self.0.year(), self.0.month(), self.0.day())
    }

    /// Whether `raw` is already in the canonical zero-padded form.
    pub fn is_canonical(raw: &str) -> bool {
        raw.parse::<Self>().is_ok_and(|key| key.to_string() == raw)
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DayKey {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || crate::Error::InvalidInput(format!("invalid day key '{s}'"));
        let captures = DAY_KEY_PATTERN.captures(s.trim()).ok_or_else(invalid)?;
        let year = captures[1].parse::<i32>().map_err(|_| invalid())?;
        let month = captures[2].parse::<u32>().map_err(|_| invalid())?;
        let day = captures[3].parse::<u32>().map_err(|_| invalid())?;
        Self::from_ymd(year, month, day).ok_or_else(invalid)
    }
}

impl TryFrom<String> for DayKey {
    type Error = crate::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DayKey> for String {
    fn from(value: DayKey) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_zero_padded() {
        let key = DayKey::from_ymd(2024, 3, 5).unwrap();
        assert_eq!(key.to_string(), "2024-03-05");
        assert_eq!(key.legacy_format(), "2024-3-5");
    }

    #[test]
    fn parses_legacy_and_canonical_forms() {
        let legacy: DayKey = "2024-3-5".parse().unwrap();
        let padded: DayKey = "2024-03-05".parse().unwrap();
        assert_eq!(legacy, padded);
        assert!(DayKey::is_canonical("2024-03-05"));
        assert!(!DayKey::is_canonical("2024-3-5"));
    }

    #[test]
    fn rejects_impossible_dates() {
        assert!("2024-02-30".parse::<DayKey>().is_err());
        assert!("2024/02/03".parse::<DayKey>().is_err());
        assert!("".parse::<DayKey>().is_err());
    }

    #[test]
    fn serde_uses_string_form() {
        let key = DayKey::from_ymd(2025, 12, 1).unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"2025-12-01\"");
        let parsed: DayKey = serde_json::from_str("\"2025-12-1\"").unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn orders_chronologically() {
        let earlier: DayKey = "2024-9-30".parse().unwrap();
        let later: DayKey = "2024-10-1".parse().unwrap();
        assert!(earlier < later);
    }
}
