use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A calendar month in `YYYY-MM` form. Budget plans and dashboards are keyed
/// by one of these per owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    year: i32,
    month: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("monthKey must be a valid YYYY-MM month: {0}")]
pub struct MonthKeyError(pub String);

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (0..=9999).contains(&year) && (1..=12).contains(&month) {
            Some(MonthKey { year, month })
        } else {
            None
        }
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn start_date(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap()
    }

    /// First day of the following month — the exclusive end of this month's
    /// transaction range.
    pub fn next_month_start(self) -> NaiveDate {
        if self.month == 12 {
            NaiveDate::from_ymd_opt(self.year + 1, 1, 1).unwrap()
        } else {
            NaiveDate::from_ymd_opt(self.year, self.month + 1, 1).unwrap()
        }
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date >= self.start_date() && date < self.next_month_start()
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = MonthKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        let shaped = bytes.len() == 7
            && bytes[4] == b'-'
            && bytes[..4].iter().all(u8::is_ascii_digit)
            && bytes[5..].iter().all(u8::is_ascii_digit);
        if !shaped {
            return Err(MonthKeyError(s.to_string()));
        }

        let year: i32 = s[..4].parse().map_err(|_| MonthKeyError(s.to_string()))?;
        let month: u32 = s[5..].parse().map_err(|_| MonthKeyError(s.to_string()))?;
        MonthKey::new(year, month).ok_or_else(|| MonthKeyError(s.to_string()))
    }
}

impl TryFrom<String> for MonthKey {
    type Error = MonthKeyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MonthKey> for String {
    fn from(key: MonthKey) -> String {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_all_valid_months() {
        for month in 1..=12 {
            let key = format!("2026-{month:02}");
            assert!(key.parse::<MonthKey>().is_ok(), "{key} should parse");
        }
    }

    #[test]
    fn rejects_malformed_keys() {
        for bad in ["2026/02", "2026-13", "2026-00", "26-02", "2026-2", "2026-02-01", "abcd-ef", ""] {
            assert!(bad.parse::<MonthKey>().is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn display_round_trip() {
        let key: MonthKey = "2024-07".parse().unwrap();
        assert_eq!(key.to_string(), "2024-07");
        assert_eq!(key.to_string().parse::<MonthKey>().unwrap(), key);
    }

    #[test]
    fn month_range_is_half_open() {
        let key: MonthKey = "2024-02".parse().unwrap();
        assert_eq!(key.start_date(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(key.next_month_start(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert!(key.contains(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()));
        assert!(!key.contains(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
    }

    #[test]
    fn december_rolls_into_next_year() {
        let key: MonthKey = "2025-12".parse().unwrap();
        assert_eq!(key.next_month_start(), NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
    }
}
