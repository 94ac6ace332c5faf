//! Data access layer
//!
//! Read-only access to the regional punctuality dataset. Handlers and the
//! chart renderer only see the `RegionStore` trait; `SqliteStore` is the
//! production implementation.

mod sqlite;

pub use sqlite::{parse_rate, SqliteStore};

#[cfg(test)]
pub(crate) use sqlite::tests::fixture_store;

use serde::Serialize;
use std::fmt;

/// Data access errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database connection lock poisoned")]
    Poisoned,
}

/// A region as stored in the `regions` table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Region {
    #[serde(rename = "nom")]
    pub name: String,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
}

/// Calendar month of a punctuality measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    /// Parse a `YYYY-MM...` date column value.
    ///
    /// The year is the first 4 characters and the month the 2 characters
    /// following the separator; anything after that (a day, a time) is ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let year = raw.get(..4)?.parse::<i32>().ok()?;
        let month = raw.get(5..7)?.parse::<u32>().ok()?;
        if (1..=12).contains(&month) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    /// First day of the month
    pub fn first_day(self) -> Option<chrono::NaiveDate> {
        chrono::NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Monthly punctuality rate of a region.
///
/// `rate` is `None` for unmeasured months; those are not zero values and must
/// never be plotted.
#[derive(Debug, Clone, PartialEq)]
pub struct PunctualityRecord {
    pub region: String,
    pub period: Period,
    pub rate: Option<f64>,
}

/// Read-only queries the service issues against the dataset
pub trait RegionStore: Send + Sync {
    /// All regions, in store order
    fn list_regions(&self) -> Result<Vec<Region>, StoreError>;

    /// Region with exactly this name
    fn find_region(&self, name: &str) -> Result<Option<Region>, StoreError>;

    /// Punctuality records of a region, oldest period first
    fn list_punctuality(&self, region: &str) -> Result<Vec<PunctualityRecord>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_parse() {
        assert_eq!(Period::parse("2021-03"), Some(Period { year: 2021, month: 3 }));
        assert_eq!(
            Period::parse("2019-11-01"),
            Some(Period { year: 2019, month: 11 })
        );
        assert_eq!(Period::parse("2019/07"), Some(Period { year: 2019, month: 7 }));
    }

    #[test]
    fn test_period_parse_invalid() {
        assert_eq!(Period::parse(""), None);
        assert_eq!(Period::parse("2021"), None);
        assert_eq!(Period::parse("2021-13"), None);
        assert_eq!(Period::parse("abcd-01"), None);
    }

    #[test]
    fn test_period_first_day() {
        let day = Period { year: 2020, month: 2 }.first_day();
        assert_eq!(day, chrono::NaiveDate::from_ymd_opt(2020, 2, 1));
        assert_eq!(Period { year: 2020, month: 2 }.to_string(), "2020-02");
    }

    #[test]
    fn test_region_serializes_french_keys() {
        let region = Region {
            name: "Bretagne".to_string(),
            latitude: 48.2,
            longitude: -2.9,
        };
        let value = serde_json::to_value(&region).unwrap();
        let obj = value.as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["lat", "lon", "nom"]);
        assert_eq!(obj["nom"], "Bretagne");
    }
}
