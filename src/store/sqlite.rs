//! SQLite-backed region store
//!
//! One connection opened read-only at startup and shared by every request.
//! `rusqlite::Connection` is not `Sync`, so it lives behind a mutex.

use rusqlite::types::{FromSql, FromSqlResult, Type, ValueRef};
use rusqlite::{params, Connection, OpenFlags};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{Period, PunctualityRecord, Region, RegionStore, StoreError};
use crate::logger;

const LIST_REGIONS_SQL: &str = "SELECT nom, lat, lon FROM regions";
const FIND_REGION_SQL: &str = "SELECT nom, lat, lon FROM regions WHERE nom = ?1";
const LIST_PUNCTUALITY_SQL: &str = r#"SELECT "Date", "Tauxderégularité"
    FROM "regularite-mensuelle-ter"
    WHERE "Région" = ?1
    ORDER BY "Date""#;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the dataset file read-only
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an already opened connection
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl RegionStore for SqliteStore {
    fn list_regions(&self) -> Result<Vec<Region>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(LIST_REGIONS_SQL)?;
        let regions = stmt
            .query_map([], region_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(regions)
    }

    fn find_region(&self, name: &str) -> Result<Option<Region>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(FIND_REGION_SQL)?;
        let mut rows = stmt.query_map(params![name], region_from_row)?;
        Ok(rows.next().transpose()?)
    }

    fn list_punctuality(&self, region: &str) -> Result<Vec<PunctualityRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(LIST_PUNCTUALITY_SQL)?;
        let rows = stmt
            .query_map(params![region], |row| {
                let date: String = row.get(0)?;
                let rate: Numeric = row.get(1)?;
                Ok((date, rate.0))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let records = rows
            .into_iter()
            .filter_map(|(date, rate)| {
                let Some(period) = Period::parse(&date) else {
                    logger::log_warning(&format!(
                        "Skipping punctuality row with unreadable date '{date}' for region '{region}'"
                    ));
                    return None;
                };
                Some(PunctualityRecord {
                    region: region.to_string(),
                    period,
                    rate,
                })
            })
            .collect();
        Ok(records)
    }
}

fn region_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Region> {
    let name: String = row.get(0)?;
    let latitude = required_number(row, 1, "lat")?;
    let longitude = required_number(row, 2, "lon")?;
    Ok(Region {
        name,
        latitude,
        longitude,
    })
}

fn required_number(row: &rusqlite::Row<'_>, idx: usize, column: &str) -> rusqlite::Result<f64> {
    let value: Numeric = row.get(idx)?;
    value
        .0
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(idx, column.to_string(), Type::Text))
}

/// Numeric cell that tolerates the text encodings found in CSV imports.
///
/// NULL, blank text and unparsable text all read as `None`.
struct Numeric(Option<f64>);

impl FromSql for Numeric {
    #[allow(clippy::cast_precision_loss)]
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(Self(match value {
            ValueRef::Integer(i) => Some(i as f64),
            ValueRef::Real(f) => Some(f),
            ValueRef::Text(t) => std::str::from_utf8(t).ok().and_then(parse_rate),
            ValueRef::Null | ValueRef::Blob(_) => None,
        }))
    }
}

/// Parse a textual rate; empty means unmeasured
pub fn parse_rate(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.replace(',', ".").parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// In-memory dataset shaped like the production file
    pub fn fixture_store() -> SqliteStore {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE regions (nom TEXT PRIMARY KEY, lat REAL, lon TEXT);
            CREATE TABLE "regularite-mensuelle-ter" (
                "Date" TEXT, "Région" TEXT, "Tauxderégularité" TEXT
            );
            INSERT INTO regions VALUES ('Bretagne', 48.2, '-2.9');
            INSERT INTO regions VALUES ('Île-de-France', 48.7, '2.5');
            INSERT INTO regions VALUES ('Corse', 42.1, '9.1');
            INSERT INTO "regularite-mensuelle-ter" VALUES ('2021-03', 'Bretagne', '92.5');
            INSERT INTO "regularite-mensuelle-ter" VALUES ('2021-01', 'Bretagne', '90.0');
            INSERT INTO "regularite-mensuelle-ter" VALUES ('2021-02', 'Bretagne', '');
            INSERT INTO "regularite-mensuelle-ter" VALUES ('2021-04', 'Bretagne', NULL);
            INSERT INTO "regularite-mensuelle-ter" VALUES ('n/a', 'Bretagne', '80');
            INSERT INTO "regularite-mensuelle-ter" VALUES ('2021-01', 'Île-de-France', '88,5');
            INSERT INTO "regularite-mensuelle-ter" VALUES ('2021-01', 'Corse', '');
            "#,
        )
        .unwrap();
        SqliteStore::from_connection(conn)
    }

    #[test]
    fn test_list_regions() {
        let store = fixture_store();
        let regions = store.list_regions().unwrap();
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0].name, "Bretagne");
        assert!((regions[0].longitude - -2.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_find_region_exact_match() {
        let store = fixture_store();
        let found = store.find_region("Île-de-France").unwrap();
        assert_eq!(found.map(|r| r.name), Some("Île-de-France".to_string()));
        assert!(store.find_region("ile-de-france").unwrap().is_none());
        assert!(store.find_region("Nowhere").unwrap().is_none());
    }

    #[test]
    fn test_list_punctuality_ordered_and_typed() {
        let store = fixture_store();
        let records = store.list_punctuality("Bretagne").unwrap();
        let periods: Vec<String> = records.iter().map(|r| r.period.to_string()).collect();
        assert_eq!(periods, vec!["2021-01", "2021-02", "2021-03", "2021-04"]);
        assert_eq!(records[0].rate, Some(90.0));
        assert_eq!(records[1].rate, None);
        assert_eq!(records[2].rate, Some(92.5));
        assert_eq!(records[3].rate, None);
    }

    #[test]
    fn test_list_punctuality_decimal_comma() {
        let store = fixture_store();
        let records = store.list_punctuality("Île-de-France").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].rate, Some(88.5));
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("90.0"), Some(90.0));
        assert_eq!(parse_rate(" 92,5 "), Some(92.5));
        assert_eq!(parse_rate(""), None);
        assert_eq!(parse_rate("   "), None);
        assert_eq!(parse_rate("NaN"), None);
        assert_eq!(parse_rate("abc"), None);
    }
}
