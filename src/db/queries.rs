use crate::db::Database;
use crate::error::Result;
use crate::logic::cache::CacheStore;
use crate::models::{CacheEntry, WeatherSnapshot};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use tracing::warn;

// Weather Cache Queries

impl CacheStore for Database {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let row: Option<(String, String)> = self.with_conn(|conn| {
            conn.query_row(
                "SELECT fetched_at, payload FROM weather_cache WHERE zone_key = ?1",
                [key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(Into::into)
        })?;

        let Some((fetched_at_str, payload)) = row else {
            return Ok(None);
        };

        let fetched_at = match DateTime::parse_from_rfc3339(&fetched_at_str) {
            Ok(dt) => dt.with_timezone(&Utc),
            Err(e) => {
                warn!(zone = key, fetched_at = %fetched_at_str, "Unreadable cache timestamp, ignoring entry: {}", e);
                return Ok(None);
            }
        };

        let snapshot: WeatherSnapshot = match serde_json::from_str(&payload) {
            Ok(s) => s,
            Err(e) => {
                warn!(zone = key, "Unreadable cached snapshot, ignoring entry: {}", e);
                return Ok(None);
            }
        };

        Ok(Some(CacheEntry {
            snapshot,
            fetched_at,
        }))
    }

    fn put(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let payload = serde_json::to_string(&entry.snapshot)?;
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT OR REPLACE INTO weather_cache (zone_key, fetched_at, payload)
                VALUES (?1, ?2, ?3)
                "#,
                params![key, entry.fetched_at.to_rfc3339(), payload],
            )?;
            Ok(())
        })
    }

    fn clear(&self) -> Result<usize> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM weather_cache", [])?))
    }
}

impl Database {
    /// Zone keys with a cached snapshot, newest first
    pub fn cached_zones(&self) -> Result<Vec<(String, DateTime<Utc>)>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT zone_key, fetched_at FROM weather_cache ORDER BY fetched_at DESC")?;
            let zones = stmt
                .query_map([], |row| {
                    let key: String = row.get(0)?;
                    let fetched_at: String = row.get(1)?;
                    Ok((key, fetched_at))
                })?
                .filter_map(|r| r.ok())
                .filter_map(|(key, fetched_at)| {
                    DateTime::parse_from_rfc3339(&fetched_at)
                        .ok()
                        .map(|dt| (key, dt.with_timezone(&Utc)))
                })
                .collect();
            Ok(zones)
        })
    }
}

// Settings Queries

const LAST_ZONE_KEY: &str = "last_zone";

impl Database {
    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(Into::into)
        })
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?;
            Ok(())
        })
    }

    pub fn last_zone(&self) -> Result<Option<String>> {
        self.get_setting(LAST_ZONE_KEY)
    }

    pub fn remember_zone(&self, zone_key: &str) -> Result<()> {
        self.set_setting(LAST_ZONE_KEY, zone_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::snapshot::fixtures::sample_snapshot;
    use chrono::TimeZone;

    fn entry_at(hour: u32) -> CacheEntry {
        CacheEntry {
            snapshot: sample_snapshot(),
            fetched_at: Utc.with_ymd_and_hms(2025, 3, 10, hour, 0, 0).unwrap(),
        }
    }

    #[test]
    fn cache_entry_survives_round_trip() {
        let db = Database::open_in_memory().unwrap();
        db.put("loreto,orellana", &entry_at(9)).unwrap();

        let loaded = CacheStore::get(&db, "loreto,orellana").unwrap().unwrap();
        assert_eq!(loaded, entry_at(9));
        assert!(CacheStore::get(&db, "mera,pastaza").unwrap().is_none());
    }

    #[test]
    fn put_replaces_existing_row() {
        let db = Database::open_in_memory().unwrap();
        db.put("loreto,orellana", &entry_at(9)).unwrap();
        db.put("loreto,orellana", &entry_at(11)).unwrap();

        let zones = db.cached_zones().unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].1, entry_at(11).fetched_at);
    }

    #[test]
    fn corrupt_payload_reads_as_miss() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO weather_cache (zone_key, fetched_at, payload) VALUES ('x', ?1, '{not json')",
                [Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .unwrap();

        assert!(CacheStore::get(&db, "x").unwrap().is_none());
    }

    #[test]
    fn clear_removes_all_rows() {
        let db = Database::open_in_memory().unwrap();
        db.put("a", &entry_at(1)).unwrap();
        db.put("b", &entry_at(2)).unwrap();
        assert_eq!(db.clear().unwrap(), 2);
        assert!(db.cached_zones().unwrap().is_empty());
    }

    #[test]
    fn remembers_last_zone() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.last_zone().unwrap(), None);
        db.remember_zone("mera,pastaza").unwrap();
        db.remember_zone("loreto,orellana").unwrap();
        assert_eq!(db.last_zone().unwrap().as_deref(), Some("loreto,orellana"));
    }

    #[test]
    fn missing_rows_read_as_none() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_setting("never-written").unwrap(), None);
        assert!(CacheStore::get(&db, "never-cached").unwrap().is_none());

        db.set_setting("theme", "dark").unwrap();
        assert_eq!(db.get_setting("theme").unwrap().as_deref(), Some("dark"));
    }
}
