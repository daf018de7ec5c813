//! Local snapshot store: append-only, time-indexed persistence.
//!
//! One embedded SQLite file with a single `vehicle_states` table. Each row
//! denormalizes the domain columns for SQL-level filtering and carries the
//! full serialized state in `state_json`; reads always go through the JSON
//! payload so schema evolution stays cheap. Rows are written once per
//! merge and never updated.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::CoreError;
use crate::model::VehicleState;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS vehicle_states (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        vehicle_id TEXT NOT NULL,
        vin TEXT,
        name TEXT,
        model TEXT,
        timestamp DATETIME NOT NULL,
        battery_level REAL,
        battery_capacity REAL,
        range_estimate REAL,
        range_status TEXT,
        charge_state TEXT,
        charge_limit INTEGER,
        charging_rate REAL,
        time_to_charge DATETIME,
        is_locked BOOLEAN,
        is_online BOOLEAN,
        odometer REAL,
        cabin_temp REAL,
        exterior_temp REAL,
        latitude REAL,
        longitude REAL,
        doors_json TEXT,
        windows_json TEXT,
        frunk TEXT,
        liftgate TEXT,
        tonneau_cover TEXT,
        tires_json TEXT,
        ready_score REAL,
        state_json TEXT NOT NULL,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_vehicle_states_vehicle_id
        ON vehicle_states(vehicle_id);

    CREATE INDEX IF NOT EXISTS idx_vehicle_states_timestamp
        ON vehicle_states(timestamp DESC);

    CREATE INDEX IF NOT EXISTS idx_vehicle_states_vehicle_timestamp
        ON vehicle_states(vehicle_id, timestamp DESC);
";

/// Storage statistics.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StoreStats {
    pub total_states: i64,
    pub unique_vehicles: i64,
    pub oldest_state: Option<DateTime<Utc>>,
    pub newest_state: Option<DateTime<Utc>>,
    /// Database file size in bytes.
    pub database_size: i64,
}

/// Append-only snapshot store backed by a single SQLite file.
///
/// Concurrent `save` calls are serialized by the connection lock; the
/// engine's own transaction discipline covers cross-process readers.
pub struct SnapshotStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SnapshotStore {
    /// Open (creating if needed) the store at `path`.
    ///
    /// Enables WAL journaling and foreign keys on the connection.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path)?;

        // journal_mode returns the resulting mode as a row.
        let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Append one snapshot row, timestamped with the state's `updated_at`.
    pub fn save(&self, state: &VehicleState) -> Result<(), CoreError> {
        let doors_json = serde_json::to_string(&state.doors)?;
        let windows_json = serde_json::to_string(&state.windows)?;
        let tires_json = serde_json::to_string(&state.tires)?;
        // Full state for forward-compatibility and cheap reads.
        let state_json = serde_json::to_string(state)?;

        let (latitude, longitude) = match state.location {
            Some(ref loc) => (Some(loc.latitude), Some(loc.longitude)),
            None => (None, None),
        };

        let conn = self.conn.lock().expect("store lock poisoned");
        conn.execute(
            "INSERT INTO vehicle_states (
                vehicle_id, vin, name, model, timestamp,
                battery_level, battery_capacity, range_estimate, range_status,
                charge_state, charge_limit, charging_rate, time_to_charge,
                is_locked, is_online, odometer,
                cabin_temp, exterior_temp,
                latitude, longitude,
                doors_json, windows_json, frunk, liftgate, tonneau_cover,
                tires_json, ready_score, state_json
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9,
                ?10, ?11, ?12, ?13,
                ?14, ?15, ?16,
                ?17, ?18,
                ?19, ?20,
                ?21, ?22, ?23, ?24, ?25,
                ?26, ?27, ?28
            )",
            params![
                state.vehicle_id,
                state.vin,
                state.name,
                state.model.to_string(),
                format_timestamp(state.updated_at),
                state.battery_level,
                state.battery_capacity,
                state.range_estimate,
                state.range_status.to_string(),
                state.charge_state.to_string(),
                state.charge_limit,
                state.charging_rate,
                state.time_to_charge.map(format_timestamp),
                state.is_locked,
                state.is_online,
                state.odometer,
                state.cabin_temp,
                state.exterior_temp,
                latitude,
                longitude,
                doors_json,
                windows_json,
                state.frunk.to_string(),
                state.liftgate.to_string(),
                state.tonneau_cover.map(|c| c.to_string()),
                tires_json,
                state.ready_score,
                state_json,
            ],
        )?;

        Ok(())
    }

    /// The most recent snapshot for a vehicle, or `None`.
    pub fn latest(&self, vehicle_id: &str) -> Result<Option<VehicleState>, CoreError> {
        let conn = self.conn.lock().expect("store lock poisoned");
        let state_json: Option<String> = conn
            .query_row(
                "SELECT state_json FROM vehicle_states
                 WHERE vehicle_id = ?1
                 ORDER BY timestamp DESC
                 LIMIT 1",
                params![vehicle_id],
                |row| row.get(0),
            )
            .optional()?;

        match state_json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Snapshots with `timestamp >= since`, newest first, capped at
    /// `limit`.
    pub fn history(
        &self,
        vehicle_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<VehicleState>, CoreError> {
        let conn = self.conn.lock().expect("store lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT state_json FROM vehicle_states
             WHERE vehicle_id = ?1 AND timestamp >= ?2
             ORDER BY timestamp DESC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(
            params![vehicle_id, format_timestamp(since), limit as i64],
            |row| row.get::<_, String>(0),
        )?;

        let mut states = Vec::new();
        for json in rows {
            states.push(serde_json::from_str(&json?)?);
        }
        Ok(states)
    }

    /// Snapshots with `timestamp` in `[start, end]`, newest first.
    pub fn range(
        &self,
        vehicle_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<VehicleState>, CoreError> {
        let conn = self.conn.lock().expect("store lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT state_json FROM vehicle_states
             WHERE vehicle_id = ?1 AND timestamp BETWEEN ?2 AND ?3
             ORDER BY timestamp DESC",
        )?;
        let rows = stmt.query_map(
            params![
                vehicle_id,
                format_timestamp(start),
                format_timestamp(end)
            ],
            |row| row.get::<_, String>(0),
        )?;

        let mut states = Vec::new();
        for json in rows {
            states.push(serde_json::from_str(&json?)?);
        }
        Ok(states)
    }

    /// Delete snapshots older than `before`; returns the count removed.
    pub fn delete_older_than(&self, before: DateTime<Utc>) -> Result<usize, CoreError> {
        let conn = self.conn.lock().expect("store lock poisoned");
        let deleted = conn.execute(
            "DELETE FROM vehicle_states WHERE timestamp < ?1",
            params![format_timestamp(before)],
        )?;
        Ok(deleted)
    }

    /// Vehicle ids present in the store, most recently active first.
    ///
    /// Used for offline reads, where the network vehicle list is not
    /// available.
    pub fn vehicle_ids(&self) -> Result<Vec<String>, CoreError> {
        let conn = self.conn.lock().expect("store lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT vehicle_id FROM vehicle_states
             GROUP BY vehicle_id
             ORDER BY MAX(timestamp) DESC",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut ids = Vec::new();
        for id in rows {
            ids.push(id?);
        }
        Ok(ids)
    }

    /// Row counts, timestamp bounds, and database file size.
    pub fn stats(&self) -> Result<StoreStats, CoreError> {
        let conn = self.conn.lock().expect("store lock poisoned");

        let total_states: i64 =
            conn.query_row("SELECT COUNT(*) FROM vehicle_states", [], |row| row.get(0))?;
        let unique_vehicles: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT vehicle_id) FROM vehicle_states",
            [],
            |row| row.get(0),
        )?;

        let (oldest, newest): (Option<String>, Option<String>) = conn.query_row(
            "SELECT MIN(timestamp), MAX(timestamp) FROM vehicle_states",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let database_size: i64 = conn.query_row(
            "SELECT page_count * page_size AS size
             FROM pragma_page_count(), pragma_page_size()",
            [],
            |row| row.get(0),
        )?;

        Ok(StoreStats {
            total_states,
            unique_vehicles,
            oldest_state: oldest.as_deref().map(parse_timestamp).transpose()?,
            newest_state: newest.as_deref().map(parse_timestamp).transpose()?,
            database_size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Canonical column format: UTC with nanoseconds and offset, so
/// lexicographic TEXT comparison matches chronological order.
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.9f%:z").to_string()
}

/// Parse a stored timestamp. Two layouts are accepted: offset-bearing
/// (`2026-07-01 12:00:00.000000000+00:00`) and the bare
/// `2026-07-01 12:00:00` (taken as UTC).
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, CoreError> {
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| CoreError::Config {
            message: format!("unparseable store timestamp '{raw}': {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RangeStatus, VehicleModel};
    use chrono::Duration;

    fn open_temp() -> (tempfile::TempDir, SnapshotStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(dir.path().join("state.db")).unwrap();
        (dir, store)
    }

    fn state_at(vehicle_id: &str, at: DateTime<Utc>, battery: f64) -> VehicleState {
        let mut state = VehicleState::empty(vehicle_id);
        state.vin = "VIN1".into();
        state.name = "Adventure".into();
        state.model = VehicleModel::R1T;
        state.updated_at = at;
        state.battery_level = battery;
        state.range_estimate = 200.0;
        state.range_status = RangeStatus::Normal;
        state
    }

    #[test]
    fn save_then_latest_round_trips() {
        let (_dir, store) = open_temp();
        let now = Utc::now();

        store.save(&state_at("v1", now - Duration::hours(2), 70.0)).unwrap();
        store.save(&state_at("v1", now - Duration::hours(1), 75.0)).unwrap();

        let latest = store.latest("v1").unwrap().unwrap();
        assert_eq!(latest.battery_level, 75.0);
        assert_eq!(latest.vin, "VIN1");
        assert_eq!(latest.model, VehicleModel::R1T);
    }

    #[test]
    fn latest_for_unknown_vehicle_is_none() {
        let (_dir, store) = open_temp();
        assert!(store.latest("missing").unwrap().is_none());
    }

    #[test]
    fn history_is_newest_first_and_bounded() {
        let (_dir, store) = open_temp();
        let now = Utc::now();

        for hours_ago in 1..=5 {
            let at = now - Duration::hours(hours_ago);
            store
                .save(&state_at("v1", at, f64::from(100 - hours_ago as i32)))
                .unwrap();
        }

        let since = now - Duration::hours(4);
        let history = store.history("v1", since, 3).unwrap();

        assert_eq!(history.len(), 3);
        for pair in history.windows(2) {
            assert!(pair[0].updated_at >= pair[1].updated_at);
        }
        for state in &history {
            assert!(state.updated_at >= since);
        }
    }

    #[test]
    fn range_is_inclusive_and_newest_first() {
        let (_dir, store) = open_temp();
        let now = Utc::now();
        let t1 = now - Duration::hours(3);
        let t2 = now - Duration::hours(2);
        let t3 = now - Duration::hours(1);

        store.save(&state_at("v1", t1, 70.0)).unwrap();
        store.save(&state_at("v1", t2, 75.0)).unwrap();
        store.save(&state_at("v1", t3, 80.0)).unwrap();

        let rows = store.range("v1", t1, t2).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].battery_level, 75.0);
        assert_eq!(rows[1].battery_level, 70.0);
    }

    #[test]
    fn history_is_scoped_per_vehicle() {
        let (_dir, store) = open_temp();
        let now = Utc::now();

        store.save(&state_at("v1", now - Duration::hours(1), 70.0)).unwrap();
        store.save(&state_at("v2", now - Duration::hours(1), 30.0)).unwrap();

        let history = store
            .history("v1", now - Duration::hours(2), 10)
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].vehicle_id, "v1");
    }

    #[test]
    fn delete_older_than_reports_count() {
        let (_dir, store) = open_temp();
        let now = Utc::now();

        store.save(&state_at("v1", now - Duration::days(10), 70.0)).unwrap();
        store.save(&state_at("v1", now - Duration::days(5), 75.0)).unwrap();
        store.save(&state_at("v1", now, 80.0)).unwrap();

        let deleted = store.delete_older_than(now - Duration::days(7)).unwrap();
        assert_eq!(deleted, 1);

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_states, 2);
    }

    #[test]
    fn stats_reports_counts_bounds_and_size() {
        let (_dir, store) = open_temp();
        let now = Utc::now();
        let oldest = now - Duration::hours(2);

        store.save(&state_at("v1", oldest, 70.0)).unwrap();
        store.save(&state_at("v1", now - Duration::hours(1), 75.0)).unwrap();
        store.save(&state_at("v2", now, 40.0)).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_states, 3);
        assert_eq!(stats.unique_vehicles, 2);
        assert!(stats.database_size > 0);

        let reported_oldest = stats.oldest_state.unwrap();
        assert!((reported_oldest - oldest).num_seconds().abs() <= 1);
        let reported_newest = stats.newest_state.unwrap();
        assert!((reported_newest - now).num_seconds().abs() <= 1);
    }

    #[test]
    fn stats_on_empty_store() {
        let (_dir, store) = open_temp();
        let stats = store.stats().unwrap();
        assert_eq!(stats.total_states, 0);
        assert_eq!(stats.unique_vehicles, 0);
        assert!(stats.oldest_state.is_none());
        assert!(stats.newest_state.is_none());
    }

    #[test]
    fn vehicle_ids_ordered_by_recent_activity() {
        let (_dir, store) = open_temp();
        let now = Utc::now();

        store.save(&state_at("older", now - Duration::hours(5), 50.0)).unwrap();
        store.save(&state_at("newer", now - Duration::hours(1), 60.0)).unwrap();

        assert_eq!(store.vehicle_ids().unwrap(), vec!["newer", "older"]);
    }

    #[test]
    fn timestamp_layouts_both_parse() {
        let with_offset = parse_timestamp("2026-07-01 12:00:00.000000000+00:00").unwrap();
        let bare = parse_timestamp("2026-07-01 12:00:00").unwrap();
        assert_eq!(with_offset, bare);

        let offset = parse_timestamp("2026-07-01 12:00:00.500000000-07:00").unwrap();
        assert_eq!(
            offset,
            "2026-07-01T19:00:00.5Z".parse::<DateTime<Utc>>().unwrap()
        );

        assert!(parse_timestamp("yesterday-ish").is_err());
    }
}
