//! SQLite persistence for every stateful subsystem.
//!
//! One `Database` handle backs the gateway's counters, the focus
//! monitor's event history, and preference memory. The connection sits
//! behind a mutex so the handle can be shared across request threads and
//! the poll loop; individual statements are short and synchronous.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use crate::error::{CoreError, DatabaseError};
use crate::model::{
    BudgetUsage, DecisionRecord, FocusEvent, FocusMetrics, FocusStateSnapshot, MemoryEvent,
    Profile, SettingItem,
};
use crate::storage::SettingsStore;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS user_settings (
    key           TEXT PRIMARY KEY,
    value         TEXT NOT NULL,
    updated_at_ms INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS budget_usage (
    id            INTEGER PRIMARY KEY CHECK (id = 1),
    daily_day     TEXT NOT NULL,
    daily_used    REAL NOT NULL,
    hourly_hour   TEXT NOT NULL,
    hourly_used   REAL NOT NULL,
    updated_at_ms INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS decision_logs (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    request_id            TEXT NOT NULL UNIQUE,
    context_json          TEXT NOT NULL,
    raw_action_json       TEXT NOT NULL,
    final_action_json     TEXT NOT NULL,
    gateway_decision_json TEXT NOT NULL,
    policy_version        TEXT NOT NULL,
    latency_ms            INTEGER NOT NULL,
    user_feedback         TEXT,
    created_at_ms         INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS focus_events (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    ts_ms        INTEGER NOT NULL,
    app_name     TEXT NOT NULL,
    bundle_id    TEXT,
    pid          INTEGER,
    window_title TEXT,
    duration_ms  INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS focus_state_snapshots (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    ts_ms          INTEGER NOT NULL,
    focus_state    TEXT NOT NULL,
    switch_count   INTEGER NOT NULL,
    no_progress_ms INTEGER NOT NULL,
    focus_minutes  REAL NOT NULL,
    app_name       TEXT,
    window_title   TEXT
);

CREATE TABLE IF NOT EXISTS profiles (
    key           TEXT PRIMARY KEY,
    value         TEXT NOT NULL,
    confidence    REAL DEFAULT 1.0,
    updated_at_ms INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS memory_events (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    event_type    TEXT NOT NULL,
    summary       TEXT NOT NULL,
    created_at_ms INTEGER NOT NULL,
    importance    REAL DEFAULT 0.5
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_decision_logs_request_id ON decision_logs (request_id);
CREATE INDEX IF NOT EXISTS idx_decision_logs_created_at_ms ON decision_logs (created_at_ms);
CREATE INDEX IF NOT EXISTS idx_focus_events_ts_ms ON focus_events (ts_ms);
CREATE INDEX IF NOT EXISTS idx_focus_state_snapshots_ts_ms ON focus_state_snapshots (ts_ms);
CREATE INDEX IF NOT EXISTS idx_memory_events_created ON memory_events (created_at_ms);
";

/// SQLite database wrapping all durable state.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `<data_dir>/nudgegate.db`, creating the
    /// schema if needed.
    ///
    /// # Errors
    /// Returns an error if the data directory or database cannot be
    /// opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let dir = crate::storage::data_dir()?;
        Ok(Self::open_at(&dir.join("nudgegate.db"))?)
    }

    /// Open the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (tests and ephemeral runs).
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory().map_err(|source| DatabaseError::OpenFailed {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, DatabaseError> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A poisoned lock only means another thread panicked mid-query;
        // the connection itself is still usable.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    // -- settings ---------------------------------------------------------

    pub fn get_setting(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let conn = self.lock();
        let value = conn
            .query_row(
                "SELECT value FROM user_settings WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn upsert_setting(&self, key: &str, value: &str, now_ms: i64) -> Result<(), DatabaseError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO user_settings (key, value, updated_at_ms) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at_ms = excluded.updated_at_ms",
            params![key, value, now_ms],
        )?;
        Ok(())
    }

    pub fn list_settings(&self) -> Result<Vec<SettingItem>, DatabaseError> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT key, value, updated_at_ms FROM user_settings ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok(SettingItem {
                key: row.get(0)?,
                value: row.get(1)?,
                updated_at_ms: row.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // -- budget usage -----------------------------------------------------

    pub fn budget_usage(&self) -> Result<Option<BudgetUsage>, DatabaseError> {
        let conn = self.lock();
        let usage = conn
            .query_row(
                "SELECT daily_day, daily_used, hourly_hour, hourly_used FROM budget_usage WHERE id = 1",
                [],
                |row| {
                    Ok(BudgetUsage {
                        daily_day: row.get(0)?,
                        daily_used: row.get(1)?,
                        hourly_hour: row.get(2)?,
                        hourly_used: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(usage)
    }

    pub fn set_budget_usage(&self, usage: &BudgetUsage, now_ms: i64) -> Result<(), DatabaseError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO budget_usage (id, daily_day, daily_used, hourly_hour, hourly_used, updated_at_ms)
             VALUES (1, ?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                daily_day = excluded.daily_day,
                daily_used = excluded.daily_used,
                hourly_hour = excluded.hourly_hour,
                hourly_used = excluded.hourly_used,
                updated_at_ms = excluded.updated_at_ms",
            params![
                usage.daily_day,
                usage.daily_used,
                usage.hourly_hour,
                usage.hourly_used,
                now_ms
            ],
        )?;
        Ok(())
    }

    // -- decision log -----------------------------------------------------

    pub fn insert_decision(&self, record: &DecisionRecord) -> Result<(), DatabaseError> {
        let context_json = serde_json::to_string(&record.context)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        let raw_json = serde_json::to_string(&record.raw_action)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        let final_json = serde_json::to_string(&record.final_action)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        let decision_json = serde_json::to_string(&record.decision)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let conn = self.lock();
        conn.execute(
            "INSERT INTO decision_logs
                (request_id, context_json, raw_action_json, final_action_json,
                 gateway_decision_json, policy_version, latency_ms, user_feedback, created_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.request_id,
                context_json,
                raw_json,
                final_json,
                decision_json,
                record.policy_version,
                record.latency_ms,
                record.user_feedback,
                record.created_at_ms,
            ],
        )?;
        Ok(())
    }

    pub fn decision_exists(&self, request_id: &str) -> Result<bool, DatabaseError> {
        let conn = self.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM decision_logs WHERE request_id = ?1 LIMIT 1",
                params![request_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Raw `(final_action_json, context_json)` for a recorded decision.
    /// Preference memory parses these itself so it can fall back to
    /// substring matching on malformed historical rows.
    pub fn decision_payloads(
        &self,
        request_id: &str,
    ) -> Result<Option<(String, String)>, DatabaseError> {
        let conn = self.lock();
        let payloads = conn
            .query_row(
                "SELECT final_action_json, context_json FROM decision_logs WHERE request_id = ?1",
                params![request_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        Ok(payloads)
    }

    pub fn record_feedback(&self, request_id: &str, feedback: &str) -> Result<(), DatabaseError> {
        let conn = self.lock();
        conn.execute(
            "UPDATE decision_logs SET user_feedback = ?1 WHERE request_id = ?2",
            params![feedback, request_id],
        )?;
        Ok(())
    }

    pub fn list_decisions(&self, limit: u32) -> Result<Vec<DecisionRecord>, DatabaseError> {
        let limit = if limit == 0 { 50 } else { limit };
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT request_id, context_json, raw_action_json, final_action_json,
                    gateway_decision_json, policy_version, latency_ms, user_feedback, created_at_ms
             FROM decision_logs ORDER BY created_at_ms DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, Option<String>>(7)?,
                row.get::<_, i64>(8)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (
                request_id,
                context_json,
                raw_json,
                final_json,
                decision_json,
                policy_version,
                latency_ms,
                user_feedback,
                created_at_ms,
            ) = row?;
            let decision = match serde_json::from_str(&decision_json) {
                Ok(decision) => decision,
                Err(err) => {
                    warn!(request_id = %request_id, error = %err, "skipping malformed decision row");
                    continue;
                }
            };
            records.push(DecisionRecord {
                request_id,
                context: serde_json::from_str(&context_json).unwrap_or_default(),
                raw_action: serde_json::from_str(&raw_json).unwrap_or_default(),
                final_action: serde_json::from_str(&final_json).unwrap_or_default(),
                decision,
                policy_version,
                latency_ms,
                created_at_ms,
                user_feedback,
            });
        }
        Ok(records)
    }

    // -- focus events -----------------------------------------------------

    pub fn insert_focus_event(&self, event: &FocusEvent) -> Result<i64, DatabaseError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO focus_events (ts_ms, app_name, bundle_id, pid, window_title, duration_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.ts_ms,
                event.app_name,
                event.bundle_id,
                event.pid,
                event.window_title,
                event.duration_ms,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update_focus_duration(&self, id: i64, duration_ms: i64) -> Result<(), DatabaseError> {
        let conn = self.lock();
        conn.execute(
            "UPDATE focus_events SET duration_ms = ?1 WHERE id = ?2",
            params![duration_ms, id],
        )?;
        Ok(())
    }

    pub fn update_focus_title(&self, id: i64, title: &str) -> Result<(), DatabaseError> {
        let conn = self.lock();
        conn.execute(
            "UPDATE focus_events SET window_title = ?1 WHERE id = ?2",
            params![title, id],
        )?;
        Ok(())
    }

    pub fn latest_focus_event(&self) -> Result<Option<FocusEvent>, DatabaseError> {
        let conn = self.lock();
        let event = conn
            .query_row(
                "SELECT id, ts_ms, app_name, COALESCE(bundle_id, ''), COALESCE(pid, 0),
                        COALESCE(window_title, ''), duration_ms
                 FROM focus_events ORDER BY ts_ms DESC, id DESC LIMIT 1",
                [],
                Self::focus_event_from_row,
            )
            .optional()?;
        Ok(event)
    }

    pub fn list_focus_events(&self, limit: u32) -> Result<Vec<FocusEvent>, DatabaseError> {
        let limit = if limit == 0 { 200 } else { limit };
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, ts_ms, app_name, COALESCE(bundle_id, ''), COALESCE(pid, 0),
                    COALESCE(window_title, ''), duration_ms
             FROM focus_events ORDER BY ts_ms DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], Self::focus_event_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn focus_event_from_row(row: &rusqlite::Row<'_>) -> Result<FocusEvent, rusqlite::Error> {
        Ok(FocusEvent {
            id: row.get(0)?,
            ts_ms: row.get(1)?,
            app_name: row.get(2)?,
            bundle_id: row.get(3)?,
            pid: row.get(4)?,
            window_title: row.get(5)?,
            duration_ms: row.get(6)?,
        })
    }

    /// Switch count and accumulated focus minutes over the trailing
    /// window, reconstructed from stored events. Open events are measured
    /// up to the next event's start, or `now_ms` for the last one.
    pub fn focus_metrics(&self, window_ms: i64, now_ms: i64) -> Result<FocusMetrics, DatabaseError> {
        let window_ms = if window_ms <= 0 {
            10 * 60 * 1000
        } else {
            window_ms
        };
        let since_ms = (now_ms - window_ms).max(0);

        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT ts_ms, duration_ms FROM focus_events WHERE ts_ms >= ?1 ORDER BY ts_ms ASC",
        )?;
        let rows = stmt.query_map(params![since_ms], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;
        let events = rows.collect::<Result<Vec<_>, _>>()?;

        let mut total_ms: i64 = 0;
        for (i, (ts_ms, duration_ms)) in events.iter().enumerate() {
            if *duration_ms > 0 {
                total_ms += duration_ms;
                continue;
            }
            let end = if i + 1 < events.len() {
                events[i + 1].0
            } else {
                now_ms
            };
            total_ms += (end - ts_ms).max(0);
        }

        let switch_count = events.len().saturating_sub(1) as u32;
        Ok(FocusMetrics {
            window_ms,
            switch_count,
            focus_minutes: total_ms as f64 / 60_000.0,
        })
    }

    // -- focus state snapshots --------------------------------------------

    pub fn insert_focus_state_snapshot(
        &self,
        snapshot: &FocusStateSnapshot,
    ) -> Result<(), DatabaseError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO focus_state_snapshots
                (ts_ms, focus_state, switch_count, no_progress_ms, focus_minutes, app_name, window_title)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                snapshot.ts_ms,
                snapshot.focus_state.as_str(),
                snapshot.switch_count,
                snapshot.no_progress_ms,
                snapshot.focus_minutes,
                snapshot.app_name,
                snapshot.window_title,
            ],
        )?;
        Ok(())
    }

    pub fn list_focus_state_snapshots(
        &self,
        limit: u32,
        since_ms: i64,
        until_ms: i64,
    ) -> Result<Vec<FocusStateSnapshot>, DatabaseError> {
        let limit = if limit == 0 { 200 } else { limit };
        let since_ms = since_ms.max(0);
        let until_ms = if until_ms <= 0 { i64::MAX } else { until_ms };

        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT ts_ms, focus_state, switch_count, no_progress_ms, focus_minutes,
                    COALESCE(app_name, ''), COALESCE(window_title, '')
             FROM focus_state_snapshots
             WHERE ts_ms >= ?1 AND ts_ms <= ?2
             ORDER BY ts_ms DESC, id DESC LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![since_ms, until_ms, limit], |row| {
            let state: String = row.get(1)?;
            Ok(FocusStateSnapshot {
                ts_ms: row.get(0)?,
                focus_state: match state.as_str() {
                    "NO_PROGRESS" => crate::model::FocusState::NoProgress,
                    "DISTRACTED" => crate::model::FocusState::Distracted,
                    "FOCUSED" => crate::model::FocusState::Focused,
                    _ => crate::model::FocusState::Light,
                },
                switch_count: row.get(2)?,
                no_progress_ms: row.get(3)?,
                focus_minutes: row.get(4)?,
                app_name: row.get(5)?,
                window_title: row.get(6)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // -- profiles & memory events -----------------------------------------

    pub fn upsert_profile(
        &self,
        key: &str,
        value: &str,
        confidence: f64,
        now_ms: i64,
    ) -> Result<(), DatabaseError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO profiles (key, value, confidence, updated_at_ms) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                confidence = excluded.confidence,
                updated_at_ms = excluded.updated_at_ms",
            params![key, value, confidence, now_ms],
        )?;
        Ok(())
    }

    pub fn list_profiles(&self) -> Result<Vec<Profile>, DatabaseError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT key, value, confidence, updated_at_ms FROM profiles ORDER BY updated_at_ms DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Profile {
                key: row.get(0)?,
                value: row.get(1)?,
                confidence: row.get(2)?,
                updated_at_ms: row.get(3)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn append_memory_event(
        &self,
        event_type: &str,
        summary: &str,
        importance: f64,
        now_ms: i64,
    ) -> Result<(), DatabaseError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO memory_events (event_type, summary, created_at_ms, importance)
             VALUES (?1, ?2, ?3, ?4)",
            params![event_type, summary, now_ms, importance],
        )?;
        Ok(())
    }

    pub fn list_memory_events(&self, limit: u32) -> Result<Vec<MemoryEvent>, DatabaseError> {
        let limit = if limit == 0 { 20 } else { limit };
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT event_type, summary, created_at_ms, importance
             FROM memory_events ORDER BY created_at_ms DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(MemoryEvent {
                event_type: row.get(0)?,
                summary: row.get(1)?,
                created_at_ms: row.get(2)?,
                importance: row.get(3)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Wipes profiles and memory events in one transaction: both tables
    /// empty afterwards, or neither.
    pub fn reset_memory(&self) -> Result<(), DatabaseError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM profiles", [])?;
        tx.execute("DELETE FROM memory_events", [])?;
        tx.commit()?;
        Ok(())
    }
}

impl SettingsStore for Database {
    fn get_setting(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        Database::get_setting(self, key)
    }

    fn budget_usage(&self) -> Result<Option<BudgetUsage>, DatabaseError> {
        Database::budget_usage(self)
    }

    fn set_budget_usage(&self, usage: &BudgetUsage) -> Result<(), DatabaseError> {
        Database::set_budget_usage(self, usage, chrono::Utc::now().timestamp_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, Context, FocusState, GatewayDecision};

    #[test]
    fn settings_roundtrip() {
        let db = Database::open_memory().unwrap();
        assert!(db.get_setting("cooldown_seconds").unwrap().is_none());
        db.upsert_setting("cooldown_seconds", "120", 1_000).unwrap();
        assert_eq!(
            db.get_setting("cooldown_seconds").unwrap().unwrap(),
            "120"
        );
        db.upsert_setting("cooldown_seconds", "60", 2_000).unwrap();
        assert_eq!(db.get_setting("cooldown_seconds").unwrap().unwrap(), "60");
        assert_eq!(db.list_settings().unwrap().len(), 1);
    }

    #[test]
    fn budget_usage_roundtrip() {
        let db = Database::open_memory().unwrap();
        assert!(db.budget_usage().unwrap().is_none());
        let usage = BudgetUsage {
            daily_used: 3.5,
            daily_day: "2026-08-07".into(),
            hourly_used: 1.5,
            hourly_hour: "2026-08-07-14".into(),
        };
        db.set_budget_usage(&usage, 1_000).unwrap();
        assert_eq!(db.budget_usage().unwrap().unwrap(), usage);
    }

    #[test]
    fn decision_insert_and_feedback() {
        let db = Database::open_memory().unwrap();
        let record = DecisionRecord {
            request_id: "req-1".into(),
            context: Context::default(),
            raw_action: Action::do_not_disturb("raw"),
            final_action: Action::do_not_disturb("final"),
            decision: GatewayDecision::allow(),
            policy_version: "policy_v0".into(),
            latency_ms: 12,
            created_at_ms: 1_000,
            user_feedback: None,
        };
        db.insert_decision(&record).unwrap();
        assert!(db.decision_exists("req-1").unwrap());
        assert!(!db.decision_exists("req-2").unwrap());

        db.record_feedback("req-1", "LIKE").unwrap();
        let listed = db.list_decisions(10).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].user_feedback.as_deref(), Some("LIKE"));

        let (final_json, _ctx_json) = db.decision_payloads("req-1").unwrap().unwrap();
        assert!(final_json.contains("DO_NOT_DISTURB"));
    }

    #[test]
    fn focus_event_lifecycle() {
        let db = Database::open_memory().unwrap();
        let id = db
            .insert_focus_event(&FocusEvent {
                ts_ms: 1_000,
                app_name: "Editor".into(),
                bundle_id: "com.editor".into(),
                pid: 42,
                window_title: "main.rs".into(),
                ..FocusEvent::default()
            })
            .unwrap();
        db.update_focus_title(id, "lib.rs").unwrap();
        db.update_focus_duration(id, 5_000).unwrap();

        let latest = db.latest_focus_event().unwrap().unwrap();
        assert_eq!(latest.id, id);
        assert_eq!(latest.window_title, "lib.rs");
        assert_eq!(latest.duration_ms, 5_000);
    }

    #[test]
    fn focus_metrics_counts_switches_and_minutes() {
        let db = Database::open_memory().unwrap();
        let base = 1_000_000;
        // Two closed events and one still open.
        for (ts, duration) in [(base, 60_000), (base + 60_000, 120_000), (base + 180_000, 0)] {
            db.insert_focus_event(&FocusEvent {
                ts_ms: ts,
                app_name: "App".into(),
                duration_ms: duration,
                ..FocusEvent::default()
            })
            .unwrap();
        }
        let now = base + 240_000;
        let metrics = db.focus_metrics(10 * 60 * 1000, now).unwrap();
        assert_eq!(metrics.switch_count, 2);
        // 60s + 120s closed, open one measured up to now (60s).
        assert!((metrics.focus_minutes - 4.0).abs() < 1e-9);
    }

    #[test]
    fn snapshot_listing_filters_by_range() {
        let db = Database::open_memory().unwrap();
        for ts in [1_000, 2_000, 3_000] {
            db.insert_focus_state_snapshot(&FocusStateSnapshot {
                ts_ms: ts,
                focus_state: FocusState::Light,
                switch_count: 0,
                no_progress_ms: 0,
                focus_minutes: 0.0,
                app_name: String::new(),
                window_title: String::new(),
            })
            .unwrap();
        }
        let snapshots = db.list_focus_state_snapshots(10, 1_500, 2_500).unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].ts_ms, 2_000);
    }

    #[test]
    fn profile_upsert_replaces() {
        let db = Database::open_memory().unwrap();
        db.upsert_profile("likes_breaks", "true", 0.6, 1_000).unwrap();
        db.upsert_profile("likes_breaks", "false", 0.7, 2_000).unwrap();
        let profiles = db.list_profiles().unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].value, "false");
        assert_eq!(profiles[0].updated_at_ms, 2_000);
    }

    #[test]
    fn reset_memory_clears_both_tables() {
        let db = Database::open_memory().unwrap();
        db.upsert_profile("k", "v", 0.5, 1_000).unwrap();
        db.append_memory_event("feedback", "something", 0.5, 1_000)
            .unwrap();
        db.reset_memory().unwrap();
        assert!(db.list_profiles().unwrap().is_empty());
        assert!(db.list_memory_events(10).unwrap().is_empty());
    }
}
