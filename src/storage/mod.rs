//! SQLite-backed decision log.
//!
//! Every resolved query is appended to a single `logs` table together with
//! its label and reason. The table is the source of truth for the `/stats`
//! endpoint and the `stats` CLI command; counters are always derived from
//! it rather than kept in memory, so restarts do not lose history.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::error::Result;
use crate::model::Label;

/// One persisted decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Row id, monotonically increasing with insertion order.
    pub id: i64,
    /// The query text, trimmed of surrounding whitespace.
    pub query: String,
    /// Verdict label, `safe` or `sqli`.
    pub status: String,
    /// Decision reason (`rule:<id>`, `ml`, or `model_error`).
    pub reason: Option<String>,
    /// Insertion time as recorded by SQLite (UTC).
    pub timestamp: String,
}

/// Aggregate counters over the whole log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Queries logged since the database was created.
    pub total: u64,
    /// Queries labelled safe.
    pub safe: u64,
    /// Queries labelled sqli.
    pub attacks: u64,
}

/// Append-only log of resolved queries.
///
/// The connection is serialized behind a mutex; SQLite handles durability.
pub struct QueryLog {
    conn: Mutex<Connection>,
}

impl QueryLog {
    /// Open (or create) the log database at `path`.
    ///
    /// Missing parent directories are created so a fresh deployment can
    /// point at `data/decisions.db` without preparing the tree first.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory log. Used by tests and ephemeral runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS logs (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                query     TEXT NOT NULL,
                status    TEXT NOT NULL,
                reason    TEXT,
                timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A poisoned lock still holds a usable connection.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append one decision to the log.
    pub fn append(&self, query: &str, status: Label, reason: Option<&str>) -> Result<()> {
        self.conn().execute(
            "INSERT INTO logs (query, status, reason) VALUES (?1, ?2, ?3)",
            params![query, status.as_str(), reason],
        )?;
        Ok(())
    }

    /// Aggregate counters, computed in one pass over the table.
    pub fn stats(&self) -> Result<StatsSnapshot> {
        let conn = self.conn();
        let (total, safe, attacks) = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN status = 'safe' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'sqli' THEN 1 ELSE 0 END), 0)
             FROM logs",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )?;
        Ok(StatsSnapshot {
            total: total as u64,
            safe: safe as u64,
            attacks: attacks as u64,
        })
    }

    /// The most recent `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, query, status, reason, timestamp
             FROM logs ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(LogEntry {
                id: row.get(0)?,
                query: row.get(1)?,
                status: row.get(2)?,
                reason: row.get(3)?,
                timestamp: row.get(4)?,
            })
        })?;
        let mut entries = Vec::new();
        for entry in rows {
            entries.push(entry?);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_on_empty_log() {
        let log = QueryLog::open_in_memory().unwrap();
        let stats = log.stats().unwrap();
        assert_eq!(
            stats,
            StatsSnapshot {
                total: 0,
                safe: 0,
                attacks: 0
            }
        );
    }

    #[test]
    fn test_counters_split_by_label() {
        let log = QueryLog::open_in_memory().unwrap();
        log.append("1 OR 1=1", Label::Sqli, Some("rule:or_tautology"))
            .unwrap();
        log.append("SELECT name FROM users", Label::Safe, Some("ml"))
            .unwrap();

        let stats = log.stats().unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.safe, 1);
        assert_eq!(stats.attacks, 1);
    }

    #[test]
    fn test_recent_returns_newest_first() {
        let log = QueryLog::open_in_memory().unwrap();
        log.append("first", Label::Safe, Some("ml")).unwrap();
        log.append("second", Label::Safe, Some("ml")).unwrap();
        log.append("third", Label::Sqli, Some("rule:union_select"))
            .unwrap();

        let entries = log.recent(2).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].query, "third");
        assert_eq!(entries[1].query, "second");
        assert!(entries[0].id > entries[1].id);
    }

    #[test]
    fn test_recent_limit_beyond_row_count() {
        let log = QueryLog::open_in_memory().unwrap();
        log.append("only", Label::Safe, Some("model_error")).unwrap();

        let entries = log.recent(50).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, "safe");
        assert_eq!(entries[0].reason.as_deref(), Some("model_error"));
        assert!(!entries[0].timestamp.is_empty());
    }

    #[test]
    fn test_reason_may_be_absent() {
        let log = QueryLog::open_in_memory().unwrap();
        log.append("unexplained", Label::Safe, None).unwrap();

        let entries = log.recent(1).unwrap();
        assert_eq!(entries[0].reason, None);
    }

    #[test]
    fn test_open_creates_parent_directories_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("decisions.db");

        {
            let log = QueryLog::open(&db_path).unwrap();
            log.append("persisted", Label::Sqli, Some("rule:drop_table"))
                .unwrap();
        }

        let log = QueryLog::open(&db_path).unwrap();
        let stats = log.stats().unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.attacks, 1);
    }
}
