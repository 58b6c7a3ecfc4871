//! SQLite-based session storage.
//!
//! Provides persistent storage for:
//! - Session history (completed and abandoned runs)
//! - Key-value store for application state, including the last setup

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{data_dir, migrations};
use crate::error::{DatabaseError, Result};
use crate::history::{HistoryStore, SessionHistoryItem, SessionStatus};
use crate::timer::{CounterType, SessionConfig};

/// kv key holding the last submitted setup as JSON.
pub const SETUP_KEY: &str = "session-setup";

const HISTORY_COLUMNS: &str = "id, timestamp, status, name, steps, duration, sets, delay, \
                               counter_type, completed_sets, completed_steps";

/// SQLite database for session history and application state.
pub struct Database {
    conn: Connection,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data dir>/setrunner.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("setrunner.db");
        Self::open_path(&path)
    }

    /// Open (or create) the database at an explicit path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_path(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::from)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Get a value from the kv store.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .map_err(DatabaseError::from)?;
        Ok(value)
    }

    /// Set a value in the kv store.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(DatabaseError::from)?;
        Ok(())
    }

    /// The last setup saved with [`Database::save_setup`], if any.
    ///
    /// An unreadable stored value is logged and treated as absent.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn load_setup(&self) -> Result<Option<SessionConfig>> {
        let Some(raw) = self.kv_get(SETUP_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str::<SessionConfig>(&raw) {
            Ok(config) if config.validate().is_ok() => Ok(Some(config)),
            Ok(_) => {
                tracing::warn!("stored setup is out of range, ignoring it");
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(error = %e, "stored setup is unreadable, ignoring it");
                Ok(None)
            }
        }
    }

    /// Remember a setup for the next run.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub fn save_setup(&self, config: &SessionConfig) -> Result<()> {
        let json = serde_json::to_string(config)?;
        self.kv_set(SETUP_KEY, &json)
    }

    fn row_to_item(row: &Row<'_>) -> rusqlite::Result<(SessionHistoryItem, Option<String>)> {
        let timestamp: String = row.get(1)?;
        let status: String = row.get(2)?;
        let counter_type: String = row.get(8)?;

        let mut problems = Vec::new();
        let timestamp = DateTime::parse_from_rfc3339(&timestamp)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|e| {
                problems.push(format!("timestamp: {e}"));
                DateTime::<Utc>::default()
            });
        let status = status.parse::<SessionStatus>().unwrap_or_else(|e| {
            problems.push(e);
            SessionStatus::Incomplete
        });
        let counter_type = counter_type.parse::<CounterType>().unwrap_or_else(|e| {
            problems.push(e.to_string());
            CounterType::Up
        });

        let item = SessionHistoryItem {
            id: row.get(0)?,
            timestamp,
            status,
            name: row.get(3)?,
            steps: row.get(4)?,
            duration: row.get(5)?,
            sets: row.get(6)?,
            delay: row.get(7)?,
            counter_type,
            completed_sets: row.get(9)?,
            completed_steps: row.get(10)?,
        };
        let problem = (!problems.is_empty()).then(|| problems.join("; "));
        Ok((item, problem))
    }

    fn check_row(
        decoded: (SessionHistoryItem, Option<String>),
    ) -> std::result::Result<SessionHistoryItem, DatabaseError> {
        match decoded {
            (item, None) => Ok(item),
            (item, Some(message)) => Err(DatabaseError::CorruptRow {
                table: "history".into(),
                message: format!("{}: {message}", item.id),
            }),
        }
    }
}

impl HistoryStore for Database {
    fn prepend(&mut self, item: &SessionHistoryItem) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO history (id, timestamp, status, name, steps, duration, sets, delay,
                                      counter_type, completed_sets, completed_steps)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    item.id,
                    item.timestamp.to_rfc3339(),
                    item.status.as_str(),
                    item.name,
                    item.steps,
                    item.duration,
                    item.sets,
                    item.delay,
                    item.counter_type.to_string(),
                    item.completed_sets,
                    item.completed_steps,
                ],
            )
            .map_err(DatabaseError::from)?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<SessionHistoryItem>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {HISTORY_COLUMNS} FROM history ORDER BY seq DESC"
            ))
            .map_err(DatabaseError::from)?;
        let rows = stmt
            .query_map([], Self::row_to_item)
            .map_err(DatabaseError::from)?;

        let mut items = Vec::new();
        for row in rows {
            let decoded = row.map_err(DatabaseError::from)?;
            match Self::check_row(decoded) {
                Ok(item) => items.push(item),
                // One bad row should not hide the rest of the history.
                Err(e) => tracing::warn!(error = %e, "skipping history row"),
            }
        }
        Ok(items)
    }

    fn get(&self, id: &str) -> Result<Option<SessionHistoryItem>> {
        let decoded = self
            .conn
            .query_row(
                &format!("SELECT {HISTORY_COLUMNS} FROM history WHERE id = ?1"),
                params![id],
                Self::row_to_item,
            )
            .optional()
            .map_err(DatabaseError::from)?;
        match decoded {
            Some(decoded) => Ok(Some(Self::check_row(decoded)?)),
            None => Ok(None),
        }
    }

    fn clear(&mut self) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM history", [])
            .map_err(DatabaseError::from)?;
        tracing::info!(removed, "history cleared");
        Ok(removed)
    }
}
