//! Database schema migrations.
//!
//! Migrations are versioned and applied automatically when the database is
//! opened. The `schema_version` table holds the version reached so far.

use indoc::indoc;
use rusqlite::{Connection, Result as SqliteResult};

/// Schema version reached after every migration has run.
pub const CURRENT_VERSION: i32 = 2;

/// Apply all pending migrations.
///
/// # Errors
/// Returns an error if a migration statement fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = schema_version(conn)?;
    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }
    if current_version < CURRENT_VERSION {
        tracing::info!(from = current_version, to = CURRENT_VERSION, "database migrated");
    }
    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> SqliteResult<i32> {
    match conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    }) {
        Ok(version) => Ok(version),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// v1: history and key-value tables.
///
/// `seq` orders history rows by insertion so "most recent first" does not
/// depend on clock resolution.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(indoc! {"
        CREATE TABLE IF NOT EXISTS history (
            seq             INTEGER PRIMARY KEY AUTOINCREMENT,
            id              TEXT NOT NULL UNIQUE,
            timestamp       TEXT NOT NULL,
            status          TEXT NOT NULL,
            name            TEXT NOT NULL DEFAULT '',
            steps           INTEGER NOT NULL,
            duration        INTEGER NOT NULL,
            sets            INTEGER NOT NULL,
            delay           INTEGER NOT NULL,
            counter_type    TEXT NOT NULL,
            completed_sets  INTEGER NOT NULL,
            completed_steps INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS kv (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
    "})?;
    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// v2: index for date-grouped listing.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(indoc! {"
        CREATE INDEX IF NOT EXISTS idx_history_timestamp ON history(timestamp);
    "})?;
    set_schema_version(&tx, 2)?;
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            == 1
    }

    #[test]
    fn test_migrate_from_scratch() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(
            {
                create_schema_version_table(&conn).unwrap();
                schema_version(&conn).unwrap()
            },
            0
        );
        migrate(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_VERSION);
        assert!(table_exists(&conn, "history"));
        assert!(table_exists(&conn, "kv"));
    }

    #[test]
    fn test_migrate_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn.execute("INSERT INTO kv (key, value) VALUES ('k', 'v')", [])
            .unwrap();
        migrate(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_VERSION);
        let value: String = conn
            .query_row("SELECT value FROM kv WHERE key = 'k'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(value, "v");
    }

    #[test]
    fn test_incremental_migration() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema_version_table(&conn).unwrap();
        migrate_v1(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 1);

        migrate(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 2);
        let indexes: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'idx_history_timestamp'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(indexes, 1);
    }
}
