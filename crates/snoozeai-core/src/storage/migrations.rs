//! Database schema migrations for snoozeai.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 3;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }
    if current_version < 3 {
        migrate_v3(conn)?;
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

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!(error = %e, "failed to read schema_version, assuming 0");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: snoozed items and the settings key-value table.
///
/// `snooze_until` is stored as integer epoch seconds.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS snoozes (
            id           TEXT PRIMARY KEY,
            title        TEXT NOT NULL,
            body         TEXT NOT NULL,
            summary      TEXT NOT NULL DEFAULT '',
            urgency      REAL,
            snooze_until INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS kv (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_snoozes_snooze_until ON snoozes(snooze_until);",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: durable resurface tasks.
///
/// One row per item (`task_key` = `resurface:<item id>`). Re-scheduling
/// replaces the row and bumps `generation`.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS resurface_tasks (
            task_key     TEXT PRIMARY KEY,
            item_id      TEXT NOT NULL,
            payload      TEXT NOT NULL,
            fire_at      INTEGER NOT NULL,
            state        TEXT NOT NULL,
            generation   INTEGER NOT NULL DEFAULT 1,
            attempts     INTEGER NOT NULL DEFAULT 0,
            last_error   TEXT,
            updated_at   INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_resurface_state_fire_at ON resurface_tasks(state, fire_at);
        CREATE INDEX IF NOT EXISTS idx_resurface_item_id ON resurface_tasks(item_id);",
    )?;
    set_schema_version(&tx, 2)?;
    tx.commit()
}

/// Migration v3: explicit classification state.
///
/// Before v3 a NULL urgency meant both "not classified" and "classification
/// failed". Existing rows are backfilled from the urgency column.
fn migrate_v3(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    let has_column = tx.query_row(
        "SELECT COUNT(*) FROM pragma_table_info('snoozes') WHERE name = 'classification'",
        [],
        |row| row.get::<_, i32>(0),
    )? > 0;

    if !has_column {
        tx.execute_batch("ALTER TABLE snoozes ADD COLUMN classification TEXT;")?;
    }

    tx.execute(
        "UPDATE snoozes
         SET classification = CASE WHEN urgency IS NULL THEN 'unclassified' ELSE 'classified' END
         WHERE classification IS NULL",
        [],
    )?;

    set_schema_version(&tx, 3)?;
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_from_scratch() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);

        let tables: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('snoozes', 'kv', 'resurface_tasks')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }

    #[test]
    fn test_migrate_v1_database_backfills_classification() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema_version_table(&conn).unwrap();
        migrate_v1(&conn).unwrap();

        conn.execute(
            "INSERT INTO snoozes (id, title, body, summary, urgency, snooze_until)
             VALUES ('a', 't', 'b', 's', 0.8, 100), ('b', 't', 'b', 's', NULL, 200)",
            [],
        )
        .unwrap();

        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), 3);

        let a: String = conn
            .query_row("SELECT classification FROM snoozes WHERE id = 'a'", [], |r| r.get(0))
            .unwrap();
        let b: String = conn
            .query_row("SELECT classification FROM snoozes WHERE id = 'b'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(a, "classified");
        assert_eq!(b, "unclassified");
    }

    #[test]
    fn test_migrate_v3_reports_broken_snoozes_table() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema_version_table(&conn).unwrap();
        migrate_v1(&conn).unwrap();
        migrate_v2(&conn).unwrap();
        conn.execute_batch(
            "DROP TABLE snoozes;
             CREATE TABLE gone (x INTEGER);
             CREATE VIEW snoozes AS SELECT x FROM gone;
             DROP TABLE gone;",
        )
        .unwrap();

        assert!(migrate(&conn).is_err());
        assert_eq!(get_schema_version(&conn), 2);
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
    }
}
