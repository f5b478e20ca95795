//! Schema upgrades for the tracking store.
//!
//! Applied versions are recorded in `_migrations`. Each pending script runs
//! in its own transaction together with its bookkeeping row.

use rusqlite::Connection;

use super::error::DatabaseError;

/// A single migration definition.
struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// All migrations in order. Each is applied at most once.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_processed_messages_table",
        sql: "CREATE TABLE IF NOT EXISTS processed_messages (
                id TEXT PRIMARY KEY,
                source_name TEXT NOT NULL,
                folder TEXT NOT NULL,
                uidvalidity INTEGER NOT NULL,
                uid INTEGER NOT NULL,
                message_id TEXT,
                processed_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_processed_messages_source_validity
                ON processed_messages (source_name, folder, uidvalidity);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_processed_messages_unique
                ON processed_messages (source_name, folder, uidvalidity, uid);",
    },
    Migration {
        version: 2,
        description: "create_dispatch_runs_table",
        sql: "CREATE TABLE IF NOT EXISTS dispatch_runs (
                id TEXT PRIMARY KEY,
                source_name TEXT NOT NULL,
                folder TEXT NOT NULL,
                uidvalidity INTEGER NOT NULL,
                total_windows INTEGER NOT NULL,
                dispatched_windows INTEGER NOT NULL,
                skipped_duplicate_windows INTEGER NOT NULL,
                failed_windows INTEGER NOT NULL,
                total_identifiers INTEGER NOT NULL,
                dispatched_identifiers INTEGER NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_dispatch_runs_source
                ON dispatch_runs (source_name, finished_at);",
    },
];

/// Runs all pending migrations on the given connection.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let applied = current_version(conn)?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
        log::info!(
            "Applying schema v{}: {}",
            migration.version,
            migration.description
        );

        let script = format!(
            "BEGIN;\n{}\nINSERT INTO _migrations (version, description) VALUES ({}, '{}');\nCOMMIT;",
            migration.sql, migration.version, migration.description
        );

        if let Err(e) = conn.execute_batch(&script) {
            // Leave the connection usable if the script failed mid-transaction.
            let _ = conn.execute_batch("ROLLBACK;");
            return Err(DatabaseError::Migration {
                version: migration.version,
                reason: e.to_string(),
            });
        }
    }

    Ok(())
}

/// Highest applied version, 0 for a fresh store.
pub fn current_version(conn: &Connection) -> Result<u32, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?)
}
