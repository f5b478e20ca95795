//! Dispatch run ledger, one row per coordinator cycle.

use rusqlite::{params, OptionalExtension};

use super::{Database, DatabaseError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRunRow {
    pub id: String,
    pub source_name: String,
    pub folder: String,
    pub uidvalidity: u32,
    pub total_windows: u32,
    pub dispatched_windows: u32,
    pub skipped_duplicate_windows: u32,
    pub failed_windows: u32,
    pub total_identifiers: u32,
    pub dispatched_identifiers: u32,
    pub started_at: String,
    pub finished_at: String,
}

pub fn insert(db: &Database, row: &DispatchRunRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO dispatch_runs (
                id, source_name, folder, uidvalidity, total_windows, dispatched_windows,
                skipped_duplicate_windows, failed_windows, total_identifiers,
                dispatched_identifiers, started_at, finished_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                row.id,
                row.source_name,
                row.folder,
                row.uidvalidity,
                row.total_windows,
                row.dispatched_windows,
                row.skipped_duplicate_windows,
                row.failed_windows,
                row.total_identifiers,
                row.dispatched_identifiers,
                row.started_at,
                row.finished_at,
            ],
        )?;
        Ok(())
    })
}

/// Returns the most recent run recorded for a source.
pub fn find_latest(db: &Database, source_name: &str) -> Result<Option<DispatchRunRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT id, source_name, folder, uidvalidity, total_windows, dispatched_windows,
                        skipped_duplicate_windows, failed_windows, total_identifiers,
                        dispatched_identifiers, started_at, finished_at
                 FROM dispatch_runs WHERE source_name = ?1
                 ORDER BY finished_at DESC LIMIT 1",
                params![source_name],
                |r| {
                    Ok(DispatchRunRow {
                        id: r.get(0)?,
                        source_name: r.get(1)?,
                        folder: r.get(2)?,
                        uidvalidity: r.get(3)?,
                        total_windows: r.get(4)?,
                        dispatched_windows: r.get(5)?,
                        skipped_duplicate_windows: r.get(6)?,
                        failed_windows: r.get(7)?,
                        total_identifiers: r.get(8)?,
                        dispatched_identifiers: r.get(9)?,
                        started_at: r.get(10)?,
                        finished_at: r.get(11)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    })
}

pub fn count_by_source(db: &Database, source_name: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM dispatch_runs WHERE source_name = ?1",
            params![source_name],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
