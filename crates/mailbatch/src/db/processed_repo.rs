//! CRUD operations for the `processed_messages` table.

use chrono::Utc;
use rusqlite::{params, params_from_iter, types::Value, OptionalExtension};

use super::{Database, DatabaseError};

/// Upper bound on UIDs bound into a single `IN (...)` query.
const LOOKUP_CHUNK: usize = 500;

/// A raw processed message row from the database.
#[derive(Debug, Clone)]
pub struct ProcessedMessageRow {
    pub id: String,
    pub source_name: String,
    pub folder: String,
    pub uidvalidity: u32,
    pub uid: u32,
    pub message_id: Option<String>,
    pub processed_at: String,
}

impl ProcessedMessageRow {
    /// Builds a row stamped with the current time.
    pub fn new(source_name: &str, folder: &str, uidvalidity: u32, uid: u32) -> Self {
        Self {
            id: make_id(source_name, folder, uidvalidity, uid),
            source_name: source_name.to_string(),
            folder: folder.to_string(),
            uidvalidity,
            uid,
            message_id: None,
            processed_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Creates a unique ID for a processed message.
pub fn make_id(source_name: &str, folder: &str, uidvalidity: u32, uid: u32) -> String {
    format!("{}:{}:{}:{}", source_name, folder, uidvalidity, uid)
}

const INSERT_SQL: &str = "INSERT OR IGNORE INTO processed_messages
     (id, source_name, folder, uidvalidity, uid, message_id, processed_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

/// Inserts a processed message record. Existing records are left untouched.
pub fn insert(db: &Database, row: &ProcessedMessageRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            INSERT_SQL,
            params![
                row.id,
                row.source_name,
                row.folder,
                row.uidvalidity,
                row.uid,
                row.message_id,
                row.processed_at,
            ],
        )?;
        Ok(())
    })
}

/// Inserts many records in one transaction. Returns the number of new rows.
pub fn insert_many(db: &Database, rows: &[ProcessedMessageRow]) -> Result<usize, DatabaseError> {
    if rows.is_empty() {
        return Ok(0);
    }

    db.with_conn(|conn| {
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(INSERT_SQL)?;
            for row in rows {
                inserted += stmt.execute(params![
                    row.id,
                    row.source_name,
                    row.folder,
                    row.uidvalidity,
                    row.uid,
                    row.message_id,
                    row.processed_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    })
}

/// Finds the last known UIDVALIDITY for a source folder (from the most recent record).
pub fn find_last_uidvalidity(
    db: &Database,
    source_name: &str,
    folder: &str,
) -> Result<Option<u32>, DatabaseError> {
    db.with_conn(|conn| {
        let value = conn
            .query_row(
                "SELECT uidvalidity FROM processed_messages
                 WHERE source_name = ?1 AND folder = ?2
                 ORDER BY processed_at DESC LIMIT 1",
                params![source_name, folder],
                |row| row.get::<_, u32>(0),
            )
            .optional()?;
        Ok(value)
    })
}

/// Finds the highest processed UID for a source folder and UIDVALIDITY.
pub fn find_last_uid(
    db: &Database,
    source_name: &str,
    folder: &str,
    uidvalidity: u32,
) -> Result<Option<u32>, DatabaseError> {
    db.with_conn(|conn| {
        let value = conn.query_row(
            "SELECT MAX(uid) FROM processed_messages
             WHERE source_name = ?1 AND folder = ?2 AND uidvalidity = ?3",
            params![source_name, folder, uidvalidity],
            |row| row.get::<_, Option<u32>>(0),
        )?;
        Ok(value)
    })
}

/// Returns all UIDs from `uids` that have already been processed.
///
/// All chunks are read under one lock, so the result is a consistent snapshot.
pub fn find_processed_uids(
    db: &Database,
    source_name: &str,
    folder: &str,
    uidvalidity: u32,
    uids: &[u32],
) -> Result<Vec<u32>, DatabaseError> {
    if uids.is_empty() {
        return Ok(Vec::new());
    }

    db.with_conn(|conn| {
        let mut found = Vec::new();

        for chunk in uids.chunks(LOOKUP_CHUNK) {
            let placeholders: Vec<String> =
                (0..chunk.len()).map(|i| format!("?{}", i + 4)).collect();
            let sql = format!(
                "SELECT uid FROM processed_messages
                 WHERE source_name = ?1 AND folder = ?2 AND uidvalidity = ?3 AND uid IN ({})",
                placeholders.join(", ")
            );

            let mut values: Vec<Value> = Vec::with_capacity(chunk.len() + 3);
            values.push(Value::Text(source_name.to_string()));
            values.push(Value::Text(folder.to_string()));
            values.push(Value::Integer(i64::from(uidvalidity)));
            values.extend(chunk.iter().map(|&uid| Value::Integer(i64::from(uid))));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), |row| row.get::<_, u32>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            found.extend(rows);
        }

        Ok(found)
    })
}

/// Deletes all records for a source folder whose UIDVALIDITY differs from `keep`.
/// Returns the number of rows deleted.
pub fn delete_stale_uidvalidity(
    db: &Database,
    source_name: &str,
    folder: &str,
    keep: u32,
) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count = conn.execute(
            "DELETE FROM processed_messages
             WHERE source_name = ?1 AND folder = ?2 AND uidvalidity != ?3",
            params![source_name, folder, keep],
        )?;
        Ok(count as u64)
    })
}

/// Counts total processed messages for a source.
pub fn count_by_source(db: &Database, source_name: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM processed_messages WHERE source_name = ?1",
            params![source_name],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Finds the timestamp of the last processed message for a source.
pub fn find_last_processed_at(
    db: &Database,
    source_name: &str,
) -> Result<Option<String>, DatabaseError> {
    db.with_conn(|conn| {
        let value = conn
            .query_row(
                "SELECT processed_at FROM processed_messages WHERE source_name = ?1
                 ORDER BY processed_at DESC LIMIT 1",
                params![source_name],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample(source: &str, uidvalidity: u32, uid: u32) -> ProcessedMessageRow {
        let mut row = ProcessedMessageRow::new(source, "INBOX", uidvalidity, uid);
        row.message_id = Some(format!("<msg-{}>", uid));
        row.processed_at = "2026-01-01T00:00:00Z".to_string();
        row
    }

    #[test]
    fn test_make_id() {
        assert_eq!(make_id("work", "INBOX", 100, 42), "work:INBOX:100:42");
    }

    #[test]
    fn test_insert_and_count() {
        let db = test_db();
        insert(&db, &sample("inbox", 100, 1)).unwrap();
        insert(&db, &sample("inbox", 100, 2)).unwrap();
        insert(&db, &sample("other", 200, 1)).unwrap();

        assert_eq!(count_by_source(&db, "inbox").unwrap(), 2);
        assert_eq!(count_by_source(&db, "other").unwrap(), 1);
        assert_eq!(count_by_source(&db, "missing").unwrap(), 0);
    }

    #[test]
    fn test_insert_duplicate_is_ignored() {
        let db = test_db();
        insert(&db, &sample("inbox", 100, 1)).unwrap();
        insert(&db, &sample("inbox", 100, 1)).unwrap();
        assert_eq!(count_by_source(&db, "inbox").unwrap(), 1);
    }

    #[test]
    fn test_insert_many_counts_new_rows() {
        let db = test_db();
        insert(&db, &sample("inbox", 100, 2)).unwrap();

        let rows: Vec<_> = (1..=4).map(|uid| sample("inbox", 100, uid)).collect();
        let inserted = insert_many(&db, &rows).unwrap();

        assert_eq!(inserted, 3);
        assert_eq!(count_by_source(&db, "inbox").unwrap(), 4);
        assert_eq!(insert_many(&db, &[]).unwrap(), 0);
    }

    #[test]
    fn test_find_last_uidvalidity() {
        let db = test_db();
        assert_eq!(find_last_uidvalidity(&db, "inbox", "INBOX").unwrap(), None);

        insert(&db, &sample("inbox", 100, 1)).unwrap();
        assert_eq!(
            find_last_uidvalidity(&db, "inbox", "INBOX").unwrap(),
            Some(100)
        );
        assert_eq!(find_last_uidvalidity(&db, "inbox", "Archive").unwrap(), None);
    }

    #[test]
    fn test_find_last_uid() {
        let db = test_db();
        insert(&db, &sample("inbox", 100, 5)).unwrap();
        insert(&db, &sample("inbox", 100, 10)).unwrap();
        insert(&db, &sample("inbox", 100, 3)).unwrap();

        assert_eq!(find_last_uid(&db, "inbox", "INBOX", 100).unwrap(), Some(10));
        assert_eq!(find_last_uid(&db, "inbox", "INBOX", 999).unwrap(), None);
    }

    #[test]
    fn test_find_processed_uids() {
        let db = test_db();
        insert(&db, &sample("inbox", 100, 1)).unwrap();
        insert(&db, &sample("inbox", 100, 3)).unwrap();
        insert(&db, &sample("inbox", 100, 5)).unwrap();
        insert(&db, &sample("inbox", 200, 2)).unwrap();

        let mut processed =
            find_processed_uids(&db, "inbox", "INBOX", 100, &[1, 2, 3, 4, 5]).unwrap();
        processed.sort();
        assert_eq!(processed, vec![1, 3, 5]);

        let empty = find_processed_uids(&db, "inbox", "INBOX", 100, &[]).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_find_processed_uids_across_chunks() {
        let db = test_db();
        let rows: Vec<_> = (1..=1200).step_by(2).map(|uid| sample("inbox", 7, uid)).collect();
        insert_many(&db, &rows).unwrap();

        let all: Vec<u32> = (1..=1200).collect();
        let processed = find_processed_uids(&db, "inbox", "INBOX", 7, &all).unwrap();
        assert_eq!(processed.len(), 600);
    }

    #[test]
    fn test_delete_stale_uidvalidity() {
        let db = test_db();
        insert(&db, &sample("inbox", 100, 1)).unwrap();
        insert(&db, &sample("inbox", 100, 2)).unwrap();
        insert(&db, &sample("inbox", 200, 1)).unwrap();

        let deleted = delete_stale_uidvalidity(&db, "inbox", "INBOX", 200).unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(count_by_source(&db, "inbox").unwrap(), 1);
    }

    #[test]
    fn test_find_last_processed_at() {
        let db = test_db();
        assert_eq!(find_last_processed_at(&db, "inbox").unwrap(), None);

        let mut first = sample("inbox", 100, 1);
        first.processed_at = "2026-01-01T00:00:00Z".to_string();
        insert(&db, &first).unwrap();

        let mut second = sample("inbox", 100, 2);
        second.processed_at = "2026-01-02T00:00:00Z".to_string();
        insert(&db, &second).unwrap();

        assert_eq!(
            find_last_processed_at(&db, "inbox").unwrap(),
            Some("2026-01-02T00:00:00Z".to_string())
        );
    }
}
