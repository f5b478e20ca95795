//! Durable record of which UIDs have been fetched and persisted.

use std::collections::HashSet;

use log::{debug, info, warn};

use crate::db::{processed_repo, Database, DatabaseError};
use crate::mailbox::MailboxRef;
use crate::partition::MessageId;

/// Tracks processed UIDs for one mailbox identity.
#[derive(Clone)]
pub struct ProcessedTracker {
    db: Database,
    mailbox: MailboxRef,
}

impl ProcessedTracker {
    pub fn new(db: Database, mailbox: MailboxRef) -> Self {
        Self { db, mailbox }
    }

    pub fn mailbox(&self) -> &MailboxRef {
        &self.mailbox
    }

    /// Drops records made under a different UIDVALIDITY for this folder.
    ///
    /// A changed UIDVALIDITY means the folder was recreated and old UIDs no
    /// longer name the same messages. Returns the number of records removed.
    pub fn reconcile_uidvalidity(&self) -> Result<u64, DatabaseError> {
        let MailboxRef {
            source_name,
            folder,
            uidvalidity,
        } = &self.mailbox;

        let last = processed_repo::find_last_uidvalidity(&self.db, source_name, folder)?;
        match last {
            Some(last) if last != *uidvalidity => {
                warn!(
                    "UIDVALIDITY changed for '{}/{}': {} -> {}. Clearing tracking data.",
                    source_name, folder, last, uidvalidity
                );
                let deleted =
                    processed_repo::delete_stale_uidvalidity(&self.db, source_name, folder, *uidvalidity)?;
                info!(
                    "Cleared {} tracking records for '{}/{}'",
                    deleted, source_name, folder
                );
                Ok(deleted)
            }
            _ => Ok(0),
        }
    }

    /// Returns which of `ids` are already recorded, read as one snapshot.
    pub fn processed_snapshot(&self, ids: &[MessageId]) -> Result<HashSet<MessageId>, DatabaseError> {
        let processed = processed_repo::find_processed_uids(
            &self.db,
            &self.mailbox.source_name,
            &self.mailbox.folder,
            self.mailbox.uidvalidity,
            ids,
        )?;
        Ok(processed.into_iter().collect())
    }

    /// Filters `ids` down to those not yet recorded, keeping their order.
    pub fn filter_unprocessed(&self, ids: &[MessageId]) -> Result<Vec<MessageId>, DatabaseError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let processed = self.processed_snapshot(ids)?;
        let unprocessed: Vec<MessageId> = ids
            .iter()
            .copied()
            .filter(|id| !processed.contains(id))
            .collect();

        debug!(
            "Filtered {} UIDs, {} unprocessed",
            ids.len(),
            unprocessed.len()
        );

        Ok(unprocessed)
    }

    pub fn is_processed(&self, uid: MessageId) -> Result<bool, DatabaseError> {
        Ok(!self.processed_snapshot(&[uid])?.is_empty())
    }

    pub fn mark_processed(&self, uid: MessageId, message_id: Option<String>) -> Result<(), DatabaseError> {
        let mut row = processed_repo::ProcessedMessageRow::new(
            &self.mailbox.source_name,
            &self.mailbox.folder,
            self.mailbox.uidvalidity,
            uid,
        );
        row.message_id = message_id;

        processed_repo::insert(&self.db, &row)?;
        debug!("Marked UID {} as processed for {}", uid, self.mailbox);
        Ok(())
    }

    /// Records every UID in one transaction. Returns how many were new.
    pub fn mark_all_processed(&self, uids: &[MessageId]) -> Result<usize, DatabaseError> {
        let rows: Vec<_> = uids
            .iter()
            .map(|&uid| {
                processed_repo::ProcessedMessageRow::new(
                    &self.mailbox.source_name,
                    &self.mailbox.folder,
                    self.mailbox.uidvalidity,
                    uid,
                )
            })
            .collect();

        let inserted = processed_repo::insert_many(&self.db, &rows)?;
        debug!(
            "Marked {} UIDs as processed for {} ({} new)",
            uids.len(),
            self.mailbox,
            inserted
        );
        Ok(inserted)
    }

    /// Returns the highest recorded UID for the current UIDVALIDITY.
    pub fn last_processed_uid(&self) -> Result<Option<MessageId>, DatabaseError> {
        processed_repo::find_last_uid(
            &self.db,
            &self.mailbox.source_name,
            &self.mailbox.folder,
            self.mailbox.uidvalidity,
        )
    }

    pub fn stats(&self) -> Result<TrackerStats, DatabaseError> {
        let total_processed = processed_repo::count_by_source(&self.db, &self.mailbox.source_name)?;
        let last_processed_at =
            processed_repo::find_last_processed_at(&self.db, &self.mailbox.source_name)?;

        Ok(TrackerStats {
            source_name: self.mailbox.source_name.clone(),
            total_processed,
            last_processed_at,
            current_uidvalidity: self.mailbox.uidvalidity,
        })
    }
}

/// Statistics about processed messages for a source.
#[derive(Debug)]
pub struct TrackerStats {
    pub source_name: String,
    pub total_processed: u64,
    /// When the last message was processed (RFC 3339).
    pub last_processed_at: Option<String>,
    pub current_uidvalidity: u32,
}
