use async_trait::async_trait;
use chrono::Utc;
use log::{info, warn};

use crate::config::ImapConfig;
use crate::imap::ImapClient;
use crate::partition::IdentifierSet;

use super::{IdentifierSource, MailboxSnapshot, SourceError, SourceQuery};

/// Snapshots a folder over a fresh read-only IMAP session per call.
pub struct ImapIdentifierSource {
    config: ImapConfig,
}

impl ImapIdentifierSource {
    pub fn new(config: ImapConfig) -> Self {
        Self { config }
    }

    async fn search(
        client: &mut ImapClient,
        query: &SourceQuery,
    ) -> Result<MailboxSnapshot, SourceError> {
        let criteria = query.lookback.imap_criteria(Utc::now().date_naive())?;

        client.connect().await?;
        let uidvalidity = client.examine_folder(&query.folder).await?;

        let uids = client.uid_search(&criteria).await?;
        let identifiers = IdentifierSet::from_unsorted(uids);

        info!(
            "Folder '{}' (UIDVALIDITY={}) has {} messages matching '{}'",
            query.folder,
            uidvalidity,
            identifiers.len(),
            criteria
        );

        Ok(MailboxSnapshot {
            folder: query.folder.clone(),
            uidvalidity,
            identifiers,
        })
    }
}

#[async_trait]
impl IdentifierSource for ImapIdentifierSource {
    async fn snapshot(&mut self, query: &SourceQuery) -> Result<MailboxSnapshot, SourceError> {
        let mut client = ImapClient::new(self.config.clone());
        let result = Self::search(&mut client, query).await;

        if let Err(e) = client.disconnect().await {
            warn!("IMAP logout failed: {}", e);
        }

        result
    }
}
