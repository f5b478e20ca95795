//! Fetches a window's messages over IMAP and writes them as `.eml` files.

use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::config::ImapConfig;
use crate::error::ProcessError;
use crate::imap::ImapClient;
use crate::mailbox::MailboxRef;
use crate::partition::MessageId;

use super::job::WindowJob;
use super::processor::WindowProcessor;

/// Stores messages under `<output>/<source>/<folder>/<uidvalidity>/<uid>.eml`.
pub struct ImapFetchProcessor {
    imap: ImapConfig,
    output_directory: PathBuf,
}

impl ImapFetchProcessor {
    pub fn new<P: AsRef<Path>>(imap: ImapConfig, output_directory: P) -> Self {
        Self {
            imap,
            output_directory: output_directory.as_ref().to_path_buf(),
        }
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    async fn fetch(&self, client: &mut ImapClient, job: &WindowJob) -> Result<Vec<MessageId>, ProcessError> {
        client.connect().await?;
        let uidvalidity = client.examine_folder(&job.mailbox.folder).await?;
        if uidvalidity != job.mailbox.uidvalidity {
            return Err(ProcessError::UidValidityChanged {
                folder: job.mailbox.folder.clone(),
                expected: job.mailbox.uidvalidity,
                actual: uidvalidity,
            });
        }

        let messages = client.fetch_bodies(&job.window.to_uid_set()).await?;
        let dir = message_directory(&self.output_directory, &job.mailbox);

        let mut stored = Vec::with_capacity(messages.len());
        for (uid, body) in messages {
            if job.window.member_ids.binary_search(&uid).is_err() {
                warn!("Server returned UID {} outside page {}", uid, job.page_index());
                continue;
            }
            store_message(&dir, uid, &body, &job.id)?;
            stored.push(uid);
        }

        stored.sort_unstable();
        if stored.len() < job.window.len() {
            debug!(
                "Page {} of {}: {} of {} messages no longer on server",
                job.page_index(),
                job.mailbox,
                job.window.len() - stored.len(),
                job.window.len()
            );
        }
        Ok(stored)
    }
}

impl WindowProcessor for ImapFetchProcessor {
    fn process(&self, job: &WindowJob) -> Result<Vec<MessageId>, ProcessError> {
        if job.window.is_empty() {
            return Ok(Vec::new());
        }

        async_io::block_on(async {
            let mut client = ImapClient::new(self.imap.clone());
            let result = self.fetch(&mut client, job).await;
            if let Err(e) = client.disconnect().await {
                warn!("IMAP logout failed: {}", e);
            }
            result
        })
    }
}

/// Replaces anything that is unsafe as a single path component.
pub fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();

    match cleaned.trim() {
        "" | "." | ".." => "_".to_string(),
        trimmed => trimmed.to_string(),
    }
}

pub fn message_directory(output_directory: &Path, mailbox: &MailboxRef) -> PathBuf {
    output_directory
        .join(sanitize_component(&mailbox.source_name))
        .join(sanitize_component(&mailbox.folder))
        .join(mailbox.uidvalidity.to_string())
}

/// Writes to a job-scoped temp file and renames it into place, so a reader
/// never sees a partial message.
fn store_message(dir: &Path, uid: MessageId, body: &[u8], job_id: &str) -> Result<PathBuf, ProcessError> {
    std::fs::create_dir_all(dir).map_err(|e| ProcessError::Store {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let final_path = dir.join(format!("{}.eml", uid));
    let temp_path = dir.join(format!(".{}.eml.{}.tmp", uid, job_id));

    let write = || -> std::io::Result<()> {
        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(body)?;
        file.sync_all()?;
        std::fs::rename(&temp_path, &final_path)
    };

    write().map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        ProcessError::Store {
            path: final_path.clone(),
            source: e,
        }
    })?;

    debug!("Stored UID {} at {}", uid, final_path.display());
    Ok(final_path)
}
