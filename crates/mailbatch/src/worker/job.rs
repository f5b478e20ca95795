use chrono::{DateTime, Utc};

use crate::mailbox::MailboxRef;
use crate::partition::{BatchWindow, MessageId};

/// A window waiting in the queue, tagged with the mailbox it belongs to.
#[derive(Debug, Clone)]
pub struct WindowJob {
    pub id: String,
    pub mailbox: MailboxRef,
    pub window: BatchWindow,
    pub enqueued_at: DateTime<Utc>,
}

impl WindowJob {
    pub fn new(mailbox: MailboxRef, window: BatchWindow) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            mailbox,
            window,
            enqueued_at: Utc::now(),
        }
    }

    pub fn page_index(&self) -> usize {
        self.window.page_index
    }
}

#[derive(Debug)]
pub struct WindowResult {
    pub job_id: String,
    pub mailbox: MailboxRef,
    pub page_index: usize,
    pub success: bool,
    /// Identifiers durably handled by this job.
    pub stored: Vec<MessageId>,
    pub error: Option<String>,
}

impl WindowResult {
    pub fn success(job: &WindowJob, stored: Vec<MessageId>) -> Self {
        Self {
            job_id: job.id.clone(),
            mailbox: job.mailbox.clone(),
            page_index: job.window.page_index,
            success: true,
            stored,
            error: None,
        }
    }

    pub fn failure(job: &WindowJob, error: String) -> Self {
        Self {
            job_id: job.id.clone(),
            mailbox: job.mailbox.clone(),
            page_index: job.window.page_index,
            success: false,
            stored: vec![],
            error: Some(error),
        }
    }
}
