//! Downstream queue that accepts pages of identifiers for fetching and persistence.
//!
//! The partitioner only needs [`QueueSink::enqueue`]. Acceptance means the
//! window is queued, not that it has been processed; implementations must be
//! idempotent for identifiers already recorded in durable storage.

pub mod channel;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mailbox::MailboxRef;
use crate::partition::BatchWindow;

pub use channel::ChannelSink;

/// Why a sink refused a window.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("Queue is full (page {page_index} not accepted)")]
    QueueFull { page_index: usize },

    #[error("Queue is closed")]
    Closed,

    #[error("Window rejected: {0}")]
    Rejected(String),
}

/// Proof that a window was accepted onto the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueReceipt {
    pub job_id: String,
    pub page_index: usize,
    pub accepted_at: DateTime<Utc>,
}

impl EnqueueReceipt {
    pub fn new(job_id: impl Into<String>, page_index: usize) -> Self {
        Self {
            job_id: job_id.into(),
            page_index,
            accepted_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait QueueSink: Send + Sync {
    /// Queues one window. Resolves once the window is accepted or refused.
    async fn enqueue(&self, window: BatchWindow) -> Result<EnqueueReceipt, SinkError>;
}

#[async_trait]
impl<T: QueueSink + ?Sized> QueueSink for Arc<T> {
    async fn enqueue(&self, window: BatchWindow) -> Result<EnqueueReceipt, SinkError> {
        (**self).enqueue(window).await
    }
}

#[async_trait]
impl<T: QueueSink + ?Sized> QueueSink for Box<T> {
    async fn enqueue(&self, window: BatchWindow) -> Result<EnqueueReceipt, SinkError> {
        (**self).enqueue(window).await
    }
}

/// Hands out a sink bound to the mailbox identity of the current cycle.
pub trait SinkProvider: Send + Sync {
    fn sink_for(&self, mailbox: &MailboxRef) -> Box<dyn QueueSink>;
}
