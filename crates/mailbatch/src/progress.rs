//! Window lifecycle events for real-time status streaming.

use std::sync::Arc;
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::worker::{WindowJob, WindowResult};

/// Phase of window processing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WindowPhase {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for WindowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowPhase::Queued => write!(f, "Queued"),
            WindowPhase::Processing => write!(f, "Processing"),
            WindowPhase::Completed => write!(f, "Completed"),
            WindowPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Progress event for one queued window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowProgressEvent {
    pub job_id: String,
    pub source_name: String,
    pub folder: String,
    pub page_index: usize,
    pub phase: WindowPhase,
    pub timestamp: DateTime<Utc>,
    /// Members in the window when it was queued.
    pub members: usize,
    /// Identifiers stored (set on completion).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored: Option<usize>,
    /// Error message (set on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WindowProgressEvent {
    pub fn new(job: &WindowJob, phase: WindowPhase) -> Self {
        Self {
            job_id: job.id.clone(),
            source_name: job.mailbox.source_name.clone(),
            folder: job.mailbox.folder.clone(),
            page_index: job.window.page_index,
            phase,
            timestamp: Utc::now(),
            members: job.window.len(),
            stored: None,
            error: None,
        }
    }

    /// Builds the terminal event for a finished job.
    pub fn finished(job: &WindowJob, result: &WindowResult) -> Self {
        if result.success {
            Self {
                stored: Some(result.stored.len()),
                ..Self::new(job, WindowPhase::Completed)
            }
        } else {
            Self {
                error: result.error.clone(),
                ..Self::new(job, WindowPhase::Failed)
            }
        }
    }
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: WindowProgressEvent);
}

/// No-op reporter for unit tests and headless runs.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: WindowProgressEvent) {}
}

/// Fans progress events out to any number of subscribers.
#[derive(Clone)]
pub struct WindowProgressBroadcaster {
    sender: Arc<broadcast::Sender<WindowProgressEvent>>,
}

impl WindowProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WindowProgressEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Subscribes a thread that writes every event to the debug log.
    ///
    /// The thread exits once every clone of the broadcaster is dropped and
    /// returns the number of events it logged.
    pub fn spawn_logger(&self) -> std::io::Result<JoinHandle<u64>> {
        let mut receiver = self.subscribe();
        std::thread::Builder::new()
            .name("mailbatch-progress".to_string())
            .spawn(move || {
                let mut logged = 0;
                loop {
                    match receiver.blocking_recv() {
                        Ok(event) => {
                            tracing::debug!(
                                job_id = %event.job_id,
                                source = %event.source_name,
                                folder = %event.folder,
                                page = event.page_index,
                                members = event.members,
                                stored = ?event.stored,
                                error = ?event.error,
                                "Page {}",
                                event.phase
                            );
                            logged += 1;
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            tracing::debug!(missed, "Progress log fell behind");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                logged
            })
    }
}

impl Default for WindowProgressBroadcaster {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl ProgressReporter for WindowProgressBroadcaster {
    fn report(&self, event: WindowProgressEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }
}
