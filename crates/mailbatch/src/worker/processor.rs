use log::debug;

use crate::db::Database;
use crate::error::ProcessError;
use crate::partition::MessageId;
use crate::tracker::ProcessedTracker;

use super::job::WindowJob;

/// Turns one queued window into durably persisted messages.
pub trait WindowProcessor: Send + Sync {
    /// Returns the identifiers that were durably handled. Identifiers that
    /// vanished from the server are left out rather than failing the window.
    fn process(&self, job: &WindowJob) -> Result<Vec<MessageId>, ProcessError>;
}

/// Wraps a processor with the duplicate-tracking store.
///
/// Members already recorded are dropped before the inner processor runs and
/// whatever it stores is recorded afterwards, so a window delivered twice
/// does no duplicate work.
pub struct TrackingProcessor<P> {
    inner: P,
    db: Database,
}

impl<P: WindowProcessor> TrackingProcessor<P> {
    pub fn new(inner: P, db: Database) -> Self {
        Self { inner, db }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: WindowProcessor> WindowProcessor for TrackingProcessor<P> {
    fn process(&self, job: &WindowJob) -> Result<Vec<MessageId>, ProcessError> {
        let tracker = ProcessedTracker::new(self.db.clone(), job.mailbox.clone());
        let pending = tracker.filter_unprocessed(&job.window.member_ids)?;

        if pending.is_empty() {
            debug!(
                "Page {} of {} already recorded, nothing to do",
                job.page_index(),
                job.mailbox
            );
            return Ok(Vec::new());
        }

        let reduced = WindowJob {
            window: job
                .window
                .retain_members(|id| pending.binary_search(&id).is_ok()),
            ..job.clone()
        };

        let stored = self.inner.process(&reduced)?;
        tracker.mark_all_processed(&stored)?;
        Ok(stored)
    }
}
