//! Duplicate-safe submission of a partition plan to a queue sink.

use std::collections::HashSet;

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::sink::{EnqueueReceipt, QueueSink, SinkError};

use super::window::{BatchWindow, MessageId, PartitionPlan};

/// What happened to one window of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WindowOutcome {
    Dispatched {
        page_index: usize,
        identifiers: usize,
        receipt: EnqueueReceipt,
    },
    /// Every member was already processed; nothing was enqueued.
    SkippedDuplicate { page_index: usize },
    /// The sink refused the window; see the matching [`DispatchFailure`].
    Failed { page_index: usize },
}

impl WindowOutcome {
    pub fn page_index(&self) -> usize {
        match self {
            WindowOutcome::Dispatched { page_index, .. }
            | WindowOutcome::SkippedDuplicate { page_index }
            | WindowOutcome::Failed { page_index } => *page_index,
        }
    }
}

/// A window the sink refused, kept whole so the caller can retry it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchFailure {
    /// The reduced window that was offered to the sink.
    pub window: BatchWindow,
    pub cause: SinkError,
}

/// Counters and per-window outcomes of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub page_size: usize,
    pub total_windows: usize,
    pub dispatched_windows: usize,
    pub skipped_duplicate_windows: usize,
    pub total_identifiers: usize,
    pub dispatched_identifiers: usize,
    /// Identifiers dropped because they were already processed.
    pub skipped_identifiers: usize,
    /// Retry passes folded in with [`DispatchReport::absorb_retry`].
    pub retry_attempts: u32,
    /// One entry per window, in page order.
    pub outcomes: Vec<WindowOutcome>,
    pub failures: Vec<DispatchFailure>,
}

impl DispatchReport {
    fn new(plan: &PartitionPlan) -> Self {
        Self {
            page_size: plan.page_size(),
            total_windows: plan.num_pages(),
            dispatched_windows: 0,
            skipped_duplicate_windows: 0,
            total_identifiers: plan.total_identifiers(),
            dispatched_identifiers: 0,
            skipped_identifiers: 0,
            retry_attempts: 0,
            outcomes: Vec::with_capacity(plan.num_pages()),
            failures: Vec::new(),
        }
    }

    /// True when no window is left in a failed state.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_identifiers(&self) -> usize {
        self.failures.iter().map(|f| f.window.len()).sum()
    }

    /// Builds a plan of the failed windows, in page order, for a retry pass.
    pub fn failed_plan(&self) -> PartitionPlan {
        let mut windows: Vec<BatchWindow> =
            self.failures.iter().map(|f| f.window.clone()).collect();
        windows.sort_by_key(|w| w.page_index);
        let total = windows.iter().map(BatchWindow::len).sum();
        PartitionPlan::new(self.page_size, total, windows)
    }

    /// Folds the report of a retry pass (dispatched from [`Self::failed_plan`]) into this one.
    ///
    /// Windows that succeeded on retry replace their failed outcome; the
    /// failure list becomes whatever the retry still could not place.
    pub fn absorb_retry(&mut self, retry: DispatchReport) {
        for outcome in retry.outcomes {
            let page = outcome.page_index();
            if let Some(slot) = self.outcomes.iter_mut().find(|o| o.page_index() == page) {
                *slot = outcome;
            }
        }

        self.dispatched_windows += retry.dispatched_windows;
        self.dispatched_identifiers += retry.dispatched_identifiers;
        self.skipped_duplicate_windows += retry.skipped_duplicate_windows;
        self.skipped_identifiers += retry.skipped_identifiers;
        self.retry_attempts += 1 + retry.retry_attempts;
        self.failures = retry.failures;
    }
}

/// Submits every window of `plan` to `sink`, minus identifiers in `already_processed`.
///
/// Windows reduced to nothing are recorded as skipped. Every other window is
/// enqueued exactly once; all enqueue calls are awaited together and may
/// complete in any order. A refused window becomes a [`DispatchFailure`] and
/// does not affect the others.
pub async fn dispatch<S>(
    plan: &PartitionPlan,
    sink: &S,
    already_processed: &HashSet<MessageId>,
) -> DispatchReport
where
    S: QueueSink + ?Sized,
{
    let mut report = DispatchReport::new(plan);
    let mut pending: Vec<BatchWindow> = Vec::new();

    for window in plan {
        let reduced = if already_processed.is_empty() {
            window.clone()
        } else {
            window.retain_members(|id| !already_processed.contains(&id))
        };
        report.skipped_identifiers += window.len() - reduced.len();

        if reduced.is_empty() {
            debug!(
                page = window.page_index,
                "Skipping page: all members already processed"
            );
            report.skipped_duplicate_windows += 1;
            report.outcomes.push(WindowOutcome::SkippedDuplicate {
                page_index: window.page_index,
            });
            continue;
        }

        pending.push(reduced);
    }

    let results = join_all(pending.iter().map(|w| sink.enqueue(w.clone()))).await;

    for (window, result) in pending.into_iter().zip(results) {
        match result {
            Ok(receipt) => {
                debug!(
                    page = window.page_index,
                    job = %receipt.job_id,
                    members = window.len(),
                    "Page dispatched"
                );
                report.dispatched_windows += 1;
                report.dispatched_identifiers += window.len();
                report.outcomes.push(WindowOutcome::Dispatched {
                    page_index: window.page_index,
                    identifiers: window.len(),
                    receipt,
                });
            }
            Err(cause) => {
                warn!(page = window.page_index, "Page not dispatched: {}", cause);
                report.outcomes.push(WindowOutcome::Failed {
                    page_index: window.page_index,
                });
                report.failures.push(DispatchFailure { window, cause });
            }
        }
    }

    report.outcomes.sort_by_key(WindowOutcome::page_index);
    report
}
