//! One ingestion cycle: snapshot a folder, plan pages, dispatch what is new.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::Config;
use crate::db::{run_repo, Database};
use crate::error::Result;
use crate::mailbox::MailboxRef;
use crate::partition::{
    dispatch, verify_complete, verify_no_overlap, BatchPartitioner, DispatchReport, MessageId,
    PartitionError,
};
use crate::sink::SinkProvider;
use crate::source::{IdentifierSource, Lookback, SourceQuery};
use crate::tracker::ProcessedTracker;

/// What a coordinator needs from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub source_name: String,
    pub folder: String,
    pub lookback: Lookback,
    pub page_size: usize,
    /// Extra dispatch passes for windows the sink refused.
    pub dispatch_retries: u32,
    pub retry_backoff: Duration,
}

impl CoordinatorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            source_name: config.source_name.clone(),
            folder: config.imap.folder.clone(),
            lookback: config.lookback(),
            page_size: config.page_size,
            dispatch_retries: config.dispatch_retries,
            retry_backoff: config.retry_backoff(),
        }
    }
}

/// Outcome of one cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub run_id: String,
    pub mailbox: MailboxRef,
    /// Identifiers the source reported for the lookback window.
    pub identifiers_seen: usize,
    /// Records dropped because the folder's UIDVALIDITY changed.
    pub stale_records_cleared: u64,
    pub dispatch: DispatchReport,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub struct IngestionCoordinator<S> {
    source: S,
    settings: CoordinatorSettings,
    partitioner: BatchPartitioner,
    db: Option<Database>,
}

impl<S: IdentifierSource> IngestionCoordinator<S> {
    /// Without a database every window is dispatched on every cycle and
    /// duplicate suppression is left to the sink.
    pub fn new(
        source: S,
        settings: CoordinatorSettings,
        db: Option<Database>,
    ) -> std::result::Result<Self, PartitionError> {
        let partitioner = BatchPartitioner::new(settings.page_size)?;
        if db.is_none() {
            warn!(
                source = %settings.source_name,
                "No duplicate-tracking store configured; already-processed messages will be dispatched again"
            );
        }

        Ok(Self {
            source,
            settings,
            partitioner,
            db,
        })
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    /// Runs snapshot, UIDVALIDITY reconcile, plan, dispatch and retries once.
    pub async fn run_cycle(&mut self, provider: &dyn SinkProvider) -> Result<CycleReport> {
        let span = info_span!(
            "cycle",
            source = %self.settings.source_name,
            folder = %self.settings.folder
        );
        self.run_cycle_inner(provider).instrument(span).await
    }

    async fn run_cycle_inner(&mut self, provider: &dyn SinkProvider) -> Result<CycleReport> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        let query = SourceQuery::new(self.settings.folder.clone(), self.settings.lookback);
        let snapshot = self.source.snapshot(&query).await?;
        let mailbox = MailboxRef::new(
            self.settings.source_name.clone(),
            snapshot.folder.clone(),
            snapshot.uidvalidity,
        );
        let identifiers = snapshot.identifiers.as_slice();

        let (stale_records_cleared, already_processed) = match &self.db {
            Some(db) => {
                let tracker = ProcessedTracker::new(db.clone(), mailbox.clone());
                let cleared = tracker.reconcile_uidvalidity()?;
                (cleared, tracker.processed_snapshot(identifiers)?)
            }
            None => (0, HashSet::<MessageId>::new()),
        };

        let plan = self.partitioner.plan(identifiers)?;
        if !verify_no_overlap(&plan) || !verify_complete(&plan, identifiers) {
            error!(pages = plan.num_pages(), "Partition plan failed verification");
            return Err(PartitionError::InvalidArgument {
                reason: format!("plan for {} does not cover the identifier set exactly", mailbox),
            }
            .into());
        }

        debug!(
            identifiers = identifiers.len(),
            pages = plan.num_pages(),
            already_processed = already_processed.len(),
            "Planned cycle"
        );

        let sink = provider.sink_for(&mailbox);
        let mut report = dispatch(&plan, sink.as_ref(), &already_processed).await;

        let mut attempt = 0;
        while !report.is_complete() && attempt < self.settings.dispatch_retries {
            attempt += 1;
            warn!(
                attempt,
                failed = report.failures.len(),
                "Retrying refused pages after {:?}",
                self.settings.retry_backoff
            );
            tokio::time::sleep(self.settings.retry_backoff).await;

            let retry = dispatch(&report.failed_plan(), sink.as_ref(), &HashSet::new()).await;
            report.absorb_retry(retry);
        }

        let finished_at = Utc::now();
        let cycle = CycleReport {
            run_id,
            mailbox,
            identifiers_seen: identifiers.len(),
            stale_records_cleared,
            dispatch: report,
            started_at,
            finished_at,
        };

        if let Some(db) = &self.db {
            if let Err(e) = run_repo::insert(db, &run_row(&cycle)) {
                warn!("Failed to record dispatch run {}: {}", cycle.run_id, e);
            }
        }

        let dispatch = &cycle.dispatch;
        if dispatch.is_complete() {
            info!(
                uidvalidity = cycle.mailbox.uidvalidity,
                "Cycle finished: {} pages, {} dispatched ({} ids), {} skipped as duplicates ({} ids)",
                dispatch.total_windows,
                dispatch.dispatched_windows,
                dispatch.dispatched_identifiers,
                dispatch.skipped_duplicate_windows,
                dispatch.skipped_identifiers
            );
        } else {
            warn!(
                uidvalidity = cycle.mailbox.uidvalidity,
                "Cycle finished with {} of {} pages not dispatched ({} ids) after {} retries",
                dispatch.failures.len(),
                dispatch.total_windows,
                dispatch.failed_identifiers(),
                dispatch.retry_attempts
            );
        }

        Ok(cycle)
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn run_row(cycle: &CycleReport) -> run_repo::DispatchRunRow {
    let d = &cycle.dispatch;
    run_repo::DispatchRunRow {
        id: cycle.run_id.clone(),
        source_name: cycle.mailbox.source_name.clone(),
        folder: cycle.mailbox.folder.clone(),
        uidvalidity: cycle.mailbox.uidvalidity,
        total_windows: count(d.total_windows),
        dispatched_windows: count(d.dispatched_windows),
        skipped_duplicate_windows: count(d.skipped_duplicate_windows),
        failed_windows: count(d.failures.len()),
        total_identifiers: count(d.total_identifiers),
        dispatched_identifiers: count(d.dispatched_identifiers),
        started_at: cycle.started_at.to_rfc3339(),
        finished_at: cycle.finished_at.to_rfc3339(),
    }
}
