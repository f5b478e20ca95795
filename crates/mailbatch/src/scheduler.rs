//! Periodic ingestion cycles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::coordinator::IngestionCoordinator;
use crate::error::WorkerError;
use crate::sink::SinkProvider;
use crate::source::IdentifierSource;

/// Runs a coordinator every `interval` on its own thread, plus on demand.
pub struct SyncScheduler {
    interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl SyncScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Starts the loop in a background thread. The first cycle runs
    /// immediately; every message on `trigger_rx` runs an extra one.
    pub fn start<S>(
        &self,
        mut coordinator: IngestionCoordinator<S>,
        provider: Arc<dyn SinkProvider>,
        mut trigger_rx: broadcast::Receiver<()>,
    ) -> Result<JoinHandle<()>, WorkerError>
    where
        S: IdentifierSource + 'static,
    {
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.interval;

        log::info!(
            "Scheduling '{}' folder '{}' every {:?}",
            coordinator.settings().source_name,
            coordinator.settings().folder,
            interval
        );

        std::thread::Builder::new()
            .name("mailbatch-scheduler".to_string())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        log::error!("Failed to start scheduler runtime: {}", e);
                        return;
                    }
                };

                rt.block_on(async {
                    let mut interval_timer = tokio::time::interval(interval);
                    interval_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

                    loop {
                        tokio::select! {
                            _ = interval_timer.tick() => {},
                            Ok(()) = trigger_rx.recv() => {
                                log::info!("Manual ingestion cycle triggered");
                            },
                        }

                        if shutdown.load(Ordering::Acquire) {
                            break;
                        }

                        if let Err(e) = coordinator.run_cycle(provider.as_ref()).await {
                            log::error!("Ingestion cycle failed: {}", e);
                        }
                    }
                });

                log::debug!("Scheduler stopped");
            })
            .map_err(|e| WorkerError::SpawnFailed(e.to_string()))
    }

    /// Signals the loop to stop. Takes effect at the next tick or trigger.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}
