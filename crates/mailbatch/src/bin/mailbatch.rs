//! `mailbatch [CONFIG_PATH]`
//!
//! Polls one IMAP folder, splits new UIDs into pages and hands them to a
//! local worker pool that stores each message as an `.eml` file.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{mpsc, Arc};

use log::{info, warn};
use tokio::sync::broadcast;

use mailbatch::config::{default_config_path, load_config};
use mailbatch::coordinator::{CoordinatorSettings, IngestionCoordinator};
use mailbatch::db::Database;
use mailbatch::error::{ConfigError, WorkerError};
use mailbatch::logging::init_logging;
use mailbatch::progress::WindowProgressBroadcaster;
use mailbatch::scheduler::SyncScheduler;
use mailbatch::sink::SinkProvider;
use mailbatch::source::ImapIdentifierSource;
use mailbatch::worker::{ImapFetchProcessor, TrackingProcessor, WindowProcessor, WindowWorkerPool};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("mailbatch: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> mailbatch::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(default_config_path)
        .ok_or_else(|| ConfigError::Validation {
            message: "cannot determine home directory; pass a config path".to_string(),
        })?;

    let config = load_config(&config_path)?;
    init_logging(&config.logging)?;

    info!(
        "Starting mailbatch v{} for source '{}' ({})",
        env!("CARGO_PKG_VERSION"),
        config.source_name,
        config_path.display()
    );

    let db = match config.database_path() {
        Some(path) => match Database::open(&path) {
            Ok(db) => Some(db),
            Err(e) => {
                warn!("Duplicate tracking disabled, database unavailable: {}", e);
                None
            }
        },
        None => None,
    };

    let fetch = ImapFetchProcessor::new(config.imap.clone(), config.output_directory());
    let processor: Arc<dyn WindowProcessor> = match &db {
        Some(db) => Arc::new(TrackingProcessor::new(fetch, db.clone())),
        None => Arc::new(fetch),
    };

    let progress = WindowProgressBroadcaster::default();
    let progress_log = progress
        .spawn_logger()
        .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

    let pool = Arc::new(WindowWorkerPool::new(
        processor,
        config.worker_count,
        config.queue_capacity,
        Arc::new(progress.clone()),
    )?);

    let drain_pool = Arc::clone(&pool);
    let drain = std::thread::Builder::new()
        .name("mailbatch-results".to_string())
        .spawn(move || {
            while let Some(result) = drain_pool.recv_result() {
                if result.success {
                    info!(
                        "Page {} of {}: stored {} messages",
                        result.page_index,
                        result.mailbox,
                        result.stored.len()
                    );
                } else {
                    warn!(
                        "Page {} of {} failed: {}",
                        result.page_index,
                        result.mailbox,
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
        })
        .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

    let coordinator = IngestionCoordinator::new(
        ImapIdentifierSource::new(config.imap.clone()),
        CoordinatorSettings::from_config(&config),
        db,
    )?;

    let scheduler = SyncScheduler::new(config.poll_interval());
    let (trigger_tx, trigger_rx) = broadcast::channel(16);
    let provider: Arc<dyn SinkProvider> = Arc::new(Arc::clone(&pool));
    let scheduler_handle = scheduler.start(coordinator, provider, trigger_rx)?;

    let (stop_tx, stop_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .map_err(|e| WorkerError::SpawnFailed(format!("failed to install Ctrl-C handler: {}", e)))?;

    let _ = stop_rx.recv();
    info!("Shutdown requested");

    scheduler.stop();
    let _ = trigger_tx.send(());
    if scheduler_handle.join().is_err() {
        warn!("Scheduler thread panicked");
    }

    pool.shutdown();
    if drain.join().is_err() {
        warn!("Result drain thread panicked");
    }

    let pool_released = match Arc::try_unwrap(pool) {
        Ok(pool) => {
            pool.wait();
            true
        }
        Err(_) => {
            warn!("Worker pool still referenced at shutdown");
            false
        }
    };

    // The logger only exits once the pool's reporter handle is gone too.
    drop(progress);
    if pool_released {
        match progress_log.join() {
            Ok(events) => info!("Logged {} page progress events", events),
            Err(_) => warn!("Progress log thread panicked"),
        }
    }

    info!("mailbatch stopped");
    Ok(())
}
