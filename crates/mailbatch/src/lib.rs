pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod imap;
pub mod logging;
pub mod mailbox;
pub mod partition;
pub mod progress;
pub mod scheduler;
pub mod secrets;
pub mod sink;
pub mod source;
pub mod tracker;
pub mod worker;

pub use config::{load_config, Config};
pub use coordinator::{CoordinatorSettings, CycleReport, IngestionCoordinator};
pub use db::{Database, DatabaseError};
pub use error::{
    ConfigError, LoggingError, MailbatchError, ProcessError, Result, WorkerError,
};
pub use mailbox::MailboxRef;
pub use partition::{
    dispatch, plan, verify_no_overlap, BatchPartitioner, BatchWindow, DispatchFailure,
    DispatchReport, IdentifierSet, MessageId, PartitionError, PartitionPlan, WindowOutcome,
};
pub use progress::{ProgressReporter, WindowProgressBroadcaster};
pub use scheduler::SyncScheduler;
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use sink::{EnqueueReceipt, QueueSink, SinkError, SinkProvider};
pub use source::{IdentifierSource, Lookback, MailboxSnapshot, SourceError, SourceQuery};
pub use tracker::ProcessedTracker;
pub use worker::{ImapFetchProcessor, TrackingProcessor, WindowProcessor, WindowWorkerPool};
