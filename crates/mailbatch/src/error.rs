use std::path::PathBuf;
use thiserror::Error;

use crate::db::DatabaseError;
use crate::imap::ImapError;
use crate::partition::PartitionError;
use crate::secrets::SecretError;
use crate::source::SourceError;

#[derive(Error, Debug)]
pub enum MailbatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Partition error: {0}")]
    Partition(#[from] PartitionError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("Secret error: {0}")]
    Secret(#[from] SecretError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Failures while fetching and persisting one window.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IMAP error: {0}")]
    Imap(#[from] ImapError),

    #[error("Failed to store message '{path}': {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Tracking error: {0}")]
    Tracking(#[from] DatabaseError),

    #[error("UIDVALIDITY changed for '{folder}': queued under {expected}, server now reports {actual}")]
    UidValidityChanged {
        folder: String,
        expected: u32,
        actual: u32,
    },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Worker queue is full")]
    QueueFull,
}

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log level '{0}' (use one of: off, error, warn, info, debug, trace)")]
    InvalidLevel(String),

    #[error("Failed to bridge log records: {0}")]
    LogBridge(String),

    #[error("A global tracing subscriber is already installed: {0}")]
    AlreadyInstalled(String),
}

pub type Result<T> = std::result::Result<T, MailbatchError>;
