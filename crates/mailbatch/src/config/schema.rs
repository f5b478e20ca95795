use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::secrets::expand_home;
use crate::source::Lookback;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// Stable name under which processed UIDs are recorded.
    pub source_name: String,
    pub imap: ImapConfig,
    /// Only consider messages received in the last N days.
    #[serde(default)]
    pub lookback_days: Option<u32>,
    /// Only consider messages received on or after this date.
    #[serde(default)]
    pub since_date: Option<NaiveDate>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Seconds between ingestion cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    #[serde(default = "default_dispatch_retries")]
    pub dispatch_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Duplicate-tracking store. Falls back to `~/.mailbatch/data/mailbatch.db`.
    #[serde(default)]
    pub database_path: Option<String>,
    pub output_directory: String,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_page_size() -> usize {
    25
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_queue_capacity() -> usize {
    256
}

fn default_poll_interval() -> u64 {
    300
}

fn default_dispatch_retries() -> u32 {
    1
}

fn default_retry_backoff_ms() -> u64 {
    500
}

impl Config {
    pub fn lookback(&self) -> Lookback {
        match (self.since_date, self.lookback_days) {
            (Some(date), _) => Lookback::Since(date),
            (None, Some(days)) => Lookback::Days(days),
            (None, None) => Lookback::All,
        }
    }

    pub fn database_path(&self) -> Option<PathBuf> {
        match &self.database_path {
            Some(path) => Some(PathBuf::from(expand_home(path))),
            None => crate::db::default_database_path(),
        }
    }

    pub fn output_directory(&self) -> PathBuf {
        PathBuf::from(expand_home(&self.output_directory))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImapConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub use_tls: bool,
    pub username: String,
    #[serde(default)]
    pub auth: ImapAuthSettings,
    #[serde(default = "default_folder")]
    pub folder: String,
}

fn default_port() -> u16 {
    993
}

fn default_true() -> bool {
    true
}

fn default_folder() -> String {
    "INBOX".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImapAuthType {
    #[default]
    Password,
    OAuth2,
}

/// Credential sources. Each secret resolves from the direct value, then the
/// file, then the environment variable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImapAuthSettings {
    #[serde(rename = "type", default)]
    pub auth_type: ImapAuthType,
    #[serde(default)]
    pub password_env_var: Option<String>,
    #[serde(default)]
    pub password_insecure: Option<String>,
    #[serde(default)]
    pub password_file: Option<String>,
    /// Pre-issued XOAUTH2 bearer token.
    #[serde(default)]
    pub access_token_env_var: Option<String>,
    #[serde(default)]
    pub access_token_insecure: Option<String>,
    #[serde(default)]
    pub access_token_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
