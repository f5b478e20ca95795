//! Builder patterns for creating test data programmatically.

#![allow(dead_code)]

use std::time::Duration;

use serde_json::{json, Value};

use mailbatch::coordinator::CoordinatorSettings;
use mailbatch::partition::MessageId;
use mailbatch::source::Lookback;

/// Builder for config JSON documents, starting from a minimal valid config.
pub struct ConfigJsonBuilder {
    value: Value,
}

impl ConfigJsonBuilder {
    pub fn new() -> Self {
        Self {
            value: json!({
                "version": "1.0",
                "source_name": "test-source",
                "imap": {
                    "host": "imap.example.com",
                    "username": "tester@example.com",
                    "auth": { "type": "password", "password_env_var": "MAILBATCH_TEST_PASSWORD" }
                },
                "output_directory": "/tmp/mailbatch-out"
            }),
        }
    }

    /// Sets a top-level field.
    pub fn set(mut self, key: &str, value: Value) -> Self {
        self.value[key] = value;
        self
    }

    /// Sets a field inside the `imap` object.
    pub fn imap(mut self, key: &str, value: Value) -> Self {
        self.value["imap"][key] = value;
        self
    }

    pub fn auth(mut self, auth: Value) -> Self {
        self.value["imap"]["auth"] = auth;
        self
    }

    pub fn remove(mut self, key: &str) -> Self {
        if let Some(map) = self.value.as_object_mut() {
            map.remove(key);
        }
        self
    }

    pub fn build(self) -> String {
        self.value.to_string()
    }
}

impl Default for ConfigJsonBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `CoordinatorSettings`.
pub struct SettingsBuilder {
    settings: CoordinatorSettings,
}

impl SettingsBuilder {
    pub fn new() -> Self {
        Self {
            settings: CoordinatorSettings {
                source_name: "test-source".to_string(),
                folder: "INBOX".to_string(),
                lookback: Lookback::All,
                page_size: 25,
                dispatch_retries: 0,
                retry_backoff: Duration::from_millis(1),
            },
        }
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.settings.page_size = page_size;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.settings.dispatch_retries = retries;
        self
    }

    pub fn folder(mut self, folder: &str) -> Self {
        self.settings.folder = folder.to_string();
        self
    }

    pub fn lookback(mut self, lookback: Lookback) -> Self {
        self.settings.lookback = lookback;
        self
    }

    pub fn build(self) -> CoordinatorSettings {
        self.settings
    }
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `lo..=hi` as a vector of UIDs.
pub fn uids(lo: MessageId, hi: MessageId) -> Vec<MessageId> {
    (lo..=hi).collect()
}

/// Window sizes of a plan, in page order.
pub fn sizes(plan: &mailbatch::PartitionPlan) -> Vec<usize> {
    plan.iter().map(|w| w.len()).collect()
}
