use std::path::{Path, PathBuf};

use crate::config::schema::{Config, ImapAuthType};
use crate::error::ConfigError;
use crate::secrets::has_secret_source;
use crate::source::MAX_LOOKBACK_DAYS;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

/// Returns `~/.mailbatch/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".mailbatch").join("config.json"))
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();

    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(invalid(format!(
            "Unsupported config version: {}",
            config.version
        )));
    }

    if config.source_name.trim().is_empty() {
        return Err(invalid("source_name must not be empty"));
    }
    if config.output_directory.trim().is_empty() {
        return Err(invalid("output_directory must not be empty"));
    }

    for (name, value) in [
        ("page_size", config.page_size),
        ("worker_count", config.worker_count),
        ("queue_capacity", config.queue_capacity),
    ] {
        if value == 0 {
            return Err(invalid(format!("{} must be greater than zero", name)));
        }
    }
    if config.poll_interval == 0 {
        return Err(invalid("poll_interval must be greater than zero"));
    }

    if config.lookback_days.is_some() && config.since_date.is_some() {
        return Err(invalid(
            "lookback_days and since_date are mutually exclusive",
        ));
    }
    if let Some(days) = config.lookback_days.filter(|d| *d > MAX_LOOKBACK_DAYS) {
        return Err(invalid(format!(
            "lookback_days must be at most {}, got {}",
            MAX_LOOKBACK_DAYS, days
        )));
    }

    if !config.imap.use_tls {
        return Err(invalid("imap.use_tls must be true; plain-text IMAP is not supported"));
    }

    let auth = &config.imap.auth;
    match auth.auth_type {
        ImapAuthType::Password => {
            if !has_secret_source(
                auth.password_insecure.as_deref(),
                auth.password_file.as_deref(),
                auth.password_env_var.as_deref(),
            ) {
                return Err(invalid(
                    "password auth needs one of password_insecure, password_file, or password_env_var",
                ));
            }
        }
        ImapAuthType::OAuth2 => {
            if !has_secret_source(
                auth.access_token_insecure.as_deref(),
                auth.access_token_file.as_deref(),
                auth.access_token_env_var.as_deref(),
            ) {
                return Err(invalid(
                    "oauth2 auth needs one of access_token_insecure, access_token_file, or access_token_env_var",
                ));
            }
        }
    }

    crate::logging::parse_level(&config.logging.level).map_err(|e| invalid(e.to_string()))?;

    Ok(())
}
