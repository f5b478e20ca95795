use thiserror::Error;

use crate::secrets::SecretError;

#[derive(Error, Debug)]
pub enum ImapError {
    #[error("Plain-text IMAP is not supported; enable use_tls")]
    TlsRequired,

    #[error("Cannot reach IMAP server {addr}: {reason}")]
    Connect { addr: String, reason: String },

    #[error("TLS handshake failed: {0}")]
    Tls(String),

    /// No credential could be resolved for the configured auth type.
    #[error("{what} unavailable: {source}")]
    Credentials {
        what: &'static str,
        #[source]
        source: SecretError,
    },

    #[error("Login rejected for '{username}': {reason}")]
    Login { username: String, reason: String },

    #[error("Not connected")]
    NotConnected,

    #[error("IMAP folder '{0}' not found")]
    FolderNotFound(String),

    /// EXAMINE succeeded but the server sent no UIDVALIDITY, so UIDs cannot be trusted.
    #[error("Server did not report UIDVALIDITY for '{0}'")]
    MissingUidValidity(String),

    /// A tagged command came back NO/BAD or the connection dropped mid-command.
    #[error("{command} failed: {message}")]
    Command {
        command: &'static str,
        message: String,
    },
}

impl ImapError {
    pub(crate) fn command(command: &'static str, err: impl std::fmt::Display) -> Self {
        ImapError::Command {
            command,
            message: err.to_string(),
        }
    }
}

impl From<async_native_tls::Error> for ImapError {
    fn from(err: async_native_tls::Error) -> Self {
        ImapError::Tls(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ImapError>;
