//! IMAP client for connecting to email servers.

use async_imap::Session;
use async_native_tls::TlsConnector;
use futures_util::StreamExt;
use log::{debug, info, warn};
use secrecy::{ExposeSecret, SecretString};

use crate::config::{ImapAuthSettings, ImapAuthType, ImapConfig};
use crate::partition::MessageId;

use super::error::{ImapError, Result};

/// Type alias for the underlying async stream (using async-std compatible TcpStream).
type AsyncTcpStream = async_io::Async<std::net::TcpStream>;

/// Type alias for the TLS stream used by the IMAP session.
type TlsStream = async_native_tls::TlsStream<AsyncTcpStream>;

/// Single-shot authenticator for XOAUTH2.
struct XOAuth2Authenticator {
    response: String,
}

impl async_imap::Authenticator for XOAuth2Authenticator {
    type Response = String;

    fn process(&mut self, _data: &[u8]) -> Self::Response {
        std::mem::take(&mut self.response)
    }
}

/// Builds the raw SASL XOAUTH2 response. async-imap base64-encodes it on the wire.
fn xoauth2_response(username: &str, access_token: &str) -> String {
    format!("user={}\x01auth=Bearer {}\x01\x01", username, access_token)
}

/// Read-only IMAP session for one folder at a time.
pub struct ImapClient {
    session: Option<Session<TlsStream>>,
    config: ImapConfig,
    current_folder: Option<String>,
    current_uidvalidity: Option<u32>,
}

impl ImapClient {
    pub fn new(config: ImapConfig) -> Self {
        Self {
            session: None,
            config,
            current_folder: None,
            current_uidvalidity: None,
        }
    }

    /// Connects to the IMAP server and authenticates.
    pub async fn connect(&mut self) -> Result<()> {
        if self.session.is_some() {
            debug!("Already connected to IMAP server");
            return Ok(());
        }

        if !self.config.use_tls {
            return Err(ImapError::TlsRequired);
        }

        let addr = format!("{}:{}", self.config.host, self.config.port);
        info!("Connecting to IMAP server at {}", addr);

        let connect_error = |e: std::io::Error| ImapError::Connect {
            addr: addr.clone(),
            reason: e.to_string(),
        };
        let std_stream = std::net::TcpStream::connect(&addr).map_err(connect_error)?;
        std_stream.set_nonblocking(true).map_err(connect_error)?;
        let tcp_stream = async_io::Async::new(std_stream).map_err(connect_error)?;

        let tls = TlsConnector::new();
        let tls_stream = tls.connect(&self.config.host, tcp_stream).await?;

        let client = async_imap::Client::new(tls_stream);

        let session = match self.config.auth.auth_type {
            ImapAuthType::Password => self.authenticate_password(client).await?,
            ImapAuthType::OAuth2 => self.authenticate_oauth2(client).await?,
        };

        info!("Authenticated to {} as {}", self.config.host, self.config.username);
        self.session = Some(session);
        Ok(())
    }

    async fn authenticate_password(
        &self,
        client: async_imap::Client<TlsStream>,
    ) -> Result<Session<TlsStream>> {
        let password = resolve_password(&self.config.auth)?;

        client
            .login(&self.config.username, password.expose_secret())
            .await
            .map_err(|(e, _)| self.login_error(e))
    }

    async fn authenticate_oauth2(
        &self,
        client: async_imap::Client<TlsStream>,
    ) -> Result<Session<TlsStream>> {
        let access_token = resolve_access_token(&self.config.auth)?;
        let response = xoauth2_response(&self.config.username, access_token.expose_secret());

        client
            .authenticate("XOAUTH2", XOAuth2Authenticator { response })
            .await
            .map_err(|(e, _)| self.login_error(e))
    }

    fn login_error(&self, err: async_imap::error::Error) -> ImapError {
        ImapError::Login {
            username: self.config.username.clone(),
            reason: err.to_string(),
        }
    }

    fn session(&mut self) -> Result<&mut Session<TlsStream>> {
        self.session
            .as_mut()
            .ok_or(ImapError::NotConnected)
    }

    /// Opens a folder with EXAMINE so nothing is modified or marked read.
    /// Returns the folder's UIDVALIDITY.
    pub async fn examine_folder(&mut self, folder: &str) -> Result<u32> {
        let session = self.session()?;

        debug!("Examining folder: {}", folder);

        let mailbox = session.examine(folder).await.map_err(|e| {
            let message = e.to_string();
            if message.contains("doesn't exist") || message.contains("NO") {
                ImapError::FolderNotFound(folder.to_string())
            } else {
                ImapError::Command {
                    command: "EXAMINE",
                    message,
                }
            }
        })?;

        let uidvalidity = mailbox
            .uid_validity
            .ok_or_else(|| ImapError::MissingUidValidity(folder.to_string()))?;

        self.current_folder = Some(folder.to_string());
        self.current_uidvalidity = Some(uidvalidity);

        debug!("Folder '{}' opened with UIDVALIDITY={}", folder, uidvalidity);
        Ok(uidvalidity)
    }

    pub fn uidvalidity(&self) -> Option<u32> {
        self.current_uidvalidity
    }

    pub fn current_folder(&self) -> Option<&str> {
        self.current_folder.as_deref()
    }

    /// Runs `UID SEARCH` with the given criteria. Order of the result is unspecified.
    pub async fn uid_search(&mut self, criteria: &str) -> Result<Vec<MessageId>> {
        let session = self.session()?;

        debug!("Searching with query: {}", criteria);

        let uids = session
            .uid_search(criteria)
            .await
            .map_err(|e| ImapError::command("UID SEARCH", e))?;

        let uid_list: Vec<MessageId> = uids.into_iter().collect();
        debug!("Found {} messages matching '{}'", uid_list.len(), criteria);
        Ok(uid_list)
    }

    /// Fetches full message bodies with `BODY.PEEK[]` for a UID set such as `1:5,9`.
    ///
    /// Messages the server drops between search and fetch are simply absent
    /// from the result.
    pub async fn fetch_bodies(&mut self, uid_set: &str) -> Result<Vec<(MessageId, Vec<u8>)>> {
        if uid_set.is_empty() {
            return Ok(Vec::new());
        }

        let session = self.session()?;

        debug!("Fetching bodies for UIDs {}", uid_set);

        let mut messages = session
            .uid_fetch(uid_set, "(UID BODY.PEEK[])")
            .await
            .map_err(|e| ImapError::command("UID FETCH", e))?;

        let mut results = Vec::new();
        while let Some(message_result) = messages.next().await {
            let message = message_result.map_err(|e| ImapError::command("UID FETCH", e))?;
            match (message.uid, message.body()) {
                (Some(uid), Some(body)) => results.push((uid, body.to_vec())),
                _ => warn!("Fetched message missing UID or body"),
            }
        }

        debug!("Fetched {} messages", results.len());
        Ok(results)
    }

    /// Logs out gracefully.
    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(mut session) = self.session.take() {
            debug!("Disconnecting from IMAP server");
            session
                .logout()
                .await
                .map_err(|e| ImapError::command("LOGOUT", e))?;
        }
        self.current_folder = None;
        self.current_uidvalidity = None;
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }
}

impl Drop for ImapClient {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!("ImapClient dropped without explicit disconnect - session will be closed");
        }
    }
}

fn resolve_password(auth: &ImapAuthSettings) -> Result<SecretString> {
    if auth.password_insecure.is_some() {
        warn!(
            "Using direct password value (password_insecure) is not recommended. \
             Consider using password_env_var or password_file instead."
        );
    }
    crate::secrets::resolve_secret(
        auth.password_insecure.as_deref(),
        auth.password_file.as_deref(),
        auth.password_env_var.as_deref(),
    )
    .map_err(|source| ImapError::Credentials {
        what: "IMAP password",
        source,
    })
}

fn resolve_access_token(auth: &ImapAuthSettings) -> Result<SecretString> {
    crate::secrets::resolve_secret(
        auth.access_token_insecure.as_deref(),
        auth.access_token_file.as_deref(),
        auth.access_token_env_var.as_deref(),
    )
    .map_err(|source| ImapError::Credentials {
        what: "OAuth2 access token",
        source,
    })
}
