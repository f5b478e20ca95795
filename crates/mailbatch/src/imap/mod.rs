//! Minimal read-only IMAP access: examine a folder, search UIDs, peek bodies.

pub mod client;
pub mod error;

pub use client::ImapClient;
pub use error::ImapError;
