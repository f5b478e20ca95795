//! Mailbox identity shared by tracking, dispatch and workers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity under which UIDs are meaningful: a folder of a named source at one UIDVALIDITY.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxRef {
    pub source_name: String,
    pub folder: String,
    pub uidvalidity: u32,
}

impl MailboxRef {
    pub fn new(source_name: impl Into<String>, folder: impl Into<String>, uidvalidity: u32) -> Self {
        Self {
            source_name: source_name.into(),
            folder: folder.into(),
            uidvalidity,
        }
    }
}

impl fmt::Display for MailboxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} (UIDVALIDITY={})",
            self.source_name, self.folder, self.uidvalidity
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let mailbox = MailboxRef::new("work", "INBOX", 42);
        assert_eq!(mailbox.to_string(), "work/INBOX (UIDVALIDITY=42)");
    }
}
