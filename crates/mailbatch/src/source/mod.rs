//! Where identifier sets come from.
//!
//! A source answers one question per cycle: which UIDs are visible in a
//! folder for a lookback window, and under which UIDVALIDITY. The result is
//! always normalised to an ascending, deduplicated [`IdentifierSet`].

pub mod imap;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeDelta};
use thiserror::Error;

use crate::imap::ImapError;
use crate::partition::IdentifierSet;

pub use self::imap::ImapIdentifierSource;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error(transparent)]
    Imap(#[from] ImapError),

    #[error("Identifier source unavailable: {0}")]
    Unavailable(String),

    #[error("Lookback of {days} days reaches before the earliest representable date")]
    LookbackOutOfRange { days: u32 },
}

/// Longest `lookback_days` accepted from configuration (about a century).
pub const MAX_LOOKBACK_DAYS: u32 = 36_500;

/// How far back a snapshot reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookback {
    All,
    /// Messages received in the last N days, counted from today.
    Days(u32),
    Since(NaiveDate),
}

impl Lookback {
    /// Renders the `UID SEARCH` criteria for this window.
    pub fn imap_criteria(&self, today: NaiveDate) -> Result<String, SourceError> {
        let criteria = match self {
            Lookback::All => "ALL".to_string(),
            Lookback::Days(days) => {
                let since = TimeDelta::try_days(i64::from(*days))
                    .and_then(|span| today.checked_sub_signed(span))
                    .ok_or(SourceError::LookbackOutOfRange { days: *days })?;
                format!("SINCE {}", imap_date(since))
            }
            Lookback::Since(date) => format!("SINCE {}", imap_date(*date)),
        };
        Ok(criteria)
    }
}

/// RFC 3501 `date` form, e.g. `05-Jan-2026`.
fn imap_date(date: NaiveDate) -> String {
    date.format("%d-%b-%Y").to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceQuery {
    pub folder: String,
    pub lookback: Lookback,
}

impl SourceQuery {
    pub fn new(folder: impl Into<String>, lookback: Lookback) -> Self {
        Self {
            folder: folder.into(),
            lookback,
        }
    }
}

/// Identifiers visible in one folder at one moment.
#[derive(Debug, Clone)]
pub struct MailboxSnapshot {
    pub folder: String,
    pub uidvalidity: u32,
    pub identifiers: IdentifierSet,
}

#[async_trait]
pub trait IdentifierSource: Send {
    async fn snapshot(&mut self, query: &SourceQuery) -> Result<MailboxSnapshot, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_criteria_all() {
        assert_eq!(Lookback::All.imap_criteria(day(2026, 3, 1)).unwrap(), "ALL");
    }

    #[test]
    fn test_criteria_days_crosses_year() {
        let criteria = Lookback::Days(10).imap_criteria(day(2026, 1, 5)).unwrap();
        assert_eq!(criteria, "SINCE 26-Dec-2025");
    }

    #[test]
    fn test_criteria_since_date() {
        let criteria = Lookback::Since(day(2024, 2, 29))
            .imap_criteria(day(2026, 3, 1))
            .unwrap();
        assert_eq!(criteria, "SINCE 29-Feb-2024");
    }

    #[test]
    fn test_zero_days_means_today() {
        assert_eq!(
            Lookback::Days(0).imap_criteria(day(2026, 7, 4)).unwrap(),
            "SINCE 04-Jul-2026"
        );
    }

    #[test]
    fn test_lookback_past_calendar_start_is_an_error() {
        let result = Lookback::Days(200_000_000).imap_criteria(day(2026, 10, 17));
        assert!(matches!(
            result,
            Err(SourceError::LookbackOutOfRange { days: 200_000_000 })
        ));
    }

    #[test]
    fn test_longest_configurable_lookback() {
        let criteria = Lookback::Days(MAX_LOOKBACK_DAYS)
            .imap_criteria(day(2026, 10, 17))
            .unwrap();
        assert!(criteria.starts_with("SINCE "));
    }
}
