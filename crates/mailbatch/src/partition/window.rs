//! Identifier sets, batch windows and partition plans.

use serde::{Deserialize, Serialize};

use super::error::PartitionError;

/// IMAP UID assigned by the server. Unique within a folder for one UIDVALIDITY.
pub type MessageId = u32;

/// Sorted, deduplicated identifiers visible in one folder for one lookback window.
///
/// A new set is built for every run; it is never mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<MessageId>")]
pub struct IdentifierSet(Vec<MessageId>);

impl IdentifierSet {
    /// Wraps identifiers that are already strictly ascending.
    ///
    /// Fails with `InvalidArgument` naming the first out-of-order position.
    pub fn from_sorted(ids: Vec<MessageId>) -> Result<Self, PartitionError> {
        ensure_strictly_ascending(&ids)?;
        Ok(Self(ids))
    }

    /// Sorts and deduplicates raw identifiers from a mailbox search.
    pub fn from_unsorted<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = MessageId>,
    {
        let mut ids: Vec<MessageId> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self(ids)
    }

    pub fn as_slice(&self) -> &[MessageId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<MessageId> {
        self.0
    }
}

impl TryFrom<Vec<MessageId>> for IdentifierSet {
    type Error = PartitionError;

    fn try_from(ids: Vec<MessageId>) -> Result<Self, Self::Error> {
        Self::from_sorted(ids)
    }
}

impl AsRef<[MessageId]> for IdentifierSet {
    fn as_ref(&self) -> &[MessageId] {
        &self.0
    }
}

/// Checks that `ids` is strictly ascending (sorted with no duplicates).
pub(crate) fn ensure_strictly_ascending(ids: &[MessageId]) -> Result<(), PartitionError> {
    if let Some(pos) = ids.windows(2).position(|pair| pair[0] >= pair[1]) {
        return Err(PartitionError::InvalidArgument {
            reason: format!(
                "identifiers must be strictly ascending: position {} holds {} after {}",
                pos + 1,
                ids[pos + 1],
                ids[pos]
            ),
        });
    }
    Ok(())
}

/// One page of a partition plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchWindow {
    /// 1-based page number.
    pub page_index: usize,
    /// Number of identifiers preceding this page in the set.
    pub skip_count: usize,
    /// Offset of the first member in the set (inclusive).
    pub start_offset: usize,
    /// Offset one past the last member in the set (exclusive).
    pub end_offset: usize,
    /// Members of the page, ascending.
    pub member_ids: Vec<MessageId>,
}

impl BatchWindow {
    pub fn len(&self) -> usize {
        self.member_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.member_ids.is_empty()
    }

    pub fn first_id(&self) -> Option<MessageId> {
        self.member_ids.first().copied()
    }

    pub fn last_id(&self) -> Option<MessageId> {
        self.member_ids.last().copied()
    }

    /// Returns a copy of this window keeping only members for which `keep` is true.
    ///
    /// Page index and offsets still describe the original slice.
    pub fn retain_members<F>(&self, mut keep: F) -> BatchWindow
    where
        F: FnMut(MessageId) -> bool,
    {
        BatchWindow {
            member_ids: self
                .member_ids
                .iter()
                .copied()
                .filter(|id| keep(*id))
                .collect(),
            ..self.clone()
        }
    }

    /// Renders the members as an IMAP sequence set, collapsing runs (`1:3,7,9:10`).
    pub fn to_uid_set(&self) -> String {
        let mut parts = Vec::new();
        let mut iter = self.member_ids.iter().copied().peekable();

        while let Some(start) = iter.next() {
            let mut end = start;
            while let Some(&next) = iter.peek() {
                if end.checked_add(1) == Some(next) {
                    end = next;
                    iter.next();
                } else {
                    break;
                }
            }
            if start == end {
                parts.push(start.to_string());
            } else {
                parts.push(format!("{}:{}", start, end));
            }
        }

        parts.join(",")
    }
}

/// Ordered windows covering one identifier set at one page size.
///
/// Only [`plan`](super::plan) builds one; it can be serialized for reporting
/// but not read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionPlan {
    page_size: usize,
    total_identifiers: usize,
    windows: Vec<BatchWindow>,
}

impl PartitionPlan {
    pub(crate) fn new(page_size: usize, total_identifiers: usize, windows: Vec<BatchWindow>) -> Self {
        Self {
            page_size,
            total_identifiers,
            windows,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of identifiers the plan covers.
    pub fn total_identifiers(&self) -> usize {
        self.total_identifiers
    }

    pub fn windows(&self) -> &[BatchWindow] {
        &self.windows
    }

    pub fn num_pages(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BatchWindow> {
        self.windows.iter()
    }

    /// Concatenates all members in page order.
    pub fn member_ids(&self) -> Vec<MessageId> {
        self.windows
            .iter()
            .flat_map(|w| w.member_ids.iter().copied())
            .collect()
    }
}

impl<'a> IntoIterator for &'a PartitionPlan {
    type Item = &'a BatchWindow;
    type IntoIter = std::slice::Iter<'a, BatchWindow>;

    fn into_iter(self) -> Self::IntoIter {
        self.windows.iter()
    }
}
