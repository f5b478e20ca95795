//! Splits an identifier set into fixed-size, non-overlapping pages.

use log::debug;

use super::error::PartitionError;
use super::window::{ensure_strictly_ascending, BatchWindow, MessageId, PartitionPlan};

/// Stateless planner bound to a page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPartitioner {
    page_size: usize,
}

impl BatchPartitioner {
    /// Creates a partitioner. A zero page size is rejected.
    pub fn new(page_size: usize) -> Result<Self, PartitionError> {
        if page_size == 0 {
            return Err(PartitionError::InvalidArgument {
                reason: "page size must be greater than zero".to_string(),
            });
        }
        Ok(Self { page_size })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Builds the partition plan for `identifiers`.
    ///
    /// `identifiers` must be strictly ascending; the remote source owns the
    /// ordering, so nothing is sorted or deduplicated here. Empty input gives
    /// an empty plan.
    pub fn plan(&self, identifiers: &[MessageId]) -> Result<PartitionPlan, PartitionError> {
        ensure_strictly_ascending(identifiers)?;

        let total = identifiers.len();
        let windows: Vec<BatchWindow> = identifiers
            .chunks(self.page_size)
            .enumerate()
            .map(|(i, members)| {
                let start_offset = i * self.page_size;
                BatchWindow {
                    page_index: i + 1,
                    skip_count: start_offset,
                    start_offset,
                    end_offset: start_offset + members.len(),
                    member_ids: members.to_vec(),
                }
            })
            .collect();

        debug!(
            "Planned {} identifiers into {} pages of up to {}",
            total,
            windows.len(),
            self.page_size
        );

        Ok(PartitionPlan::new(self.page_size, total, windows))
    }
}

/// Plans `identifiers` into pages of `page_size`.
pub fn plan(identifiers: &[MessageId], page_size: usize) -> Result<PartitionPlan, PartitionError> {
    BatchPartitioner::new(page_size)?.plan(identifiers)
}

/// Returns the number of pages `total` identifiers produce at `page_size`.
pub fn page_count(total: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size)
}

/// True when every non-empty window starts above the previous non-empty window's end.
pub fn verify_no_overlap(plan: &PartitionPlan) -> bool {
    let mut previous_max: Option<MessageId> = None;

    for window in plan.iter().filter(|w| !w.is_empty()) {
        let (Some(min), Some(max)) = (window.first_id(), window.last_id()) else {
            continue;
        };
        if let Some(prev) = previous_max {
            if min <= prev {
                return false;
            }
        }
        previous_max = Some(max);
    }

    true
}

/// True when concatenating the plan's members in page order reproduces `identifiers`.
pub fn verify_complete(plan: &PartitionPlan, identifiers: &[MessageId]) -> bool {
    plan.total_identifiers() == identifiers.len()
        && plan
            .iter()
            .flat_map(|w| w.member_ids.iter())
            .eq(identifiers.iter())
}
