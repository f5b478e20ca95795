//! Table-driven tests for planning and dispatching pages of UIDs.

mod common;

use std::collections::HashSet;

use common::{sizes, uids, RecordingSink};
use mailbatch::partition::{
    dispatch, page_count, plan, verify_complete, verify_no_overlap, MessageId, PartitionError,
    WindowOutcome,
};
use mailbatch::sink::SinkError;

/// A single planning case.
struct PlanCase {
    name: &'static str,
    ids: fn() -> Vec<MessageId>,
    page_size: usize,
    expected_sizes: &'static [usize],
}

const PLAN_CASES: &[PlanCase] = &[
    PlanCase {
        name: "empty_set",
        ids: Vec::new,
        page_size: 25,
        expected_sizes: &[],
    },
    PlanCase {
        name: "single_id",
        ids: || vec![42],
        page_size: 25,
        expected_sizes: &[1],
    },
    PlanCase {
        name: "exact_multiple",
        ids: || uids(1, 100),
        page_size: 25,
        expected_sizes: &[25, 25, 25, 25],
    },
    PlanCase {
        name: "ragged_last_page",
        ids: || uids(1, 113),
        page_size: 25,
        expected_sizes: &[25, 25, 25, 25, 13],
    },
    PlanCase {
        name: "page_size_one",
        ids: || vec![3, 9, 27],
        page_size: 1,
        expected_sizes: &[1, 1, 1],
    },
    PlanCase {
        name: "page_larger_than_set",
        ids: || uids(10, 19),
        page_size: 1000,
        expected_sizes: &[10],
    },
    PlanCase {
        name: "sparse_uids",
        ids: || (1..=40).map(|n| n * 7 + 1000).collect(),
        page_size: 15,
        expected_sizes: &[15, 15, 10],
    },
    PlanCase {
        name: "near_u32_max",
        ids: || vec![u32::MAX - 2, u32::MAX - 1, u32::MAX],
        page_size: 2,
        expected_sizes: &[2, 1],
    },
];

#[test]
fn test_plan_properties() {
    for case in PLAN_CASES {
        let ids = (case.ids)();
        let plan = plan(&ids, case.page_size)
            .unwrap_or_else(|e| panic!("Test '{}': plan failed: {}", case.name, e));

        assert_eq!(
            sizes(&plan),
            case.expected_sizes,
            "Test '{}': unexpected window sizes",
            case.name
        );
        assert_eq!(
            plan.num_pages(),
            page_count(ids.len(), case.page_size),
            "Test '{}': page count",
            case.name
        );
        assert!(
            verify_complete(&plan, &ids),
            "Test '{}': concatenated windows differ from input",
            case.name
        );
        assert!(
            verify_no_overlap(&plan),
            "Test '{}': windows overlap",
            case.name
        );

        for (i, window) in plan.iter().enumerate() {
            let expected_start = i * case.page_size;
            assert_eq!(window.page_index, i + 1, "Test '{}'", case.name);
            assert_eq!(window.start_offset, expected_start, "Test '{}'", case.name);
            assert_eq!(window.skip_count, expected_start, "Test '{}'", case.name);
            assert_eq!(
                window.end_offset,
                (expected_start + case.page_size).min(ids.len()),
                "Test '{}'",
                case.name
            );
            assert_eq!(
                window.member_ids,
                ids[window.start_offset..window.end_offset],
                "Test '{}'",
                case.name
            );
        }

        // Determinism
        assert_eq!(plan, mailbatch::plan(&ids, case.page_size).unwrap(), "Test '{}'", case.name);
    }
}

#[test]
fn test_no_id_in_two_windows() {
    let ids: Vec<MessageId> = (0..997).map(|n| n * 3 + 1).collect();
    for page_size in [1, 2, 7, 25, 100, 996, 997, 998] {
        let plan = plan(&ids, page_size).unwrap();
        let mut seen = HashSet::new();
        for id in plan.member_ids() {
            assert!(seen.insert(id), "page_size {}: {} appears twice", page_size, id);
        }
        assert_eq!(seen.len(), ids.len(), "page_size {}", page_size);
    }
}

/// Inputs `plan` must refuse.
const INVALID_INPUTS: &[(&str, &[MessageId], usize)] = &[
    ("zero_page_size", &[1, 2, 3], 0),
    ("zero_page_size_empty_set", &[], 0),
    ("descending", &[3, 2, 1], 10),
    ("duplicate", &[1, 2, 2, 3], 10),
    ("unsorted_tail", &[1, 5, 9, 4], 2),
];

#[test]
fn test_plan_rejects_invalid_input() {
    for (name, ids, page_size) in INVALID_INPUTS {
        let result = plan(ids, *page_size);
        assert!(
            matches!(result, Err(PartitionError::InvalidArgument { .. })),
            "Test '{}': expected InvalidArgument, got {:?}",
            name,
            result
        );
    }
}

// Scenario A: 113 ids, page size 25.
#[tokio::test]
async fn test_scenario_full_dispatch() {
    let ids = uids(1, 113);
    let plan = plan(&ids, 25).unwrap();
    assert_eq!(sizes(&plan), vec![25, 25, 25, 25, 13]);

    let windows: Vec<_> = plan.iter().collect();
    assert_eq!(windows[0].member_ids, uids(1, 25));
    assert_eq!(windows[4].member_ids, uids(101, 113));
    assert_eq!(windows[4].skip_count, 100);

    let sink = RecordingSink::new();
    let report = dispatch(&plan, &sink, &HashSet::new()).await;

    assert_eq!(report.total_windows, 5);
    assert_eq!(report.dispatched_windows, 5);
    assert_eq!(report.skipped_duplicate_windows, 0);
    assert_eq!(report.dispatched_identifiers, 113);
    assert!(report.failures.is_empty());
    assert_eq!(sink.accepted_ids(), ids);
}

// Scenario B: nothing to do.
#[tokio::test]
async fn test_scenario_empty_set() {
    let plan = plan(&[], 25).unwrap();
    assert!(plan.is_empty());

    let sink = RecordingSink::new();
    let report = dispatch(&plan, &sink, &HashSet::new()).await;

    assert_eq!(report.total_windows, 0);
    assert_eq!(report.dispatched_windows, 0);
    assert_eq!(report.total_identifiers, 0);
    assert!(report.is_complete());
    assert_eq!(sink.offer_count(), 0);
}

// Scenario C: first page already processed.
#[tokio::test]
async fn test_scenario_already_processed_page_is_skipped() {
    let plan = plan(&uids(1, 50), 25).unwrap();
    let processed: HashSet<MessageId> = uids(1, 25).into_iter().collect();

    let sink = RecordingSink::new();
    let report = dispatch(&plan, &sink, &processed).await;

    assert_eq!(report.skipped_duplicate_windows, 1);
    assert_eq!(report.dispatched_windows, 1);
    assert_eq!(report.skipped_identifiers, 25);
    assert_eq!(
        report.outcomes[0],
        WindowOutcome::SkippedDuplicate { page_index: 1 }
    );

    let accepted = sink.accepted_windows();
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].page_index, 2);
    assert_eq!(accepted[0].member_ids, uids(26, 50));
}

#[tokio::test]
async fn test_partially_processed_page_is_reduced() {
    let plan = plan(&uids(1, 10), 5).unwrap();
    let processed: HashSet<MessageId> = [2, 4, 6, 7, 8, 9, 10].into_iter().collect();

    let sink = RecordingSink::new();
    let report = dispatch(&plan, &sink, &processed).await;

    assert_eq!(report.dispatched_windows, 1);
    assert_eq!(report.skipped_duplicate_windows, 1);
    assert_eq!(report.dispatched_identifiers, 3);
    assert_eq!(sink.accepted_ids(), vec![1, 3, 5]);

    // Offsets still describe the page, not the reduced member list.
    let window = &sink.accepted_windows()[0];
    assert_eq!((window.start_offset, window.end_offset), (0, 5));
}

// Scenario D: the sink refuses page 3 of 5.
#[tokio::test]
async fn test_scenario_rejected_page_is_isolated() {
    let plan = plan(&uids(1, 113), 25).unwrap();

    let sink = RecordingSink::rejecting(&[3]);
    let report = dispatch(&plan, &sink, &HashSet::new()).await;

    assert_eq!(report.dispatched_windows, 4);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].window.page_index, 3);
    assert!(matches!(report.failures[0].cause, SinkError::Rejected(_)));
    assert_eq!(sink.accepted_pages(), vec![1, 2, 4, 5]);
    assert_eq!(report.failed_identifiers(), 25);

    // Retry the failed window once the sink recovers.
    sink.accept_all();
    let mut report = report;
    let retry = dispatch(&report.failed_plan(), &sink, &HashSet::new()).await;
    report.absorb_retry(retry);

    assert!(report.is_complete());
    assert_eq!(report.dispatched_windows, 5);
    assert_eq!(report.dispatched_identifiers, 113);
    assert_eq!(report.retry_attempts, 1);
    assert_eq!(sink.accepted_ids(), uids(1, 113));
}

#[tokio::test]
async fn test_redispatch_with_stale_snapshot_only_repeats_work() {
    let ids = uids(1, 60);
    let plan = plan(&ids, 20).unwrap();
    let sink = RecordingSink::new();

    dispatch(&plan, &sink, &HashSet::new()).await;
    // Stale snapshot: nothing recorded yet, so everything goes out again.
    let second = dispatch(&plan, &sink, &HashSet::new()).await;

    assert_eq!(second.dispatched_identifiers, 60);
    let mut all = sink.accepted_ids();
    all.sort_unstable();
    all.dedup();
    assert_eq!(all, ids);
}
