//! Gap-safe pagination of a mailbox's UID space.
//!
//! [`plan`] slices a sorted identifier set into fixed-size pages whose
//! concatenation reproduces the set exactly, and [`dispatch`] hands those
//! pages to a [`QueueSink`](crate::sink::QueueSink), leaving out identifiers
//! already recorded downstream. Nothing in this module performs I/O.

pub mod dispatch;
pub mod error;
pub mod planner;
pub mod window;

pub use dispatch::{dispatch, DispatchFailure, DispatchReport, WindowOutcome};
pub use error::PartitionError;
pub use planner::{page_count, plan, verify_complete, verify_no_overlap, BatchPartitioner};
pub use window::{BatchWindow, IdentifierSet, MessageId, PartitionPlan};
