//! Shared test utilities for mailbatch integration tests.
//!
//! This module provides:
//! - Fake collaborators (identifier source, recording sink) for driving cycles offline
//! - Builder patterns for configurations and coordinator settings

pub mod builders;
pub mod fakes;

pub use builders::*;
pub use fakes::*;
