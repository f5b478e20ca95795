use thiserror::Error;

/// Input errors raised while planning. These are caller bugs, not runtime conditions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PartitionError {
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },
}
