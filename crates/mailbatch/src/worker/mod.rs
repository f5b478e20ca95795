pub mod fetch;
pub mod job;
pub mod pool;
pub mod processor;

pub use fetch::ImapFetchProcessor;
pub use job::{WindowJob, WindowResult};
pub use pool::{PoolSink, WindowWorkerPool};
pub use processor::{TrackingProcessor, WindowProcessor};
