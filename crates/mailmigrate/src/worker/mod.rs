pub mod job;
pub mod pool;

pub use job::{AccountJob, AccountOutcome, BatchReport, FailedMessage, WorkerEvent};
pub use pool::WorkerPool;
