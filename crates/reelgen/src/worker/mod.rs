pub mod job;
pub mod pool;

pub use job::{JobRequest, JobResult};
pub use pool::WorkerPool;
