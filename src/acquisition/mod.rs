//! Batch acquisition: jobs, the bounded-concurrency pool that runs them, and
//! the results they produce.

pub mod assembler;
pub mod job;
pub mod pool;
pub mod result;
pub mod service;

pub use job::Job;
pub use pool::{AcquisitionPool, MAX_JOBS};
pub use result::{AcquiredImage, AcquisitionResult};
pub use service::Acquirer;
