//! Bounded-concurrency runner for acquisition jobs.
//!
//! [`AcquisitionPool`] collects submitted jobs and, on [`run`](AcquisitionPool::run),
//! spawns them all on a [`JoinSet`]. Each task must take a permit from a
//! shared [`Semaphore`] before starting, which caps the number of jobs in
//! flight. A job that fails or panics becomes an
//! [`AcquisitionResult::Error`]; it never aborts its siblings.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use pixluna_common::{Error, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::assembler;
use super::job::Job;
use super::result::AcquisitionResult;
use crate::config::MAX_CONCURRENCY;

/// Most jobs one pool accepts.
pub const MAX_JOBS: usize = 10;

type TaskFuture = Pin<Box<dyn Future<Output = Result<AcquisitionResult>> + Send>>;

pub struct AcquisitionPool {
    concurrency: usize,
    tasks: Vec<TaskFuture>,
}

impl AcquisitionPool {
    /// Create a pool running at most `max_concurrency` jobs at once, clamped
    /// into `1..=10`.
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            concurrency: max_concurrency.clamp(1, MAX_CONCURRENCY),
            tasks: Vec::new(),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Queue a job. Returns its index in the batch.
    pub fn submit(&mut self, job: Job) -> Result<usize> {
        self.submit_task(move |index| job.run(index))
    }

    /// Queue arbitrary work. `make` receives the job's index and must produce
    /// a future resolving to the result for that index.
    pub fn submit_task<F, Fut>(&mut self, make: F) -> Result<usize>
    where
        F: FnOnce(usize) -> Fut,
        Fut: Future<Output = Result<AcquisitionResult>> + Send + 'static,
    {
        if self.tasks.len() >= MAX_JOBS {
            return Err(Error::PoolFull { capacity: MAX_JOBS });
        }
        let index = self.tasks.len();
        self.tasks.push(Box::pin(make(index)));
        Ok(index)
    }

    /// Run every queued job and wait for all of them to settle.
    ///
    /// Results come back in completion order with exactly one entry per
    /// submitted job.
    pub async fn run(self) -> Vec<AcquisitionResult> {
        let total = self.tasks.len();
        if total == 0 {
            return Vec::new();
        }

        info!(jobs = total, concurrency = self.concurrency, "Starting acquisition batch");
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut set = JoinSet::new();

        for (index, task) in self.tasks.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return assembler::failure(index, &Error::internal("pool semaphore closed")),
                };
                debug!(index, "Job admitted");

                match AssertUnwindSafe(task).catch_unwind().await {
                    Ok(Ok(result)) => result,
                    Ok(Err(e)) => {
                        warn!(index, kind = %e.kind(), error = %e, "Job failed");
                        assembler::failure(index, &e)
                    }
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        warn!(index, panic = %message, "Job panicked");
                        assembler::failure(index, &Error::internal(format!("job panicked: {message}")))
                    }
                }
            });
        }

        let mut results = Vec::with_capacity(total);
        let mut settled = vec![false; total];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(result) => {
                    if let Some(flag) = settled.get_mut(result.index()) {
                        *flag = true;
                    }
                    results.push(result);
                }
                Err(e) => warn!(error = %e, "Job task did not complete"),
            }
        }

        // A task lost to cancellation still owes the batch a result.
        for index in (0..total).filter(|&i| !settled[i]) {
            results.push(assembler::failure(index, &Error::internal("job task aborted")));
        }

        let ok = results.iter().filter(|r| r.is_success()).count();
        info!(jobs = total, succeeded = ok, failed = total - ok, "Acquisition batch finished");
        results
    }
}

impl std::fmt::Debug for AcquisitionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquisitionPool")
            .field("concurrency", &self.concurrency)
            .field("jobs", &self.tasks.len())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
