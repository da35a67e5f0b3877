use std::future::Future;
use std::sync::Arc;

use colony_api::{Job, PoolError};
use tokio_util::sync::CancellationToken;

use super::stamp::JobStamper;
use crate::engine::{Options, WorkerPool};

/// A pool binding one function `Fn(Job<I>) -> Future<Output = ()>` with no
/// output channel. Jobs still carry an id and a sequence number for the
/// function's own bookkeeping.
pub struct FuncPool<I: Send + 'static> {
    pool: WorkerPool<Job<I>>,
    stamper: Arc<JobStamper>,
}

impl<I: Send + 'static> Clone for FuncPool<I> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            stamper: self.stamper.clone(),
        }
    }
}

impl<I: Send + 'static> FuncPool<I> {
    pub fn new<F, Fut>(token: CancellationToken, func: F, options: Options) -> Result<Self, PoolError>
    where
        F: Fn(Job<I>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let options = options.resolve()?;
        let stamper = Arc::new(JobStamper::new(options.generator()));
        let pool = WorkerPool::with_token(token, move |_, job: Job<I>| func(job), options)?;

        Ok(Self { pool, stamper })
    }

    /// Submits `input` as the next job.
    pub async fn post(&self, input: I) -> Result<(), PoolError> {
        if self.pool.is_closed() {
            return Err(PoolError::PoolClosed);
        }
        self.pool.invoke(self.stamper.stamp(input)).await
    }

    /// Jobs posted so far, including rejected ones.
    pub fn posted(&self) -> u64 {
        self.stamper.issued()
    }

    fn engine(&self) -> &WorkerPool<Job<I>> {
        &self.pool
    }

    super::pool_introspection!();
}
