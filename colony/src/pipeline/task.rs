use std::future::Future;

use colony_api::PoolError;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::engine::{Options, WorkerPool};

/// A pool executing arbitrary futures on its workers.
#[derive(Clone)]
pub struct TaskPool {
    pool: WorkerPool<BoxFuture<'static, ()>>,
}

impl TaskPool {
    pub fn new(token: CancellationToken, options: Options) -> Result<Self, PoolError> {
        let pool = WorkerPool::with_token(token, |_, task: BoxFuture<'static, ()>| task, options)?;
        Ok(Self { pool })
    }

    /// Runs `task` on a worker.
    pub async fn post<T>(&self, task: T) -> Result<(), PoolError>
    where
        T: Future<Output = ()> + Send + 'static,
    {
        self.pool.invoke(task.boxed()).await
    }

    fn engine(&self) -> &WorkerPool<BoxFuture<'static, ()>> {
        &self.pool
    }

    super::pool_introspection!();
}
