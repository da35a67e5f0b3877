use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use colony_api::{CancelWorkSignal, Job, JobOutput, PoolError};
use flume::{Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::output::{OutputStream, PendingGuard};
use super::stamp::JobStamper;
use super::wait_group::WaitGroup;
use crate::engine::{DEFAULT_CH_SIZE, Options, WorkerPool};

/// Payload travelling through the engine: the job and, when an output is
/// configured, the guard keeping it outstanding.
pub(crate) struct Tracked<I, O> {
    job: Job<I>,
    _pending: Option<PendingGuard<O>>,
}

/// # Manifold Func Pool
///
/// A pool binding one executive function `Fn(I) -> Future<Output =
/// anyhow::Result<O>>` and delivering every result as a [`JobOutput`] to an
/// observer.
///
/// ## Lifecycle
/// 1. `post` (or `source`) submits inputs; each becomes a [`Job`] with a
///    fresh id and the next sequence number
/// 2. workers execute the function and offer the outcome to the output
///    channel, bounded by the send timeout
/// 3. `conclude` announces that no more inputs follow; the output channel
///    closes once every outstanding job has been delivered
///
/// A result that cannot be delivered in time is dropped and a
/// [`CancelWorkSignal`] is raised on [`ManifoldFuncPool::cancel_ch`]. Pair it
/// with [`start_cancellation_monitor`](super::start_cancellation_monitor) to
/// tear the pipeline down.
pub struct ManifoldFuncPool<I: Send + 'static, O: Send + 'static> {
    inner: Arc<Manifold<I, O>>,
}

struct Manifold<I: Send + 'static, O: Send + 'static> {
    pool: WorkerPool<Tracked<I, O>>,
    stamper: JobStamper,
    output: Option<Arc<OutputStream<O>>>,
    input_buffer: usize,
    concluded: AtomicBool,
}

impl<I: Send + 'static, O: Send + 'static> Clone for ManifoldFuncPool<I, O> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<I: Send + 'static, O: Send + 'static> ManifoldFuncPool<I, O> {
    /// Creates the pool. Cancelling `token` stops its background tasks and
    /// closes the output channel.
    pub fn new<F, Fut>(token: CancellationToken, func: F, options: Options) -> Result<Self, PoolError>
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
    {
        let options = options.resolve()?;
        let output = options
            .output
            .clone()
            .map(|settings| OutputStream::new(settings, options.logger()));
        let stamper = JobStamper::new(options.generator());
        let input_buffer = options
            .input
            .as_ref()
            .map_or(DEFAULT_CH_SIZE, |input| input.buffer_size);

        let func = Arc::new(func);
        let delivery = output.clone();
        let pool = WorkerPool::with_token(
            token.clone(),
            move |worker_id, tracked: Tracked<I, O>| {
                let func = func.clone();
                let delivery = delivery.clone();
                async move {
                    let Tracked { job, _pending } = tracked;
                    let Job { id, sequence_no, input } = job;

                    let outcome = func(input).await;
                    if let Some(delivery) = delivery {
                        delivery
                            .deliver(JobOutput::new(id, sequence_no, worker_id, outcome))
                            .await;
                    }
                }
            },
            options,
        )?;

        if let Some(output) = &output {
            output.spawn_watchdog(token);
        }

        Ok(Self {
            inner: Arc::new(Manifold {
                pool,
                stamper,
                output,
                input_buffer,
                concluded: AtomicBool::new(false),
            }),
        })
    }

    /// Submits `input` as the next job.
    ///
    /// Fails with `PoolClosed` once the pool is released or concluded and
    /// with `PoolOverload` when a non-blocking pool is saturated.
    pub async fn post(&self, input: I) -> Result<(), PoolError> {
        let pending = self.inner.output.as_ref().map(|output| output.track());
        if self.is_concluded() {
            return Err(PoolError::PoolClosed);
        }

        let job = self.inner.stamper.stamp(input);
        self.inner
            .pool
            .invoke(Tracked {
                job,
                _pending: pending,
            })
            .await
    }

    /// Returns a sender feeding the pool.
    ///
    /// A forwarding task tracked by `group` posts every received input.
    /// Dropping every sender (or cancelling `token`) ends the task and
    /// concludes the pool.
    ///
    /// The forwarder does not retry: an input rejected with `PoolOverload`
    /// is logged and dropped. Feed a non-blocking or `max_blocking_tasks`
    /// limited pool through `post` when every input must be accounted for.
    pub fn source(&self, token: &CancellationToken, group: &impl WaitGroup) -> Sender<I> {
        let (tx, rx) = flume::bounded(self.inner.input_buffer);
        group.spawn_tracked(forward(self.clone(), token.clone(), rx));
        tx
    }

    /// Announces that no more inputs follow; later posts fail with
    /// `PoolClosed`. The output channel closes once every outstanding job has
    /// been delivered.
    pub fn conclude(&self) {
        self.inner.concluded.store(true, Ordering::Release);
        if let Some(output) = &self.inner.output {
            output.conclude();
        }
        debug!(posted = self.inner.stamper.issued(), "pipeline concluded");
    }

    fn is_concluded(&self) -> bool {
        self.inner.concluded.load(Ordering::Acquire)
    }

    /// The results channel.
    ///
    /// # Panics
    /// With [`PoolError::BadObservation`] as payload when the pool was built
    /// without an output.
    pub fn observe(&self) -> Receiver<JobOutput<O>> {
        match &self.inner.output {
            Some(output) => output.reader(),
            None => std::panic::panic_any(PoolError::BadObservation),
        }
    }

    /// The channel on which undeliverable results raise a cancel signal,
    /// `None` without an output.
    pub fn cancel_ch(&self) -> Option<Receiver<CancelWorkSignal>> {
        self.inner.output.as_ref().map(|output| output.cancel_reader())
    }

    /// Jobs posted so far.
    pub fn posted(&self) -> u64 {
        self.inner.stamper.issued()
    }

    fn engine(&self) -> &WorkerPool<Tracked<I, O>> {
        &self.inner.pool
    }

    super::pool_introspection!();
}

async fn forward<I: Send + 'static, O: Send + 'static>(
    pool: ManifoldFuncPool<I, O>,
    token: CancellationToken,
    rx: Receiver<I>,
) {
    loop {
        let input = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            item = rx.recv_async() => match item {
                Ok(input) => input,
                Err(_) => break,
            },
        };

        let posted = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            posted = pool.post(input) => posted,
        };
        match posted {
            Ok(()) => {}
            Err(PoolError::PoolClosed) => break,
            Err(err) => warn!(error = %err, "source dropped an input"),
        }
    }

    pool.conclude();
}
