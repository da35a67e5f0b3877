use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use colony_api::{CancelWorkSignal, Duplex, JobOutput};
use flume::Receiver;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, warn};

use crate::engine::{Logger, OutputOptions};

/// Capacity of the cancel channel; one pending signal is enough to abort.
const CANCEL_CHAN_CAP: usize = 1;

/// # Output Stream
///
/// The delivery side of a pipeline: a bounded results channel, the cancel
/// channel and the bookkeeping that decides when results may stop.
///
/// ## Closing Rules
/// - the results channel closes once `conclude` was called and no job is
///   outstanding, checked every `check_close_interval`
/// - cancelling the governing token closes it immediately
/// - the cancel channel is never closed; a signal stays readable
pub(crate) struct OutputStream<O> {
    results: Duplex<JobOutput<O>>,
    cancel: Duplex<CancelWorkSignal>,
    options: OutputOptions,
    pending: AtomicUsize,
    ending: AtomicBool,
    logger: Arc<dyn Logger>,
}

/// Counts a job as outstanding until dropped.
///
/// The guard travels with the job into the worker, so a job lost to an
/// admission error or a panic still settles the count.
pub(crate) struct PendingGuard<O> {
    stream: Arc<OutputStream<O>>,
}

impl<O> Drop for PendingGuard<O> {
    fn drop(&mut self) {
        self.stream.pending.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<O: Send + 'static> OutputStream<O> {
    pub(crate) fn new(options: OutputOptions, logger: Arc<dyn Logger>) -> Arc<Self> {
        Arc::new(Self {
            results: Duplex::new(options.buffer_size),
            cancel: Duplex::new(CANCEL_CHAN_CAP),
            options,
            pending: AtomicUsize::new(0),
            ending: AtomicBool::new(false),
            logger,
        })
    }

    pub(crate) fn track(self: &Arc<Self>) -> PendingGuard<O> {
        self.pending.fetch_add(1, Ordering::AcqRel);
        PendingGuard { stream: self.clone() }
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub(crate) fn conclude(&self) {
        self.ending.store(true, Ordering::Release);
    }

    pub(crate) fn is_ending(&self) -> bool {
        self.ending.load(Ordering::Acquire)
    }

    pub(crate) fn reader(&self) -> Receiver<JobOutput<O>> {
        self.results.reader()
    }

    pub(crate) fn cancel_reader(&self) -> Receiver<CancelWorkSignal> {
        self.cancel.reader()
    }

    /// Offers `output` to the observer, waiting at most `timeout_on_send`.
    /// On timeout the result is dropped and a cancel signal is raised.
    pub(crate) async fn deliver(&self, output: JobOutput<O>) {
        let Some(tx) = self.results.writer() else {
            self.logger.log(
                Level::WARN,
                &format!("output closed, result of {} dropped", output.id),
            );
            return;
        };

        let id = output.id.clone();
        match time::timeout(self.options.timeout_on_send, tx.send_async(output)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => debug!(job = %id, "no observer left for result"),
            Err(_) => {
                warn!(
                    job = %id,
                    timeout = ?self.options.timeout_on_send,
                    "result delivery timed out, raising cancel signal"
                );
                self.signal_cancel();
            }
        }
    }

    fn signal_cancel(&self) {
        if let Some(tx) = self.cancel.writer() {
            // a signal already queued is as good as ours
            let _ = tx.try_send(CancelWorkSignal);
        }
    }

    fn close(&self) {
        if self.results.close() {
            debug!(pending = self.pending(), "output channel closed");
        }
    }

    /// Spawns the task closing the results channel once it may close.
    pub(crate) fn spawn_watchdog(self: &Arc<Self>, token: CancellationToken) {
        let stream = Arc::downgrade(self);
        let interval = self.options.check_close_interval;
        tokio::spawn(watch_for_close(stream, token, interval));
    }
}

async fn watch_for_close<O: Send + 'static>(
    stream: Weak<OutputStream<O>>,
    token: CancellationToken,
    interval: std::time::Duration,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(out) = stream.upgrade() else {
            return;
        };
        if out.is_ending() && out.pending() == 0 {
            break;
        }
    }

    if let Some(out) = stream.upgrade() {
        out.close();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use colony_api::WorkerId;

    use super::*;
    use crate::engine::TracingLogger;

    fn options(buffer_size: usize, timeout_on_send: Duration) -> OutputOptions {
        OutputOptions {
            buffer_size,
            check_close_interval: Duration::from_millis(5),
            timeout_on_send,
        }
    }

    #[tokio::test]
    async fn test_pending_guard_settles_count() {
        let stream = OutputStream::<u8>::new(options(1, Duration::from_millis(5)), Arc::new(TracingLogger));
        let a = stream.track();
        let b = stream.track();
        assert_eq!(stream.pending(), 2);

        drop(a);
        drop(b);
        assert_eq!(stream.pending(), 0);
    }

    #[tokio::test]
    async fn test_deliver_timeout_raises_cancel() {
        let stream = OutputStream::<u8>::new(options(1, Duration::from_millis(10)), Arc::new(TracingLogger));

        stream.deliver(JobOutput::new("A", 1, WorkerId(0), Ok(1))).await;
        // buffer full and nobody reading
        stream.deliver(JobOutput::new("B", 2, WorkerId(0), Ok(2))).await;

        assert_eq!(stream.cancel_reader().try_recv(), Ok(CancelWorkSignal));
        let first = stream.reader().try_recv().unwrap();
        assert_eq!(first.id, "A");
        assert!(stream.reader().try_recv().is_err());
    }

    #[tokio::test]
    async fn test_watchdog_waits_for_conclude_and_pending() {
        let stream = OutputStream::<u8>::new(options(4, Duration::from_millis(10)), Arc::new(TracingLogger));
        let reader = stream.reader();
        stream.spawn_watchdog(CancellationToken::new());

        let guard = stream.track();
        stream.conclude();
        time::sleep(Duration::from_millis(30)).await;
        assert!(!stream.results.is_closed());

        drop(guard);
        let closed = time::timeout(Duration::from_secs(1), async {
            while reader.recv_async().await.is_ok() {}
        })
        .await;
        assert!(closed.is_ok());
    }
}
