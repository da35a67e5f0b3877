use colony_api::CancelWorkSignal;
use flume::Receiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::wait_group::WaitGroup;

/// Watches `cancel_rx` on behalf of the owner of a pipeline.
///
/// Spawns a task on `group` that waits for whichever comes first:
/// - a [`CancelWorkSignal`]: runs `on_cancel`, then `cancel`
/// - cancellation of `token`: returns without calling either
///
/// A cancel channel whose senders are all gone never delivers a signal and
/// ends the task quietly.
pub fn start_cancellation_monitor<C, H>(
    token: CancellationToken,
    cancel: C,
    group: &impl WaitGroup,
    cancel_rx: Receiver<CancelWorkSignal>,
    on_cancel: H,
) where
    C: FnOnce() + Send + 'static,
    H: FnOnce() + Send + 'static,
{
    group.spawn_tracked(async move {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("cancellation monitor stopped");
            }
            signal = cancel_rx.recv_async() => {
                if signal.is_ok() {
                    warn!("cancel signal received, cancelling pipeline");
                    on_cancel();
                    cancel();
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use tokio_util::task::TaskTracker;

    use super::*;

    #[tokio::test]
    async fn test_signal_runs_callbacks() {
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();
        let (tx, rx) = flume::bounded(1);
        let called = Arc::new(AtomicBool::new(false));

        let flag = called.clone();
        let owner = token.clone();
        start_cancellation_monitor(token.clone(), move || owner.cancel(), &tracker, rx, move || {
            flag.store(true, Ordering::SeqCst)
        });

        tx.send(CancelWorkSignal).unwrap();
        tracker.close();
        tokio::time::timeout(Duration::from_secs(1), tracker.wait()).await.unwrap();

        assert!(called.load(Ordering::SeqCst));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_token_cancel_skips_callbacks() {
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();
        let (_tx, rx) = flume::bounded::<CancelWorkSignal>(1);
        let called = Arc::new(AtomicBool::new(false));

        let flag = called.clone();
        start_cancellation_monitor(token.clone(), || {}, &tracker, rx, move || flag.store(true, Ordering::SeqCst));

        token.cancel();
        tracker.close();
        tokio::time::timeout(Duration::from_secs(1), tracker.wait()).await.unwrap();

        assert!(!called.load(Ordering::SeqCst));
    }
}
