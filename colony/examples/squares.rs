// Squares a stream of numbers on a small pool and prints the results as they
// arrive. The consumer is deliberately slow so that backpressure kicks in and
// the cancellation monitor tears the pipeline down.

use std::time::Duration;

use colony::engine::{Options, with_input, with_output, with_size};
use colony::pipeline::{ManifoldFuncPool, TrackableWaitGroup, start_cancellation_monitor};
use colony::{log_lifecycle, logging, pool_span};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info};

const POOL: &str = "squares";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_development();

    let token = CancellationToken::new();
    let group = TrackableWaitGroup::traced(POOL);

    let pool = ManifoldFuncPool::new(
        token.clone(),
        |n: u64| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            anyhow::Ok(n * n)
        },
        Options::new([
            with_size(4),
            with_input(8),
            with_output(4, Duration::from_millis(50), Duration::from_millis(200)),
        ]),
    )?;
    log_lifecycle!(POOL, "created", size = pool.cap());

    if let Some(cancel_rx) = pool.cancel_ch() {
        let owner = token.clone();
        start_cancellation_monitor(token.clone(), move || owner.cancel(), &group, cancel_rx, || {
            tracing::warn!(pool = POOL, "consumer too slow, cancelling")
        });
    }

    let results = pool.observe();
    let consumer = tokio::spawn(
        async move {
            let mut received = 0usize;
            while let Ok(output) = results.recv_async().await {
                received += 1;
                info!(id = %output.id, seq = output.sequence_no, worker = %output.worker_id, value = ?output.payload());
                if received > 20 {
                    // fall behind on purpose
                    tokio::time::sleep(Duration::from_millis(300)).await;
                }
            }
            received
        }
        .instrument(pool_span!(POOL)),
    );

    let tx = pool.source(&token, &group);
    for n in 0..200u64 {
        tokio::select! {
            _ = token.cancelled() => break,
            sent = tx.send_async(n) => if sent.is_err() { break },
        }
    }
    drop(tx);

    let received = consumer.await?;
    group.close();
    group.wait().await;

    pool.release_timeout(Duration::from_secs(5)).await?;
    log_lifecycle!(POOL, "released", received, cancelled = token.is_cancelled());
    Ok(())
}
