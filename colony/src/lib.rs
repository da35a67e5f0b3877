//! # Colony
//!
//! A bounded worker pool for tokio with a typed job pipeline on top.
//!
//! Callers submit many short-lived units of work against a fixed (or
//! unbounded) set of reusable workers. Idle workers are recycled, workers idle
//! too long are evicted, and results are delivered to an observer through a
//! bounded channel that signals cancellation when nobody keeps up.
//!
//! ```rust,ignore
//! use colony::engine::{Options, with_output, with_size};
//! use colony::pipeline::ManifoldFuncPool;
//!
//! let pool = ManifoldFuncPool::new(
//!     token.clone(),
//!     |n: u64| async move { Ok(n * n) },
//!     Options::new([with_size(4), with_output(16, interval, timeout)]),
//! )?;
//! let results = pool.observe();
//! for n in 0..100 {
//!     pool.post(n).await?;
//! }
//! pool.conclude();
//! while let Ok(out) = results.recv_async().await { /* ... */ }
//! ```
//!
//! ## Module Organization
//!
//! - [`engine`]: [`WorkerPool`](engine::WorkerPool), worker queues,
//!   scavengers and options
//! - [`pipeline`]: [`ManifoldFuncPool`](pipeline::ManifoldFuncPool),
//!   [`FuncPool`](pipeline::FuncPool), [`TaskPool`](pipeline::TaskPool) and
//!   the cancellation monitor
//! - [`logging`]: subscriber setup
//!
//! Envelopes, channels and errors come from `colony-api` and are re-exported
//! here.

pub mod engine;
pub mod logging;
pub mod pipeline;

pub use colony_api::{CancelWorkSignal, Duplex, IdGenerator, Job, JobOutput, PoolError, Sequential, WorkerId};
pub use engine::{Options, WorkerPool};
pub use pipeline::{FuncPool, ManifoldFuncPool, TaskPool, TrackableWaitGroup, WaitGroup, start_cancellation_monitor};
