//! # Pool Engine
//!
//! The worker lifecycle (spawn, reuse, evict), the admission protocol of a
//! saturated pool and the scavengers that keep it tidy.
//!
//! ## Module Organization
//!
//! - [`options`]: configuration snapshot and functional options
//! - [`queue`]: idle-worker containers (stack and loop queue)
//! - [`pool`]: [`WorkerPool`], admission and lifecycle
//! - `worker`: the per-worker task
//! - `scavenger`: purge and clock tasks

pub mod options;
pub mod pool;
pub mod queue;
mod scavenger;
mod worker;

pub use options::{
    DEFAULT_CH_SIZE, DEFAULT_CLEAN_INTERVAL_TIME, DEFAULT_OUTPUT_OPTIONS, InputOptions, Logger, Options,
    OutputOptions, PanicHandler, PoolOption, TracingLogger, UNBOUNDED, if_else_option, if_else_option_f, if_option,
    if_option_f, with_default_output, with_disable_purge, with_expiry_duration, with_generator, with_input,
    with_logger, with_max_blocking_tasks, with_nonblocking, with_options, with_output, with_panic_handler,
    with_pre_alloc, with_size,
};
pub use pool::{RELEASE_TIMEOUT_INTERVAL, WorkerPool};
pub use queue::{IdleWorker, QueueKind, WorkerLoopQueue, WorkerQueue, WorkerStack};
pub use scavenger::NOW_TIME_UPDATE_INTERVAL;
pub use worker::PoolFunc;
