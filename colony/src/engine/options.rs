//! Pool configuration.
//!
//! A pool's configuration is an [`Options`] snapshot taken once at
//! construction. Callers assemble it from functional [`PoolOption`]s so that
//! conditional options ([`if_option`], [`if_option_f`], ...) compose with
//! plain ones:
//!
//! ```rust,ignore
//! let options = Options::new([
//!     with_size(10),
//!     with_nonblocking(true),
//!     if_option(verbose, with_logger(Arc::new(MyLogger))),
//! ]);
//! ```
//!
//! The only process-wide value is the read-only [`DEFAULT_OUTPUT_OPTIONS`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use colony_api::{IdGenerator, PoolError, Sequential};
use lazy_static::lazy_static;
use tracing::Level;

/// Capacity sentinel for a pool without an upper bound on running workers.
pub const UNBOUNDED: i32 = -1;

/// Purge interval used when the expiry duration is left at zero.
pub const DEFAULT_CLEAN_INTERVAL_TIME: Duration = Duration::from_secs(1);

/// Buffer of the `source` input channel when no input option is given.
pub const DEFAULT_CH_SIZE: usize = 100;

lazy_static! {
    /// Output settings substituted by [`OutputOptions::default`]. The values
    /// are generous rather than tuned; callers with a real consumer should
    /// size the output themselves.
    pub static ref DEFAULT_OUTPUT_OPTIONS: OutputOptions = OutputOptions {
        buffer_size: num_cpus::get(),
        check_close_interval: Duration::from_secs(5),
        timeout_on_send: Duration::from_secs(5),
    };
}

/// Called with the panic payload when a job panics inside a worker.
pub type PanicHandler = Arc<dyn Fn(Box<dyn Any + Send>) + Send + Sync>;

/// A functional option applied to [`Options`].
pub type PoolOption = Box<dyn FnOnce(&mut Options) + Send>;

/// Sink for the engine's own diagnostics (worker panics without a handler,
/// abandoned outputs).
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

/// Default logger, forwarding to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str) {
        if level == Level::ERROR {
            tracing::error!(target: "colony", "{message}");
        } else if level == Level::WARN {
            tracing::warn!(target: "colony", "{message}");
        } else if level == Level::INFO {
            tracing::info!(target: "colony", "{message}");
        } else if level == Level::DEBUG {
            tracing::debug!(target: "colony", "{message}");
        } else {
            tracing::trace!(target: "colony", "{message}");
        }
    }
}

/// Characteristics of a pool's output channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputOptions {
    /// Capacity of the output channel
    pub buffer_size: usize,

    /// How often the close watchdog checks whether the output may be closed
    pub check_close_interval: Duration,

    /// How long delivery of a single result may block before it is abandoned
    /// and a cancel signal raised
    pub timeout_on_send: Duration,
}

impl Default for OutputOptions {
    fn default() -> Self {
        DEFAULT_OUTPUT_OPTIONS.clone()
    }
}

/// Characteristics of the channel returned by `source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputOptions {
    pub buffer_size: usize,
}

impl Default for InputOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_CH_SIZE,
        }
    }
}

/// Configuration snapshot of a pool.
#[derive(Clone, Default)]
pub struct Options {
    /// Worker capacity. `0` selects the available parallelism, a negative
    /// value makes the pool unbounded.
    pub size: i32,

    /// Idle time after which the purge scavenger evicts a worker; also the
    /// purge period. `0` selects [`DEFAULT_CLEAN_INTERVAL_TIME`].
    pub expiry_duration: Duration,

    /// Disables the purge scavenger; idle workers then live until release.
    pub disable_purge: bool,

    /// Fail with `PoolOverload` instead of waiting when no worker is free.
    pub nonblocking: bool,

    /// Maximum number of callers allowed to wait for a worker; `0` is unlimited.
    pub max_blocking_tasks: usize,

    /// Back idle workers with a ring buffer and spawn all workers up front.
    pub pre_alloc: bool,

    pub panic_handler: Option<PanicHandler>,

    pub logger: Option<Arc<dyn Logger>>,

    pub generator: Option<Arc<dyn IdGenerator>>,

    pub input: Option<InputOptions>,

    pub output: Option<OutputOptions>,
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("size", &self.size)
            .field("expiry_duration", &self.expiry_duration)
            .field("disable_purge", &self.disable_purge)
            .field("nonblocking", &self.nonblocking)
            .field("max_blocking_tasks", &self.max_blocking_tasks)
            .field("pre_alloc", &self.pre_alloc)
            .field("has_panic_handler", &self.panic_handler.is_some())
            .field("has_logger", &self.logger.is_some())
            .field("generator", &self.generator)
            .field("input", &self.input)
            .field("output", &self.output)
            .finish()
    }
}

impl Options {
    /// Applies `options` in order over the defaults.
    pub fn new(options: impl IntoIterator<Item = PoolOption>) -> Self {
        let mut opts = Options::default();
        for option in options {
            option(&mut opts);
        }
        opts
    }

    /// Fills in defaults and validates. Called once by every pool constructor.
    pub(crate) fn resolve(mut self) -> Result<Self, PoolError> {
        if self.size == 0 {
            self.size = i32::try_from(num_cpus::get()).unwrap_or(i32::MAX);
        } else if self.size < 0 {
            self.size = UNBOUNDED;
        }

        if self.pre_alloc && self.size == UNBOUNDED {
            return Err(PoolError::InvalidPreAllocSize);
        }

        if !self.disable_purge {
            if self.expiry_duration.is_zero() {
                self.expiry_duration = DEFAULT_CLEAN_INTERVAL_TIME;
            } else if Instant::now().checked_add(self.expiry_duration).is_none() {
                return Err(PoolError::InvalidPoolExpiry);
            }
        }

        if let Some(output) = self.output.as_mut() {
            if output.check_close_interval.is_zero() {
                output.check_close_interval = DEFAULT_OUTPUT_OPTIONS.check_close_interval;
            }
        }

        if self.logger.is_none() {
            self.logger = Some(Arc::new(TracingLogger));
        }
        if self.generator.is_none() {
            self.generator = Some(Arc::new(Sequential::default()));
        }

        Ok(self)
    }

    pub(crate) fn logger(&self) -> Arc<dyn Logger> {
        self.logger.clone().unwrap_or_else(|| Arc::new(TracingLogger))
    }

    pub(crate) fn generator(&self) -> Arc<dyn IdGenerator> {
        self.generator
            .clone()
            .unwrap_or_else(|| Arc::new(Sequential::default()))
    }
}

/// Replaces the whole configuration.
pub fn with_options(options: Options) -> PoolOption {
    Box::new(move |opts| *opts = options)
}

/// Number of workers in the pool; defaults to the number of CPUs.
pub fn with_size(size: i32) -> PoolOption {
    Box::new(move |opts| opts.size = size)
}

pub fn with_expiry_duration(expiry: Duration) -> PoolOption {
    Box::new(move |opts| opts.expiry_duration = expiry)
}

pub fn with_disable_purge(disable: bool) -> PoolOption {
    Box::new(move |opts| opts.disable_purge = disable)
}

pub fn with_nonblocking(nonblocking: bool) -> PoolOption {
    Box::new(move |opts| opts.nonblocking = nonblocking)
}

pub fn with_max_blocking_tasks(max: usize) -> PoolOption {
    Box::new(move |opts| opts.max_blocking_tasks = max)
}

pub fn with_pre_alloc(pre_alloc: bool) -> PoolOption {
    Box::new(move |opts| opts.pre_alloc = pre_alloc)
}

pub fn with_panic_handler(handler: PanicHandler) -> PoolOption {
    Box::new(move |opts| opts.panic_handler = Some(handler))
}

pub fn with_logger(logger: Arc<dyn Logger>) -> PoolOption {
    Box::new(move |opts| opts.logger = Some(logger))
}

pub fn with_generator(generator: Arc<dyn IdGenerator>) -> PoolOption {
    Box::new(move |opts| opts.generator = Some(generator))
}

/// Buffer size of the channel handed out by `source`.
pub fn with_input(buffer_size: usize) -> PoolOption {
    Box::new(move |opts| opts.input = Some(InputOptions { buffer_size }))
}

/// Requests an output channel.
///
/// * `buffer_size` - capacity of the output channel
/// * `check_close_interval` - period of the watchdog deciding when the output can close
/// * `timeout_on_send` - bound on a single delivery before a cancel signal is raised
pub fn with_output(buffer_size: usize, check_close_interval: Duration, timeout_on_send: Duration) -> PoolOption {
    Box::new(move |opts| {
        opts.output = Some(OutputOptions {
            buffer_size,
            check_close_interval,
            timeout_on_send,
        })
    })
}

/// Requests an output channel with [`DEFAULT_OUTPUT_OPTIONS`].
pub fn with_default_output() -> PoolOption {
    Box::new(|opts| opts.output = Some(OutputOptions::default()))
}

fn noop() -> PoolOption {
    Box::new(|_| {})
}

/// `option` when `condition` holds, otherwise a no-op.
pub fn if_option(condition: bool, option: PoolOption) -> PoolOption {
    if condition {
        option
    } else {
        noop()
    }
}

/// Like [`if_option`] but the option is only built when `condition` holds.
pub fn if_option_f<F>(condition: bool, option: F) -> PoolOption
where
    F: FnOnce() -> PoolOption,
{
    if condition {
        option()
    } else {
        noop()
    }
}

pub fn if_else_option(condition: bool, t_option: PoolOption, f_option: PoolOption) -> PoolOption {
    if condition {
        t_option
    } else {
        f_option
    }
}

/// Builds only the option selected by `condition`.
pub fn if_else_option_f<T, F>(condition: bool, t_option: T, f_option: F) -> PoolOption
where
    T: FnOnce() -> PoolOption,
    F: FnOnce() -> PoolOption,
{
    if condition {
        t_option()
    } else {
        f_option()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_resolve() {
        let opts = Options::new([]).resolve().unwrap();

        assert_eq!(opts.size as usize, num_cpus::get());
        assert_eq!(opts.expiry_duration, DEFAULT_CLEAN_INTERVAL_TIME);
        assert!(!opts.nonblocking);
        assert_eq!(opts.max_blocking_tasks, 0);
        assert!(opts.logger.is_some());
        assert!(opts.generator.is_some());
        assert!(opts.output.is_none());
    }

    #[test]
    fn test_negative_size_is_unbounded() {
        let opts = Options::new([with_size(-5)]).resolve().unwrap();
        assert_eq!(opts.size, UNBOUNDED);
    }

    #[test]
    fn test_pre_alloc_requires_bounded_size() {
        let err = Options::new([with_size(-1), with_pre_alloc(true)]).resolve().unwrap_err();
        assert_eq!(err, PoolError::InvalidPreAllocSize);
    }

    #[test]
    fn test_unrepresentable_expiry_is_rejected() {
        let err = Options::new([with_expiry_duration(Duration::MAX)]).resolve().unwrap_err();
        assert_eq!(err, PoolError::InvalidPoolExpiry);

        // no purge scavenger, nothing to schedule
        let opts = Options::new([with_expiry_duration(Duration::MAX), with_disable_purge(true)]).resolve();
        assert!(opts.is_ok());
    }

    #[test]
    fn test_zero_close_interval_falls_back() {
        let opts = Options::new([with_output(4, Duration::ZERO, Duration::from_millis(10))])
            .resolve()
            .unwrap();
        let output = opts.output.unwrap();
        assert_eq!(output.buffer_size, 4);
        assert_eq!(output.check_close_interval, DEFAULT_OUTPUT_OPTIONS.check_close_interval);
        assert_eq!(output.timeout_on_send, Duration::from_millis(10));
    }

    #[test]
    fn test_conditional_options() {
        let opts = Options::new([
            if_option(true, with_size(3)),
            if_option(false, with_nonblocking(true)),
            if_option_f(true, || with_max_blocking_tasks(2)),
            if_option_f(false, || panic!("must not be built")),
            if_else_option(false, with_pre_alloc(true), with_disable_purge(true)),
            if_else_option_f(true, || with_input(7), || panic!("must not be built")),
        ]);

        assert_eq!(opts.size, 3);
        assert!(!opts.nonblocking);
        assert_eq!(opts.max_blocking_tasks, 2);
        assert!(!opts.pre_alloc);
        assert!(opts.disable_purge);
        assert_eq!(opts.input, Some(InputOptions { buffer_size: 7 }));
    }

    #[test]
    fn test_default_output_matches_fallback() {
        assert_eq!(OutputOptions::default(), *DEFAULT_OUTPUT_OPTIONS);
        let opts = Options::new([with_default_output()]);
        assert_eq!(opts.output, Some(DEFAULT_OUTPUT_OPTIONS.clone()));
    }
}
