// Logging for colony
//
// The engine reports through `tracing`. This module installs a subscriber for
// applications that have none, with presets for development, production and
// tests.
//
// # Usage Examples
//
// ```rust
// use colony::logging;
//
// // INFO level, console output
// logging::init_default();
//
// // or a custom configuration
// let config = logging::LogConfig {
//     level: tracing::Level::DEBUG,
//     target_filters: Some("colony::engine=trace".to_string()),
//     ..Default::default()
// };
// logging::init(config);
//
// // pool-scoped spans and lifecycle events
// let span = colony::pool_span!("resize-images");
// let _guard = span.enter();
// colony::log_lifecycle!("resize-images", "released");
// ```

use std::io;
use std::sync::Once;

use tracing::{Level, Subscriber};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Configuration of the installed subscriber.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Whether to use JSON format for logs
    pub json_format: bool,
    /// Whether to include file and line information
    pub show_file_line: bool,
    /// Whether to include thread name/id
    pub show_thread_info: bool,
    /// Whether to include timestamps
    pub show_time: bool,
    /// Target filter expressions (format: "target=level,target2=level2,...")
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_file_line: true,
            show_thread_info: true,
            show_time: true,
            target_filters: None,
        }
    }
}

static INIT: Once = Once::new();

impl LogConfig {
    /// DEBUG for the crate, TRACE for the engine internals.
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            target_filters: Some("colony=debug,colony::engine=trace".to_string()),
            ..Default::default()
        }
    }

    /// INFO as JSON, without source locations.
    pub fn production() -> Self {
        Self {
            json_format: true,
            show_file_line: false,
            ..Default::default()
        }
    }

    /// WARN and above, compact.
    pub fn test() -> Self {
        Self {
            level: Level::WARN,
            show_thread_info: false,
            show_time: false,
            ..Default::default()
        }
    }

    fn env_filter(&self) -> EnvFilter {
        let mut env_filter = EnvFilter::from_default_env().add_directive(self.level.into());
        if let Some(filters) = &self.target_filters {
            for filter in filters.split(',') {
                if let Ok(directive) = filter.trim().parse() {
                    env_filter = env_filter.add_directive(directive);
                }
            }
        }
        env_filter
    }
}

/// Installs the global subscriber described by `config`.
///
/// Only the first call of this module's initialisers takes effect.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let registry = tracing_subscriber::registry().with(config.env_filter());

        let subscriber: Box<dyn Subscriber + Send + Sync> = match (config.json_format, config.show_time) {
            (true, _) => Box::new(registry.with(fmt::layer().json().flatten_event(true))),
            (false, true) => Box::new(registry.with(
                fmt::layer()
                    .with_ansi(atty::is(atty::Stream::Stdout))
                    .with_file(config.show_file_line)
                    .with_line_number(config.show_file_line)
                    .with_thread_names(config.show_thread_info)
                    .with_thread_ids(config.show_thread_info),
            )),
            (false, false) => Box::new(registry.with(
                fmt::layer()
                    .without_time()
                    .with_ansi(atty::is(atty::Stream::Stdout))
                    .with_file(config.show_file_line)
                    .with_line_number(config.show_file_line)
                    .with_thread_names(config.show_thread_info)
                    .with_thread_ids(config.show_thread_info),
            )),
        };

        set_global_subscriber(subscriber);
    });
}

/// Installs a subscriber writing to the console and appending to `log_file`.
///
/// # Errors
/// Returns an error if `log_file` cannot be opened.
pub fn init_with_file(config: LogConfig, log_file: &str) -> io::Result<()> {
    // fail early rather than from inside the writer
    file_writer(log_file)?;

    INIT.call_once(|| {
        let console_layer = fmt::layer()
            .with_ansi(atty::is(atty::Stream::Stdout))
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .with_thread_names(config.show_thread_info)
            .with_thread_ids(config.show_thread_info);

        let path = log_file.to_string();
        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(move || match file_writer(&path) {
                Ok(writer) => writer,
                Err(_) => Box::new(io::stderr()),
            })
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .with_thread_ids(true);

        let subscriber = tracing_subscriber::registry()
            .with(config.env_filter())
            .with(console_layer)
            .with(file_layer);

        set_global_subscriber(subscriber);
    });

    Ok(())
}

/// Opens `path` for appending, creating it if needed.
pub fn file_writer(path: &str) -> io::Result<Box<dyn io::Write + Send + Sync + 'static>> {
    let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Box::new(file))
}

pub fn init_default() {
    init(LogConfig::default());
}

pub fn init_development() {
    init(LogConfig::development());
}

pub fn init_production() {
    init(LogConfig::production());
}

/// Keeps test output to warnings and errors.
pub fn init_test() {
    init(LogConfig::test());
}

fn set_global_subscriber<S>(subscriber: S)
where
    S: Subscriber + Send + Sync + 'static,
{
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error setting global tracing subscriber: {}", err);
    }
}

/// Span scoping work done on behalf of a named pool.
///
/// ```rust,ignore
/// let span = colony::pool_span!("thumbnails", size = 8);
/// let _guard = span.enter();
/// ```
#[macro_export]
macro_rules! pool_span {
    ($pool:expr) => {
        tracing::info_span!("pool", name = $pool)
    };
    ($pool:expr, $($fields:tt)*) => {
        tracing::info_span!("pool", name = $pool, $($fields)*)
    };
}

/// Logs a pool lifecycle event (created, released, rebooted, concluded).
#[macro_export]
macro_rules! log_lifecycle {
    ($pool:expr, $event:expr) => {
        tracing::info!(pool = $pool, event = $event)
    };
    ($pool:expr, $event:expr, $($fields:tt)*) => {
        tracing::info!(pool = $pool, event = $event, $($fields)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let dev = LogConfig::development();
        assert_eq!(dev.level, Level::DEBUG);
        assert!(dev.target_filters.unwrap().contains("colony::engine=trace"));

        let prod = LogConfig::production();
        assert!(prod.json_format);
        assert!(!prod.show_file_line);

        let test = LogConfig::test();
        assert_eq!(test.level, Level::WARN);
        assert!(!test.show_time);
    }

    #[test]
    fn test_init_is_idempotent() {
        init_test();
        init_default();
        tracing::info!("still one subscriber");
    }
}
