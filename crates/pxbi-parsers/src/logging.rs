//! Logging and tracing utilities for the PXBI decoders
//!
//! Structured logging goes through the `tracing` crate. The subscriber
//! helpers here are meant for binaries; the library itself only emits events.

use std::sync::atomic::{AtomicBool, Ordering};

/// Whether tracing has been initialized
static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

const DEFAULT_FILTER: &str = "warn,pxbi=info,pxbi_parsers=info,pxbi_export=info";

/// Initialize the default tracing subscriber
///
/// Multiple calls are safe; only the first one installs a subscriber.
pub fn init_default() {
    if TRACING_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
        .is_ok()
    {
        #[cfg(feature = "tracing")]
        {
            use tracing_subscriber::{fmt, prelude::*, EnvFilter};

            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

            let _ = tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(filter)
                .try_init();
        }
    }
}

/// Initialize tracing with a custom configuration
#[cfg(feature = "tracing")]
pub fn init_with_config(config: &TracingConfig) {
    if TRACING_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
        .is_ok()
    {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.default_level));

        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.show_target)
            .with_thread_ids(config.show_thread_ids)
            .with_file(config.show_file)
            .with_line_number(config.show_line_number);

        let _ = tracing_subscriber::registry()
            .with(fmt_layer)
            .with(filter)
            .try_init();
    }
}

/// Configuration for tracing initialization
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Default log level filter (e.g., "info", "debug", "warn")
    pub default_level: String,
    /// Show the target (module path) in log output
    pub show_target: bool,
    /// Show thread IDs in log output
    pub show_thread_ids: bool,
    /// Show source file in log output
    pub show_file: bool,
    /// Show line number in log output
    pub show_line_number: bool,
}

impl TracingConfig {
    /// Configuration for a `-v` count as used by command-line tools
    pub fn for_verbosity(verbosity: u8) -> Self {
        let default_level = match verbosity {
            0 => DEFAULT_FILTER.to_string(),
            1 => "info".to_string(),
            2 => "debug".to_string(),
            _ => "trace".to_string(),
        };

        Self {
            default_level,
            show_target: verbosity >= 2,
            show_thread_ids: verbosity >= 3,
            show_file: verbosity >= 3,
            show_line_number: verbosity >= 3,
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: DEFAULT_FILTER.to_string(),
            show_target: true,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
        }
    }
}

/// Log the start of a file decode
#[macro_export]
macro_rules! log_parse_start {
    ($parser:expr, $path:expr) => {
        tracing::info!(
            parser = %$parser,
            path = %$path.display(),
            "Starting parse"
        );
    };
}

/// Log a finished decode with its duration and item count
#[macro_export]
macro_rules! log_parse_complete {
    ($parser:expr, $duration:expr, $items:expr) => {
        tracing::info!(
            parser = %$parser,
            duration_ms = %$duration.as_millis(),
            items = %$items,
            "Parse complete"
        );
    };
}

/// Log a failed decode
#[macro_export]
macro_rules! log_parse_error {
    ($parser:expr, $error:expr) => {
        tracing::error!(
            parser = %$parser,
            error = %$error,
            "Parse failed"
        );
    };
}

/// Instrument a parsing operation with a span and timing
pub fn instrument_parse<T, F>(name: &str, f: F) -> T
where
    F: FnOnce() -> T,
{
    let span = tracing::info_span!("parse", parser = %name);
    let _guard = span.enter();

    let start = std::time::Instant::now();
    let result = f();
    let duration = start.elapsed();

    tracing::debug!(duration_ms = %duration.as_millis(), "Parse operation complete");

    result
}
