use tracing::Level;

/// Settings for the process-wide `tracing` subscriber.
///
/// **Fields**
/// - `max_level`: most verbose level that is printed. Worker lifecycle
///   events are `INFO`, failed delivery attempts `DEBUG`, isolated
///   destination faults `ERROR`.
/// - `with_target`: print the event target (module path).
/// - `ansi`: colorize output.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub max_level: Level,
    pub with_target: bool,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            max_level: Level::INFO,
            with_target: true,
            ansi: true,
        }
    }
}

/// Error type returned when a global subscriber is already installed.
#[derive(thiserror::Error, Debug)]
#[error("failed to install tracing subscriber: {0}")]
pub struct InitError(String);

/// Install a `tracing_subscriber::fmt` subscriber as the global default.
///
/// This makes the reports of a
/// [`TracingReporter`](crate::report::TracingReporter) and the worker's
/// lifecycle events visible on stdout. Applications that already configure
/// `tracing` themselves should skip this.
///
/// **Returns**
/// - `Err(..)` if a global subscriber was installed before.
pub fn init_tracing_with_config(config: LoggingConfig) -> Result<(), InitError> {
    tracing_subscriber::fmt()
        .with_max_level(config.max_level)
        .with_target(config.with_target)
        .with_ansi(config.ansi)
        .try_init()
        .map_err(|e| InitError(e.to_string()))
}

/// Initialize tracing with sensible defaults.
///
/// Equivalent to calling [`init_tracing_with_config`] with
/// [`LoggingConfig::default`].
pub fn init_tracing() -> Result<(), InitError> {
    init_tracing_with_config(LoggingConfig::default())
}
