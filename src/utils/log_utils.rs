//! Logging setup for the application

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Log levels for controlling verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Normal execution, no verbose flag
    Normal = 0,
    /// Info level, one verbose flag (-v)
    Info = 1,
    /// Debug level, two verbose flags (-v -v)
    Debug = 2,
}

impl LogLevel {
    #[must_use]
    pub fn from_verbosity(verbosity: u8) -> Self {
        match verbosity {
            0 => LogLevel::Normal,
            1 => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }

    #[must_use]
    pub fn as_tracing_level(self) -> Level {
        match self {
            LogLevel::Normal => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
        }
    }
}

/// Install the global subscriber. Output goes to stderr so command results
/// on stdout stay machine-readable. `RUST_LOG` overrides the verbosity.
pub fn init(verbosity: u8) {
    let level = LogLevel::from_verbosity(verbosity).as_tracing_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));

    // A second init (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
