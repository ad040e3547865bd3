use std::path::PathBuf;
use std::sync::Mutex;

use snafu::ResultExt;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;
use tracing_subscriber::layer::SubscriberExt;

pub use crate::logging::error::LogError;
use crate::logging::error::*;

mod error;

pub struct LoggingConfig {
    pub log_file: Option<PathBuf>,
    pub stderr: bool,
    /// Default level; `RUST_LOG` directives take precedence.
    pub level: Level,
}

impl LoggingConfig {
    pub fn new(log_file: Option<PathBuf>, stderr: bool, level: Level) -> Self {
        Self {
            log_file,
            stderr,
            level,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new(None, true, Level::INFO)
    }
}

pub fn init(config: LoggingConfig) -> Result<(), LogError> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(config.level.into())
        .from_env()
        .context(FilterSnafu {
            directive: std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default(),
        })?;
    let subscriber = Registry::default().with(env_filter);

    let file_layer = if let Some(log_file) = config.log_file {
        let log_file = std::fs::File::create(log_file).context(LogFileSnafu)?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        )
    } else {
        None
    };
    let subscriber = subscriber.with(file_layer);

    let stderr_layer = if config.stderr {
        Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    } else {
        None
    };
    let subscriber = subscriber.with(stderr_layer);

    tracing::subscriber::set_global_default(subscriber).context(SetGlobalDefaultSnafu)?;
    Ok(())
}
