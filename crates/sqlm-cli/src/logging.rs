//! Structured logging for the sqlm CLI
//!
//! Console output goes to stderr so stdout stays clean JSON. File output
//! rotates daily under the configured directory.

use thiserror::Error;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Cannot create log directory '{directory}': {source}")]
    Directory {
        directory: String,
        source: std::io::Error,
    },

    #[error("Cannot open log file: {0}")]
    Appender(#[from] InitError),

    #[error("Logging already initialized: {0}")]
    Install(#[from] TryInitError),
}

/// Log format configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format for development
    Pretty,
    /// JSON format for log shipping
    Json,
    /// Single-line format, the default
    Compact,
}

impl LogFormat {
    pub fn parse(name: &str) -> Self {
        match name {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Compact,
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// Log to stderr only
    Console,
    /// Log to file only
    File,
    /// Log to both stderr and file
    Both,
}

impl LogOutput {
    pub fn parse(name: &str) -> Self {
        match name {
            "file" => LogOutput::File,
            "both" => LogOutput::Both,
            _ => LogOutput::Console,
        }
    }
}

fn console_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .boxed(),
    }
}

fn file_layer<S>(directory: &str) -> Result<Box<dyn Layer<S> + Send + Sync>, LoggingError>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    std::fs::create_dir_all(directory).map_err(|source| LoggingError::Directory {
        directory: directory.to_string(),
        source,
    })?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("sqlm.log")
        .build(directory)?;
    Ok(fmt::layer().with_writer(appender).with_ansi(false).boxed())
}

/// Initialize the logging system
///
/// `RUST_LOG` wins over the configured level when set.
///
/// ```bash
/// RUST_LOG=sqlm_duck=debug LOG_FORMAT=pretty sqlm list users age[gt]=18
/// LOG_OUTPUT=file LOG_DIR=/var/log/sqlm sqlm init
/// ```
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let format = LogFormat::parse(&config.format);
    let output = LogOutput::parse(&config.output);

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match output {
        LogOutput::Console => registry.with(console_layer(format)).try_init()?,
        LogOutput::File => registry.with(file_layer(&config.directory)?).try_init()?,
        LogOutput::Both => registry
            .with(console_layer(format))
            .with(file_layer(&config.directory)?)
            .try_init()?,
    }

    tracing::debug!(format = ?format, output = ?output, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("compact"), LogFormat::Compact);
        assert_eq!(LogFormat::parse("fancy"), LogFormat::Compact);
    }

    #[test]
    fn test_log_output_parse() {
        assert_eq!(LogOutput::parse("file"), LogOutput::File);
        assert_eq!(LogOutput::parse("both"), LogOutput::Both);
        assert_eq!(LogOutput::parse("console"), LogOutput::Console);
        assert_eq!(LogOutput::parse(""), LogOutput::Console);
    }

    #[test]
    fn test_unusable_log_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("logs");
        std::fs::write(&blocker, "not a directory").unwrap();

        let result = file_layer::<tracing_subscriber::Registry>(blocker.to_str().unwrap());
        assert!(matches!(result, Err(LoggingError::Directory { .. })));

        let usable = dir.path().join("nested").join("logs");
        assert!(file_layer::<tracing_subscriber::Registry>(usable.to_str().unwrap()).is_ok());
        assert!(usable.is_dir());
    }
}
