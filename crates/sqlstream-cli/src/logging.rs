//! Structured logging for the sqlstream CLI
//!
//! Console output goes to stderr so that stdout carries only query results.
//! Log files rotate daily.
//!
//! ```bash
//! # pushdown decisions and compiled statements
//! RUST_LOG=sqlstream_engine=debug sqlstream explain query.json
//!
//! # JSON to file
//! LOG_FORMAT=json LOG_OUTPUT=file LOG_DIR=/var/log/sqlstream sqlstream run query.json
//! ```

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{ConfigError, LoggingConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, multi-line
    Pretty,
    /// One JSON object per event
    Json,
    Compact,
}

impl LogFormat {
    pub fn from_name(name: &str) -> Self {
        match name {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stderr,
    File,
    Both,
}

impl LogOutput {
    pub fn from_name(name: &str) -> Self {
        match name {
            "file" => LogOutput::File,
            "both" => LogOutput::Both,
            _ => LogOutput::Stderr,
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

fn file_layer<S>(config: &LoggingConfig) -> Result<Box<dyn Layer<S> + Send + Sync>, ConfigError>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    std::fs::create_dir_all(&config.directory)?;
    let appender = RollingFileAppender::new(Rotation::DAILY, &config.directory, "sqlstream.log");
    Ok(fmt::layer().with_writer(appender).with_ansi(false).boxed())
}

/// Install the global subscriber.
pub fn init(config: &LoggingConfig) -> Result<(), ConfigError> {
    let format = LogFormat::from_name(&config.format);
    let output = LogOutput::from_name(&config.output);

    let env_filter = EnvFilter::try_new(&config.level)?;

    let registry = tracing_subscriber::registry().with(env_filter);
    match output {
        LogOutput::Stderr => registry.with(console_layer(format)).init(),
        LogOutput::File => registry.with(file_layer(config)?).init(),
        LogOutput::Both => registry
            .with(console_layer(format))
            .with(file_layer(config)?)
            .init(),
    }

    tracing::debug!(?format, ?output, level = %config.level, "Logging initialized");
    Ok(())
}
