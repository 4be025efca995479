//! Logging setup on top of `tracing`.
//!
//! One formatting layer is built from a [`LogConfig`] and installed on the
//! global registry. Writers are non-blocking; keep the returned guard alive
//! until exit so buffered lines are flushed.

use crate::compiler::frontend::config::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::Level;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line format
    Pretty,
    /// One line per event
    #[default]
    Compact,
    /// JSON format for structured logging
    Json,
}

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// File with daily rotation
    File { directory: String, prefix: String },
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Emit span open/close events
    pub span_events: bool,
    /// Extra filter directives, e.g. `typsubst=trace`
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
            span_events: false,
            filter: None,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `[logging]` section of a config file. An unknown level
    /// keeps the default.
    pub fn from_settings(settings: &LoggingConfig) -> Self {
        let mut config = Self::new()
            .with_format(settings.format)
            .with_span_events(settings.span_events);
        if let Ok(level) = settings.level.parse::<Level>() {
            config = config.with_level(level);
        }
        if let Some(filter) = &settings.filter {
            config = config.with_filter(filter.clone());
        }
        if let Some(directory) = &settings.directory {
            config = config.with_output(LogOutput::File {
                directory: directory.to_string_lossy().to_string(),
                prefix: "typsubst".to_string(),
            });
        }
        config
    }

    /// Pretty debug output on stderr with span events and crate-level tracing.
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::Pretty,
            output: LogOutput::Stderr,
            span_events: true,
            filter: Some("typsubst=trace".to_string()),
        }
    }

    /// JSON lines into a daily-rotated file under `log_dir`.
    pub fn production(log_dir: impl AsRef<Path>) -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Json,
            output: LogOutput::File {
                directory: log_dir.as_ref().to_string_lossy().to_string(),
                prefix: "typsubst".to_string(),
            },
            span_events: false,
            filter: Some("typsubst=info".to_string()),
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// Initialize the global logging system.
///
/// Returns `None` when a global subscriber is already installed.
pub fn init_logging(config: LogConfig) -> Option<WorkerGuard> {
    let filter = build_filter(&config);

    let (writer, guard) = match &config.output {
        LogOutput::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogOutput::Stderr => tracing_appender::non_blocking(std::io::stderr()),
        LogOutput::File { directory, prefix } => {
            tracing_appender::non_blocking(rolling::daily(directory, prefix))
        }
    };
    let ansi = !matches!(config.output, LogOutput::File { .. });
    let spans = span_events_config(config.span_events);

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Pretty => fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .pretty()
            .with_span_events(spans)
            .with_filter(filter)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .compact()
            .with_span_events(spans)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .with_writer(writer)
            .json()
            .with_span_events(spans)
            .with_filter(filter)
            .boxed(),
    };

    match tracing_subscriber::registry().with(layer).try_init() {
        Ok(()) => Some(guard),
        Err(_) => None,
    }
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let base_filter = EnvFilter::from_default_env().add_directive(config.level.into());

    match &config.filter {
        Some(filter_str) => filter_str
            .split(',')
            .filter(|directive| !directive.trim().is_empty())
            .fold(base_filter, |filter, directive| {
                filter.add_directive(directive.trim().parse().unwrap_or_else(|_| {
                    tracing::warn!("Invalid filter directive: {}", directive);
                    config.level.into()
                }))
            }),
        None => base_filter,
    }
}

fn span_events_config(enabled: bool) -> FmtSpan {
    if enabled {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

/// Initialize logging with defaults for development
pub fn init_dev_logging() -> Option<WorkerGuard> {
    init_logging(LogConfig::development())
}

/// Initialize logging with defaults for production
pub fn init_prod_logging(log_dir: impl AsRef<Path>) -> Option<WorkerGuard> {
    init_logging(LogConfig::production(log_dir))
}
