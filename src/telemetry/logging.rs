//! Structured logging setup.
//!
//! Console output goes to stderr so stdout stays reserved for replies. An optional
//! daily-rolling file layer writes through a non-blocking appender; keep the returned
//! [`LoggingGuard`] alive until exit or buffered lines are lost.

use crate::error::MenuAgentError;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{format::FmtSpan, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Log file name prefix; the appender adds the date
pub const LOG_FILE_NAME: &str = "menu-agent.log";

/// Targets that are noisy at debug level
const QUIET_TARGETS: &[&str] = &["hyper=warn", "h2=warn", "reqwest=warn", "tokio=warn"];

/// Writer that moves timestamp, source location and level to the front of JSON lines
struct SourceLocationFirstWriter<W> {
    inner: W,
}

impl<W: Write> Write for SourceLocationFirstWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let reordered = std::str::from_utf8(buf)
            .ok()
            .map(str::trim)
            .filter(|line| line.starts_with('{') && line.ends_with('}'))
            .and_then(|line| {
                serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(line).ok()
            })
            .map(|mut fields| {
                let mut ordered = serde_json::Map::new();
                for key in ["timestamp", "filename", "line_number", "target", "level"] {
                    if let Some(value) = fields.remove(key) {
                        ordered.insert(key.to_string(), value);
                    }
                }
                ordered.extend(fields);
                ordered
            });

        match reordered.and_then(|fields| serde_json::to_string(&fields).ok()) {
            Some(line) => {
                self.inner.write_all(format!("{}\n", line).as_bytes())?;
                // the caller's buffer was consumed in full
                Ok(buf.len())
            }
            None => self.inner.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<'a, W> MakeWriter<'a> for SourceLocationFirstWriter<W>
where
    W: MakeWriter<'a>,
{
    type Writer = SourceLocationFirstWriter<W::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SourceLocationFirstWriter {
            inner: self.inner.make_writer(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for rolling log files; no file output when unset
    pub log_dir: Option<PathBuf>,
    /// Filter directive for the file layer
    pub file_log_level: String,
    /// Filter directive for the console layer
    pub console_log_level: String,
    pub console_enabled: bool,
    /// Write the file layer as JSON lines
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            file_log_level: "info".to_string(),
            console_log_level: "warn".to_string(),
            console_enabled: true,
            json_format: true,
        }
    }
}

impl LoggingConfig {
    /// Defaults overridden by `MENU_AGENT_LOG_*` variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `MENU_AGENT_LOG_*` variables that are set
    pub fn apply_env(&mut self) {
        if let Ok(log_dir) = std::env::var("MENU_AGENT_LOG_DIR") {
            self.log_dir = Some(PathBuf::from(log_dir));
        }

        if let Ok(level) = std::env::var("MENU_AGENT_LOG_FILE_LEVEL") {
            self.file_log_level = level;
        }

        if let Ok(level) = std::env::var("MENU_AGENT_LOG_LEVEL") {
            self.console_log_level = level;
        }

        if let Ok(enabled) = std::env::var("MENU_AGENT_LOG_CONSOLE") {
            self.console_enabled = enabled.parse().unwrap_or(true);
        }

        if let Ok(json) = std::env::var("MENU_AGENT_LOG_JSON") {
            self.json_format = json.parse().unwrap_or(true);
        }
    }
}

/// Keeps the non-blocking file writer flushing; drop it last
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

impl std::fmt::Debug for LoggingGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingGuard")
            .field("file_logging", &self._file_guard.is_some())
            .finish()
    }
}

fn build_filter(level: &str, fallback: &str) -> EnvFilter {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(fallback));
    QUIET_TARGETS
        .iter()
        .filter_map(|directive| directive.parse().ok())
        .fold(filter, EnvFilter::add_directive)
}

/// Install the global subscriber
///
/// Fails if the log directory cannot be created or a subscriber is already set.
pub fn init_logging(config: LoggingConfig) -> Result<LoggingGuard, MenuAgentError> {
    let console_layer = config.console_enabled.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::NONE)
            .with_target(true)
            .with_filter(build_filter(&config.console_log_level, "warn"))
    });

    let mut file_guard = None;
    let file_layer = match &config.log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir).map_err(|e| {
                MenuAgentError::configuration_error(format!(
                    "Failed to create log directory {}: {}",
                    log_dir.display(),
                    e
                ))
            })?;

            let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
            file_guard = Some(guard);

            let timer = tracing_subscriber::fmt::time::ChronoUtc::new(
                "%Y-%m-%d %H:%M:%S%.3f UTC".to_string(),
            );
            let filter = build_filter(&config.file_log_level, "info");
            let layer = if config.json_format {
                tracing_subscriber::fmt::layer()
                    .with_writer(SourceLocationFirstWriter { inner: file_writer })
                    .with_ansi(false)
                    .with_timer(timer)
                    .with_file(true)
                    .with_line_number(true)
                    .with_target(true)
                    .json()
                    .with_current_span(true)
                    .with_filter(filter)
                    .boxed()
            } else {
                tracing_subscriber::fmt::layer()
                    .with_writer(file_writer)
                    .with_ansi(false)
                    .with_timer(timer)
                    .with_file(true)
                    .with_line_number(true)
                    .with_target(true)
                    .with_filter(filter)
                    .boxed()
            };
            Some(layer)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| {
            MenuAgentError::configuration_error(format!("Failed to install logger: {}", e))
        })?;

    info!(
        log_dir = ?config.log_dir,
        json_format = config.json_format,
        "Logging initialized"
    );

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}
