//! Tracing subscriber setup.
//!
//! The library only emits `tracing` events; applications decide where they
//! go. [`init_subscriber`] installs a `tracing-subscriber` fmt layer for the
//! common cases.
//!
//! ```rust,ignore
//! use chatstream::observability::{init_subscriber, OutputFormat, SubscriberConfig};
//!
//! let config = SubscriberConfig::builder()
//!     .log_level(tracing::Level::DEBUG)
//!     .output_format(OutputFormat::Json)
//!     .build();
//! init_subscriber(config)?;
//! ```

use crate::error::{ChatError, Result};
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the configured log level.
pub const LOG_LEVEL_ENV: &str = "CHATSTREAM_LOG_LEVEL";
/// Environment variable selecting the output format (text, json, json-compact).
pub const LOG_FORMAT_ENV: &str = "CHATSTREAM_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON, one object per line
    Json,
    /// JSON without span lists
    JsonCompact,
}

/// Configuration for the tracing subscriber
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    pub log_level: tracing::Level,
    pub output_format: OutputFormat,
    /// Apply the level to every crate, not only `chatstream`.
    pub global: bool,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            log_level: tracing::Level::INFO,
            output_format: OutputFormat::Text,
            global: false,
        }
    }
}

impl SubscriberConfig {
    pub fn builder() -> SubscriberConfigBuilder {
        SubscriberConfigBuilder::default()
    }

    pub fn debug() -> Self {
        Self {
            log_level: tracing::Level::DEBUG,
            ..Default::default()
        }
    }

    pub fn production() -> Self {
        Self {
            log_level: tracing::Level::WARN,
            output_format: OutputFormat::Json,
            global: false,
        }
    }

    /// Filter directive for this configuration.
    pub fn filter_directive(&self) -> String {
        let level = level_name(self.log_level);
        if self.global {
            level.to_string()
        } else {
            format!("chatstream={level}")
        }
    }
}

#[derive(Debug, Default)]
pub struct SubscriberConfigBuilder {
    log_level: Option<tracing::Level>,
    output_format: Option<OutputFormat>,
    global: Option<bool>,
}

impl SubscriberConfigBuilder {
    pub fn log_level(mut self, level: tracing::Level) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Set the log level from a string
    pub fn log_level_str(mut self, level: &str) -> Result<Self> {
        self.log_level = Some(parse_level(level)?);
        Ok(self)
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    pub fn global(mut self, global: bool) -> Self {
        self.global = Some(global);
        self
    }

    pub fn build(self) -> SubscriberConfig {
        SubscriberConfig {
            log_level: self.log_level.unwrap_or(tracing::Level::INFO),
            output_format: self.output_format.unwrap_or_default(),
            global: self.global.unwrap_or(false),
        }
    }
}

fn parse_level(level: &str) -> Result<tracing::Level> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Ok(tracing::Level::TRACE),
        "debug" => Ok(tracing::Level::DEBUG),
        "info" => Ok(tracing::Level::INFO),
        "warn" => Ok(tracing::Level::WARN),
        "error" => Ok(tracing::Level::ERROR),
        _ => Err(ChatError::Config(format!(
            "Invalid log level: {level}. Valid options: trace, debug, info, warn, error"
        ))),
    }
}

fn parse_format(format: &str) -> Result<OutputFormat> {
    match format.trim().to_lowercase().as_str() {
        "text" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        "json-compact" => Ok(OutputFormat::JsonCompact),
        _ => Err(ChatError::Config(format!(
            "Invalid log format: {format}. Valid options: text, json, json-compact"
        ))),
    }
}

fn level_name(level: tracing::Level) -> &'static str {
    match level {
        tracing::Level::TRACE => "trace",
        tracing::Level::DEBUG => "debug",
        tracing::Level::INFO => "info",
        tracing::Level::WARN => "warn",
        tracing::Level::ERROR => "error",
    }
}

/// Install a global fmt subscriber.
///
/// `RUST_LOG`, when set, replaces the configured filter. A subscriber that
/// is already installed is left in place.
pub fn init_subscriber(config: SubscriberConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directive()));

    let init_result = match config.output_format {
        OutputFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init(),
        OutputFormat::JsonCompact => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .with_span_list(false)
            .try_init(),
        OutputFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
    };

    match init_result {
        Ok(()) => Ok(()),
        Err(e) => {
            let msg = e.to_string();
            if msg.contains("already been set") || msg.contains("already initialized") {
                Ok(())
            } else {
                Err(ChatError::Config(format!("Failed to initialize tracing: {e}")))
            }
        }
    }
}

/// Initialize from `CHATSTREAM_LOG_LEVEL` / `CHATSTREAM_LOG_FORMAT`.
pub fn init_from_env() -> Result<()> {
    let mut builder = SubscriberConfig::builder();
    if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
        builder = builder.log_level_str(&level)?;
    }
    if let Ok(format) = std::env::var(LOG_FORMAT_ENV) {
        builder = builder.output_format(parse_format(&format)?);
    }
    init_subscriber(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_levels_and_formats() {
        let cfg = SubscriberConfig::builder()
            .log_level_str("DEBUG")
            .unwrap()
            .output_format(parse_format("json-compact").unwrap())
            .build();
        assert_eq!(cfg.log_level, tracing::Level::DEBUG);
        assert_eq!(cfg.output_format, OutputFormat::JsonCompact);
        assert!(matches!(
            SubscriberConfig::builder().log_level_str("loud"),
            Err(ChatError::Config(_))
        ));
        assert!(parse_format("xml").is_err());
    }

    #[test]
    fn filter_is_scoped_to_the_crate_unless_global() {
        assert_eq!(SubscriberConfig::debug().filter_directive(), "chatstream=debug");
        let global = SubscriberConfig::builder().global(true).build();
        assert_eq!(global.filter_directive(), "info");
    }
}
