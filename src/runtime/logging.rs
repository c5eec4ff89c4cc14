// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request logging for REST and JSON-RPC calls.
//!
//! Provides structured logging of all API calls with timing, a per-client
//! success/failure tally, and redaction of credentials in logged parameters.
//!
//! # Example
//!
//! ```
//! use xo_api_rs::runtime::{LoggingConfig, LogLevel, RequestLogger};
//!
//! let logger = RequestLogger::with_config(
//!     LoggingConfig::new().with_success_level(LogLevel::Debug),
//! );
//! let span = logger.start("rpc", "xo.getAllObjects");
//! logger.finish_success(span);
//! assert_eq!(logger.metrics().successful_requests(), 1);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, error, info, trace, warn};

/// Log level for request logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Trace level - most verbose.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warn level.
    Warn,
    /// Error level - only errors.
    Error,
    /// Disabled - no logging.
    Off,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::Off => write!(f, "OFF"),
        }
    }
}

fn default_sensitive_keys() -> Vec<String> {
    ["password", "token", "cookie", "authorization", "authenticationtoken"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

/// Configuration for request logging.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level for successful requests.
    pub success_level: LogLevel,
    /// Log level for failed requests.
    pub error_level: LogLevel,
    /// Whether to log request parameters.
    pub log_params: bool,
    /// Whether to redact sensitive keys in parameters and headers.
    pub redact_sensitive: bool,
    /// Keys (case-insensitive) whose values are redacted.
    pub sensitive_keys: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            success_level: LogLevel::Trace,
            error_level: LogLevel::Warn,
            log_params: false,
            redact_sensitive: true,
            sensitive_keys: default_sensitive_keys(),
        }
    }
}

impl LoggingConfig {
    /// Create a new logging configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the success log level.
    #[must_use]
    pub fn with_success_level(mut self, level: LogLevel) -> Self {
        self.success_level = level;
        self
    }

    /// Set the error log level.
    #[must_use]
    pub fn with_error_level(mut self, level: LogLevel) -> Self {
        self.error_level = level;
        self
    }

    /// Enable or disable parameter logging.
    #[must_use]
    pub fn with_params(mut self, enabled: bool) -> Self {
        self.log_params = enabled;
        self
    }

    /// Enable or disable sensitive data redaction.
    #[must_use]
    pub fn with_redaction(mut self, enabled: bool) -> Self {
        self.redact_sensitive = enabled;
        self
    }

    /// Add a sensitive key to redact.
    #[must_use]
    pub fn with_sensitive_key(mut self, key: impl Into<String>) -> Self {
        self.sensitive_keys.push(key.into());
        self
    }

    /// Create a verbose configuration for development.
    #[must_use]
    pub fn verbose() -> Self {
        Self {
            success_level: LogLevel::Debug,
            error_level: LogLevel::Error,
            log_params: true,
            redact_sensitive: true,
            sensitive_keys: default_sensitive_keys(),
        }
    }

    /// Create a quiet configuration for production.
    #[must_use]
    pub fn quiet() -> Self {
        Self {
            success_level: LogLevel::Off,
            error_level: LogLevel::Warn,
            log_params: false,
            redact_sensitive: true,
            sensitive_keys: default_sensitive_keys(),
        }
    }

    /// Whether `key` names a value that must not be logged.
    #[must_use]
    pub fn is_sensitive(&self, key: &str) -> bool {
        self.redact_sensitive && self.sensitive_keys.iter().any(|k| k.eq_ignore_ascii_case(key))
    }

    /// Copy of `value` with sensitive object members replaced by `[REDACTED]`.
    #[must_use]
    pub fn redact(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| {
                        let v = if self.is_sensitive(k) {
                            Value::String("[REDACTED]".to_string())
                        } else {
                            self.redact(v)
                        };
                        (k.clone(), v)
                    })
                    .collect(),
            ),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.redact(v)).collect()),
            other => other.clone(),
        }
    }
}

/// Counters collected by a [`RequestLogger`].
#[derive(Debug, Default)]
pub struct RequestMetrics {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
}

impl RequestMetrics {
    /// Create a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful request.
    pub fn record_success(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed request.
    pub fn record_failure(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the total number of requests.
    #[must_use]
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Get the number of successful requests.
    #[must_use]
    pub fn successful_requests(&self) -> u64 {
        self.successful_requests.load(Ordering::Relaxed)
    }

    /// Get the number of failed requests.
    #[must_use]
    pub fn failed_requests(&self) -> u64 {
        self.failed_requests.load(Ordering::Relaxed)
    }

    /// Get the success rate (0.0 to 1.0).
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        if total == 0 {
            return 1.0;
        }
        let successful = self.successful_requests.load(Ordering::Relaxed);
        successful as f64 / total as f64
    }
}

macro_rules! log_at {
    ($level:expr, $($arg:tt)+) => {
        match $level {
            LogLevel::Trace => trace!(target: "xo_api::request", $($arg)+),
            LogLevel::Debug => debug!(target: "xo_api::request", $($arg)+),
            LogLevel::Info => info!(target: "xo_api::request", $($arg)+),
            LogLevel::Warn => warn!(target: "xo_api::request", $($arg)+),
            LogLevel::Error => error!(target: "xo_api::request", $($arg)+),
            LogLevel::Off => {}
        }
    };
}

/// A request logger that tracks timing and logs outcomes.
#[derive(Debug)]
pub struct RequestLogger {
    config: LoggingConfig,
    metrics: RequestMetrics,
}

impl RequestLogger {
    /// Create a new request logger.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(LoggingConfig::default())
    }

    /// Create a request logger with custom configuration.
    #[must_use]
    pub fn with_config(config: LoggingConfig) -> Self {
        Self {
            config,
            metrics: RequestMetrics::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    /// Get the metrics.
    #[must_use]
    pub fn metrics(&self) -> &RequestMetrics {
        &self.metrics
    }

    /// Start tracking a request on `channel` (`rest`, `rpc`, ...).
    #[must_use]
    pub fn start(&self, channel: &'static str, operation: &str) -> RequestSpan {
        RequestSpan {
            channel,
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    /// Log the parameters of a request, redacted, when enabled.
    pub fn log_params(&self, span: &RequestSpan, params: &Value) {
        if !self.config.log_params {
            return;
        }
        let params = self.config.redact(params);
        log_at!(
            self.config.success_level,
            channel = span.channel,
            "{} params={}",
            span.operation,
            params
        );
    }

    /// Finish tracking a request (success).
    pub fn finish_success(&self, span: RequestSpan) {
        self.metrics.record_success();
        let elapsed = span.start.elapsed();
        log_at!(
            self.config.success_level,
            channel = span.channel,
            "{} completed in {:?}",
            span.operation,
            elapsed
        );
    }

    /// Finish tracking a request (failure).
    pub fn finish_error(&self, span: RequestSpan, error: &dyn fmt::Display) {
        self.metrics.record_failure();
        let elapsed = span.start.elapsed();
        log_at!(
            self.config.error_level,
            channel = span.channel,
            "{} failed in {:?}: {}",
            span.operation,
            elapsed,
            error
        );
    }
}

impl Default for RequestLogger {
    fn default() -> Self {
        Self::new()
    }
}

/// A span representing an in-flight request.
#[derive(Debug)]
pub struct RequestSpan {
    channel: &'static str,
    operation: String,
    start: Instant,
}

impl RequestSpan {
    /// Get the operation name.
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Get the elapsed time since the request started.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Trace.to_string(), "TRACE");
        assert_eq!(LogLevel::Warn.to_string(), "WARN");
        assert_eq!(LogLevel::Off.to_string(), "OFF");
    }

    #[test]
    fn test_logging_config_builder() {
        let config = LoggingConfig::new()
            .with_success_level(LogLevel::Debug)
            .with_error_level(LogLevel::Error)
            .with_params(true)
            .with_redaction(false)
            .with_sensitive_key("x-api-key");

        assert_eq!(config.success_level, LogLevel::Debug);
        assert_eq!(config.error_level, LogLevel::Error);
        assert!(config.log_params);
        assert!(!config.redact_sensitive);
        assert!(config.sensitive_keys.contains(&"x-api-key".to_string()));
    }

    #[test]
    fn test_logging_config_quiet() {
        let config = LoggingConfig::quiet();
        assert_eq!(config.success_level, LogLevel::Off);
        assert!(!config.log_params);
    }

    #[test]
    fn test_redact_nested_credentials() {
        let config = LoggingConfig::default();
        let params = json!({
            "email": "admin@admin.net",
            "password": "secret",
            "nested": [{"Token": "abc", "name": "x"}]
        });

        let redacted = config.redact(&params);
        assert_eq!(redacted["email"], "admin@admin.net");
        assert_eq!(redacted["password"], "[REDACTED]");
        assert_eq!(redacted["nested"][0]["Token"], "[REDACTED]");
        assert_eq!(redacted["nested"][0]["name"], "x");
    }

    #[test]
    fn test_redaction_disabled() {
        let config = LoggingConfig::default().with_redaction(false);
        let params = json!({"password": "secret"});
        assert_eq!(config.redact(&params)["password"], "secret");
    }

    #[test]
    fn test_request_metrics() {
        let metrics = RequestMetrics::new();
        assert_eq!(metrics.success_rate(), 1.0);

        metrics.record_success();
        metrics.record_success();
        metrics.record_failure();

        assert_eq!(metrics.total_requests(), 3);
        assert_eq!(metrics.successful_requests(), 2);
        assert_eq!(metrics.failed_requests(), 1);
        assert!((metrics.success_rate() - 0.666_666_666_666_666_6).abs() < 0.001);
    }

    #[test]
    fn test_request_logger() {
        let logger = RequestLogger::new();
        let span = logger.start("rest", "GET /rest/v0/vms");

        assert_eq!(span.operation(), "GET /rest/v0/vms");
        assert!(span.elapsed() < std::time::Duration::from_secs(1));

        logger.finish_success(span);
        assert_eq!(logger.metrics().total_requests(), 1);
        assert_eq!(logger.metrics().successful_requests(), 1);
    }

    #[test]
    fn test_request_logger_error() {
        let logger = RequestLogger::with_config(LoggingConfig::quiet());
        let span = logger.start("rpc", "session.signIn");

        logger.finish_error(span, &"invalid credentials");
        assert_eq!(logger.metrics().failed_requests(), 1);
    }
}
