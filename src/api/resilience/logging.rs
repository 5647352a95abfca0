//! Structured logging with correlation tracking for API operations
//!
//! Every logical call gets a correlation id; request, response, retry and
//! completion events are emitted as single-line JSON through the `log` facade.

use super::config::{LogLevel, MonitoringConfig};
use crate::api::error::ApiError;
use crate::api::models::{HttpMethod, RequestAttempt};
use log::{debug, error, info, warn};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

const REDACTED: &str = "[REDACTED]";

/// Structured logger for API operations
#[derive(Debug, Clone)]
pub struct ApiLogger {
    config: MonitoringConfig,
}

/// Context for a single logical call
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub correlation_id: String,
    pub method: HttpMethod,
    pub path: String,
    pub start_time: Instant,
}

/// Outcome summary of a logical call
#[derive(Debug, Clone)]
pub struct OperationMetrics {
    pub duration: Duration,
    pub attempts: u32,
    pub retry_delays: Vec<Duration>,
    pub reauthenticated: bool,
    pub success: bool,
    pub status_code: Option<u16>,
    pub error_label: Option<String>,
}

impl ApiLogger {
    pub fn new(config: MonitoringConfig) -> Self {
        Self { config }
    }

    pub fn start_operation(&self, method: HttpMethod, path: &str) -> OperationContext {
        let context = OperationContext {
            correlation_id: uuid::Uuid::new_v4().to_string(),
            method,
            path: path.to_string(),
            start_time: Instant::now(),
        };

        if self.config.request_logging && self.should_log(LogLevel::Debug) {
            let log_data = json!({
                "event": "operation_started",
                "correlation_id": context.correlation_id,
                "method": context.method.as_str(),
                "path": context.path,
                "timestamp": chrono::Utc::now().to_rfc3339()
            });
            debug!("API Operation Started: {}", log_data);
        }

        context
    }

    /// Log an outgoing attempt. Credentials in headers are redacted.
    pub fn log_request(&self, context: &OperationContext, attempt: &RequestAttempt, headers: &[(String, String)]) {
        if !self.config.request_logging || !self.should_log(LogLevel::Debug) {
            return;
        }

        let log_data = json!({
            "event": "http_request",
            "correlation_id": context.correlation_id,
            "method": attempt.method.as_str(),
            "path": attempt.path,
            "attempt": attempt.attempt_number,
            "headers": sanitize_headers(headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        debug!("HTTP Request: {}", log_data);
    }

    pub fn log_response(&self, context: &OperationContext, attempt: &RequestAttempt, status_code: u16, headers: &HashMap<String, String>) {
        if !self.config.request_logging {
            return;
        }

        let log_data = json!({
            "event": "http_response",
            "correlation_id": context.correlation_id,
            "path": context.path,
            "attempt": attempt.attempt_number,
            "status_code": status_code,
            "duration_ms": attempt.started_at.elapsed().as_millis() as u64,
            "headers": sanitize_headers(headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        if status_code >= 400 {
            if self.should_log(LogLevel::Warn) {
                warn!("HTTP Response (Error): {}", log_data);
            }
        } else if self.should_log(LogLevel::Debug) {
            debug!("HTTP Response: {}", log_data);
        }
    }

    pub fn log_retry(&self, context: &OperationContext, attempt: &RequestAttempt, error: &ApiError, delay: Duration) {
        if !self.should_log(LogLevel::Warn) {
            return;
        }

        let log_data = json!({
            "event": "retry_attempt",
            "correlation_id": context.correlation_id,
            "path": context.path,
            "attempt": attempt.attempt_number,
            "label": error.label.as_str(),
            "status": error.status,
            "error": error.detail,
            "delay_ms": delay.as_millis() as u64,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        warn!("Retry Attempt: {}", log_data);
    }

    pub fn log_reauthentication(&self, context: &OperationContext, attempt: &RequestAttempt) {
        if !self.should_log(LogLevel::Info) {
            return;
        }

        let log_data = json!({
            "event": "reauthenticate",
            "correlation_id": context.correlation_id,
            "path": context.path,
            "attempt": attempt.attempt_number,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        info!("Token rejected, re-authenticating: {}", log_data);
    }

    pub fn complete_operation(&self, context: &OperationContext, metrics: &OperationMetrics) {
        if !self.config.performance_metrics {
            return;
        }

        let log_data = json!({
            "event": "operation_completed",
            "correlation_id": context.correlation_id,
            "method": context.method.as_str(),
            "path": context.path,
            "duration_ms": metrics.duration.as_millis() as u64,
            "attempts": metrics.attempts,
            "retry_delays_ms": metrics.retry_delays.iter().map(|d| d.as_millis() as u64).collect::<Vec<_>>(),
            "reauthenticated": metrics.reauthenticated,
            "success": metrics.success,
            "status_code": metrics.status_code,
            "error_label": metrics.error_label,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        if metrics.success {
            if self.should_log(LogLevel::Info) {
                info!("API Operation Completed: {}", log_data);
            }
        } else if self.should_log(LogLevel::Error) {
            error!("API Operation Failed: {}", log_data);
        }
    }

    fn should_log(&self, level: LogLevel) -> bool {
        level <= self.config.log_level
    }
}

impl OperationContext {
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn create_metrics(&self, attempts: u32, result: Result<u16, &ApiError>) -> OperationMetrics {
        let (success, status_code, error_label) = match result {
            Ok(status) => (true, Some(status), None),
            Err(error) => (false, Some(error.status), Some(error.label.as_str().to_string())),
        };

        OperationMetrics {
            duration: self.elapsed(),
            attempts,
            retry_delays: Vec::new(),
            reauthenticated: false,
            success,
            status_code,
            error_label,
        }
    }
}

impl OperationMetrics {
    pub fn total_retry_delay(&self) -> Duration {
        self.retry_delays.iter().sum()
    }
}

/// Redact anything that looks like a credential
fn sanitize_headers<'a>(headers: impl Iterator<Item = (&'a str, &'a str)>) -> HashMap<String, String> {
    headers
        .map(|(key, value)| {
            let key_lower = key.to_lowercase();
            let sensitive = key_lower.contains("authorization")
                || key_lower.contains("token")
                || key_lower.contains("key")
                || key_lower.contains("secret")
                || key_lower.contains("cookie");
            let value = if sensitive { REDACTED.to_string() } else { value.to_string() };
            (key.to_string(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorLabel;

    fn logger(level: LogLevel) -> ApiLogger {
        ApiLogger::new(MonitoringConfig {
            request_logging: true,
            performance_metrics: true,
            log_level: level,
        })
    }

    #[test]
    fn test_operation_context_creation() {
        let context = logger(LogLevel::Debug).start_operation(HttpMethod::Get, "/invoices");

        assert_eq!(context.method, HttpMethod::Get);
        assert_eq!(context.path, "/invoices");
        assert_eq!(context.correlation_id.len(), 36);
    }

    #[test]
    fn test_correlation_ids_are_unique() {
        let logger = logger(LogLevel::Info);
        let first = logger.start_operation(HttpMethod::Get, "/a");
        let second = logger.start_operation(HttpMethod::Get, "/a");
        assert_ne!(first.correlation_id, second.correlation_id);
    }

    #[tokio::test]
    async fn test_operation_metrics() {
        let context = logger(LogLevel::Info).start_operation(HttpMethod::Post, "/invoices");

        let mut metrics = context.create_metrics(2, Ok(201));
        metrics.retry_delays.push(Duration::from_millis(1000));
        assert!(metrics.success);
        assert_eq!(metrics.status_code, Some(201));
        assert_eq!(metrics.total_retry_delay(), Duration::from_millis(1000));

        let error = ApiError::new(404, ErrorLabel::NotFound, "missing");
        let metrics = context.create_metrics(1, Err(&error));
        assert!(!metrics.success);
        assert_eq!(metrics.error_label.as_deref(), Some("NOT_FOUND"));
    }

    #[test]
    fn test_header_sanitization() {
        let headers = vec![
            ("Authorization", "Bearer secret-token"),
            ("Content-Type", "application/json"),
            ("X-API-Key", "secret-key"),
        ];

        let sanitized = sanitize_headers(headers.into_iter());

        assert_eq!(sanitized.get("Authorization").map(String::as_str), Some(REDACTED));
        assert_eq!(sanitized.get("Content-Type").map(String::as_str), Some("application/json"));
        assert_eq!(sanitized.get("X-API-Key").map(String::as_str), Some(REDACTED));
    }

    #[test]
    fn test_log_level_filtering() {
        let logger = logger(LogLevel::Warn);

        assert!(logger.should_log(LogLevel::Error));
        assert!(logger.should_log(LogLevel::Warn));
        assert!(!logger.should_log(LogLevel::Info));
        assert!(!logger.should_log(LogLevel::Debug));
        assert!(!logger.should_log(LogLevel::Trace));
    }
}
