//! Resilience configuration with builder pattern
//!
//! Provides a unified configuration for retry policies, timeouts, token
//! lifetime handling and monitoring, with sane defaults.

use super::retry::RetryConfig;
use crate::api::constants;
use std::time::Duration;

/// Global resilience configuration for API operations
#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    pub retry: RetryConfig,
    pub request_timeout: Duration,
    pub token_safety_margin: Duration,
    pub monitoring: MonitoringConfig,
}

/// Monitoring and logging configuration
#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    pub request_logging: bool,
    pub performance_metrics: bool,
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            request_timeout: constants::DEFAULT_REQUEST_TIMEOUT,
            token_safety_margin: constants::TOKEN_SAFETY_MARGIN,
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            request_logging: true,
            performance_metrics: true,
            log_level: LogLevel::Info,
        }
    }
}

impl ResilienceConfig {
    pub fn builder() -> ResilienceConfigBuilder {
        ResilienceConfigBuilder::new()
    }

    /// No retries and quiet logging
    pub fn disabled() -> Self {
        Self {
            retry: RetryConfig::none(),
            request_timeout: constants::DEFAULT_REQUEST_TIMEOUT,
            token_safety_margin: constants::TOKEN_SAFETY_MARGIN,
            monitoring: MonitoringConfig {
                request_logging: false,
                performance_metrics: false,
                log_level: LogLevel::Error,
            },
        }
    }
}

#[derive(Debug)]
pub struct ResilienceConfigBuilder {
    config: ResilienceConfig,
}

impl ResilienceConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ResilienceConfig::default(),
        }
    }

    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Retries after the first attempt
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.retry.max_retries = retries;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.retry.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.retry.max_delay = delay;
        self
    }

    pub fn max_retry_after(mut self, delay: Duration) -> Self {
        self.config.retry.max_retry_after = delay;
        self
    }

    pub fn jitter(mut self, enabled: bool) -> Self {
        self.config.retry.jitter = enabled;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn token_safety_margin(mut self, margin: Duration) -> Self {
        self.config.token_safety_margin = margin;
        self
    }

    pub fn monitoring_config(mut self, monitoring: MonitoringConfig) -> Self {
        self.config.monitoring = monitoring;
        self
    }

    pub fn request_logging(mut self, enabled: bool) -> Self {
        self.config.monitoring.request_logging = enabled;
        self
    }

    pub fn performance_metrics(mut self, enabled: bool) -> Self {
        self.config.monitoring.performance_metrics = enabled;
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.monitoring.log_level = level;
        self
    }

    pub fn build(self) -> ResilienceConfig {
        self.config
    }
}

impl Default for ResilienceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ResilienceConfig::default();

        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.base_delay, Duration::from_millis(1000));
        assert_eq!(config.retry.max_delay, Duration::from_secs(10));
        assert!(!config.retry.jitter);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.token_safety_margin, Duration::from_secs(60));
        assert!(config.monitoring.request_logging);
    }

    #[test]
    fn test_disabled_config() {
        let config = ResilienceConfig::disabled();

        assert_eq!(config.retry.max_retries, 0);
        assert!(!config.monitoring.request_logging);
        assert!(!config.monitoring.performance_metrics);
    }

    #[test]
    fn test_builder_pattern() {
        let config = ResilienceConfig::builder()
            .max_retries(5)
            .base_delay(Duration::from_millis(250))
            .jitter(true)
            .request_timeout(Duration::from_secs(5))
            .log_level(LogLevel::Debug)
            .build();

        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base_delay, Duration::from_millis(250));
        assert!(config.retry.jitter);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.monitoring.log_level, LogLevel::Debug);
    }
}
