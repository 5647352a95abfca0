//! Resilience features for API calls
//!
//! Retry classification with bounded backoff, rate-limit bookkeeping and
//! structured operation logging.

pub mod config;
pub mod logging;
pub mod rate_limit;
pub mod retry;

pub use config::{LogLevel, MonitoringConfig, ResilienceConfig, ResilienceConfigBuilder};
pub use logging::{ApiLogger, OperationContext, OperationMetrics};
pub use rate_limit::RateLimitTracker;
pub use retry::{RetryConfig, RetryDecision, RetryPolicy, RetryableError, parse_retry_after};
