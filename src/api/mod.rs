//! Accounting REST API access layer
//!
//! Bearer-token caching per profile, a request executor with one-shot
//! re-authentication and bounded backoff, rate-limit bookkeeping and the
//! tool-facing result envelope.

pub mod auth;
pub mod client;
pub mod constants;
pub mod error;
pub mod models;
pub mod pagination;
pub mod resilience;
pub mod result;
pub mod transport;

pub use auth::{Authenticator, IssuedToken, TokenCache};
pub use client::RequestExecutor;
pub use error::{ApiError, AuthError, ErrorLabel, TransportError};
pub use models::{
    ApiResponse, ClientCredentials, Credential, HttpMethod, ProfileContext, RateLimitSnapshot,
    RequestAttempt, RequestPayload,
};
pub use pagination::{PageOptions, PagedItems, fetch_all_pages};
pub use resilience::{
    ApiLogger, LogLevel, MonitoringConfig, OperationContext, OperationMetrics, RateLimitTracker,
    ResilienceConfig, RetryConfig, RetryDecision, RetryPolicy, RetryableError,
};
pub use result::{SourceInfo, ToolResult};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
