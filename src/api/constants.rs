//! API constants and defaults for the Payday REST API

use std::time::Duration;

/// Default path of the client-credentials token exchange
pub const DEFAULT_TOKEN_PATH: &str = "/auth/token";

/// Subtracted from a token's reported expiry so it is never used mid-flight
pub const TOKEN_SAFETY_MARGIN: Duration = Duration::from_secs(60);

/// Longest token lifetime the cache will trust, whatever `expiresIn` claims
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Per-request timeout for every individual HTTP call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection timeout for the underlying HTTP client
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("payday-cli/", env!("CARGO_PKG_VERSION"));

/// Standard headers used by the client.
///
/// Names are lowercase because response headers are normalised to lowercase
/// before lookup.
pub mod headers {
    pub const AUTHORIZATION: &str = "authorization";
    pub const ACCEPT: &str = "accept";
    pub const CONTENT_TYPE: &str = "content-type";
    pub const CONTENT_TYPE_JSON: &str = "application/json";
    pub const TENANT_ID: &str = "x-tenant-id";
    pub const CORRELATION_ID: &str = "x-correlation-id";
    pub const RETRY_AFTER: &str = "retry-after";
    pub const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
    pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
    pub const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";
}

/// Query parameters understood by paginated list endpoints
pub mod paging {
    pub const PAGE: &str = "page";
    pub const PER_PAGE: &str = "perpage";
    pub const DEFAULT_PER_PAGE: u32 = 500;
    pub const MAX_PAGES: u32 = 1000;
}

/// Build a full endpoint URL from a base URL and a request path
pub fn endpoint(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if path.is_empty() {
        return base.to_string();
    }
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_slashes() {
        assert_eq!(endpoint("https://api.test/", "/invoices"), "https://api.test/invoices");
        assert_eq!(endpoint("https://api.test", "invoices/1"), "https://api.test/invoices/1");
        assert_eq!(endpoint("https://api.test/v1/", ""), "https://api.test/v1");
    }
}
