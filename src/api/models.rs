use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// HTTP methods the client is allowed to issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Put,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
            HttpMethod::Post => "POST",
        }
    }

    /// Whether the method changes state on the server
    pub fn is_mutating(&self) -> bool {
        matches!(self, HttpMethod::Put | HttpMethod::Post)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The backend environment a process talks to.
///
/// Built once at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileContext {
    pub profile_key: String,
    pub base_url: String,
    pub read_only: bool,
    pub tenant_id: Option<String>,
}

impl ProfileContext {
    pub fn new(profile_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            profile_key: profile_key.into(),
            base_url: base_url.into(),
            read_only: false,
            tenant_id: None,
        }
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }
}

/// Client credentials exchanged for a bearer token
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Cached bearer token for one profile
#[derive(Clone)]
pub struct Credential {
    pub profile_key: String,
    pub access_token: String,
    pub expires_at: Instant,
}

impl Credential {
    /// Usable iff `now < expires_at - margin`
    pub fn is_valid_at(&self, now: Instant, margin: Duration) -> bool {
        match self.expires_at.checked_sub(margin) {
            Some(stale_at) => now < stale_at,
            None => false,
        }
    }

    /// Time left before the credential goes stale
    pub fn remaining(&self, now: Instant, margin: Duration) -> Duration {
        self.expires_at
            .checked_sub(margin)
            .map(|stale_at| stale_at.saturating_duration_since(now))
            .unwrap_or_default()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("profile_key", &self.profile_key)
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Most recently observed server-side rate-limit state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitSnapshot {
    pub limit: u64,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

/// One attempt of a logical call, used to drive the retry loop
#[derive(Debug, Clone)]
pub struct RequestAttempt {
    pub method: HttpMethod,
    pub path: String,
    pub attempt_number: u32,
    pub started_at: Instant,
}

impl RequestAttempt {
    pub fn first(method: HttpMethod, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            attempt_number: 1,
            started_at: Instant::now(),
        }
    }

    pub fn next(&self) -> Self {
        Self {
            method: self.method,
            path: self.path.clone(),
            attempt_number: self.attempt_number + 1,
            started_at: Instant::now(),
        }
    }
}

/// Parameters carried by a request
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestPayload {
    #[default]
    None,
    Query(Vec<(String, String)>),
    Json(Value),
}

/// Successful result of a logical call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub data: Value,
    pub status: u16,
    pub endpoint: String,
    pub duration: Duration,
    pub attempts: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutating_methods() {
        assert!(!HttpMethod::Get.is_mutating());
        assert!(HttpMethod::Put.is_mutating());
        assert!(HttpMethod::Post.is_mutating());
    }

    #[test]
    fn test_credential_validity_window() {
        let now = Instant::now();
        let credential = Credential {
            profile_key: "test".to_string(),
            access_token: "tok".to_string(),
            expires_at: now + Duration::from_secs(3600),
        };
        let margin = Duration::from_secs(60);

        assert!(credential.is_valid_at(now, margin));
        assert!(credential.is_valid_at(now + Duration::from_secs(3539), margin));
        assert!(!credential.is_valid_at(now + Duration::from_secs(3540), margin));
        assert_eq!(credential.remaining(now, margin), Duration::from_secs(3540));
        assert_eq!(credential.remaining(now + Duration::from_secs(4000), margin), Duration::ZERO);
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let credentials = ClientCredentials::new("client", "very-secret");
        let rendered = format!("{:?}", credentials);
        assert!(rendered.contains("client"));
        assert!(!rendered.contains("very-secret"));
    }
}
