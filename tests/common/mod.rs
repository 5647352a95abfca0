//! Scripted in-memory transport shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use payday_cli::api::{
    Authenticator, ClientCredentials, HttpRequest, HttpResponse, HttpTransport, ProfileContext,
    RequestExecutor, ResilienceConfig, TokenCache, TransportError,
};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const BASE_URL: &str = "https://api.test";
pub const TOKEN_URL: &str = "https://api.test/auth/token";

type Scripted = Result<HttpResponse, TransportError>;

/// Answers token requests and resource requests from separate queues.
///
/// Unscripted token requests are granted `tok_1`, `tok_2`, ... with the
/// configured lifetime. Unscripted resource requests get a 200 with `{}`.
pub struct MockTransport {
    token_script: Mutex<VecDeque<Scripted>>,
    api_script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<HttpRequest>>,
    api_sent_at: Mutex<Vec<Instant>>,
    tokens_issued: AtomicUsize,
    expires_in: u64,
    latency: Duration,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            token_script: Mutex::new(VecDeque::new()),
            api_script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            api_sent_at: Mutex::new(Vec::new()),
            tokens_issued: AtomicUsize::new(0),
            expires_in: 3600,
            latency: Duration::ZERO,
        }
    }

    pub fn with_expires_in(mut self, seconds: u64) -> Self {
        self.expires_in = seconds;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn push_token(&self, response: Scripted) -> &Self {
        self.token_script.lock().unwrap().push_back(response);
        self
    }

    pub fn push_token_value(&self, token: &str, expires_in: u64) -> &Self {
        self.push_token(Ok(HttpResponse::json(
            200,
            &json!({"accessToken": token, "expiresIn": expires_in}),
        )))
    }

    pub fn push(&self, response: Scripted) -> &Self {
        self.api_script.lock().unwrap().push_back(response);
        self
    }

    pub fn push_status(&self, status: u16, body: &str) -> &Self {
        self.push(Ok(HttpResponse::new(status, body)))
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn token_requests(&self) -> Vec<HttpRequest> {
        self.requests().into_iter().filter(|r| r.url == TOKEN_URL).collect()
    }

    pub fn api_requests(&self) -> Vec<HttpRequest> {
        self.requests().into_iter().filter(|r| r.url != TOKEN_URL).collect()
    }

    /// Gaps between consecutive resource requests
    pub fn api_gaps(&self) -> Vec<Duration> {
        let sent_at = self.api_sent_at.lock().unwrap();
        sent_at.windows(2).map(|pair| pair[1] - pair[0]).collect()
    }

    pub fn total_requests(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let is_token = request.url == TOKEN_URL;
        if !is_token {
            self.api_sent_at.lock().unwrap().push(Instant::now());
        }
        self.requests.lock().unwrap().push(request);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if is_token {
            if let Some(scripted) = self.token_script.lock().unwrap().pop_front() {
                return scripted;
            }
            let n = self.tokens_issued.fetch_add(1, Ordering::SeqCst) + 1;
            return Ok(HttpResponse::json(
                200,
                &json!({"accessToken": format!("tok_{}", n), "expiresIn": self.expires_in}),
            ));
        }

        match self.api_script.lock().unwrap().pop_front() {
            Some(scripted) => scripted,
            None => Ok(HttpResponse::json(200, &json!({}))),
        }
    }
}

pub fn profile() -> ProfileContext {
    ProfileContext::new("test", BASE_URL)
}

pub fn token_cache(transport: &Arc<MockTransport>) -> Arc<TokenCache> {
    let authenticator = Authenticator::new(
        transport.clone() as Arc<dyn HttpTransport>,
        ClientCredentials::new("client-id", "client-secret"),
    );
    Arc::new(TokenCache::new(authenticator))
}

pub fn executor_for(
    profile: ProfileContext,
    transport: &Arc<MockTransport>,
    config: ResilienceConfig,
) -> RequestExecutor {
    let tokens = token_cache(transport);
    RequestExecutor::new(profile, transport.clone() as Arc<dyn HttpTransport>, tokens, config)
}

pub fn executor(transport: &Arc<MockTransport>) -> RequestExecutor {
    executor_for(profile(), transport, ResilienceConfig::default())
}
