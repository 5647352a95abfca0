use log::{debug, warn};
use serde_json::Value;
use std::sync::Arc;

use super::auth::{Authenticator, TokenCache};
use super::constants::{self, headers};
use super::error::ApiError;
use super::models::{ApiResponse, HttpMethod, ProfileContext, RateLimitSnapshot, RequestAttempt, RequestPayload};
use super::resilience::{ApiLogger, OperationContext, RateLimitTracker, ResilienceConfig, RetryDecision, RetryPolicy};
use super::result::ToolResult;
use super::transport::{HttpRequest, HttpTransport, ReqwestTransport};
use crate::config::ResolvedProfile;

/// Executes API calls with token injection, one-shot re-authentication on
/// 401 and bounded backoff for transient failures.
///
/// Safe to share between tasks; attempts of a single call are strictly
/// sequential.
pub struct RequestExecutor {
    profile: ProfileContext,
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<TokenCache>,
    retry_policy: RetryPolicy,
    rate_limits: RateLimitTracker,
    logger: ApiLogger,
}

impl RequestExecutor {
    pub fn new(
        profile: ProfileContext,
        transport: Arc<dyn HttpTransport>,
        tokens: Arc<TokenCache>,
        config: ResilienceConfig,
    ) -> Self {
        Self {
            profile,
            transport,
            tokens,
            retry_policy: RetryPolicy::new(config.retry),
            rate_limits: RateLimitTracker::new(),
            logger: ApiLogger::new(config.monitoring),
        }
    }

    /// Build an executor backed by `reqwest` for a resolved profile
    pub fn connect(resolved: &ResolvedProfile, config: ResilienceConfig) -> anyhow::Result<Self> {
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(config.request_timeout)?);
        let authenticator = Authenticator::new(transport.clone(), resolved.credentials.clone())
            .with_token_path(resolved.token_path.clone());
        let tokens = Arc::new(TokenCache::with_safety_margin(authenticator, config.token_safety_margin));

        Ok(Self::new(resolved.context.clone(), transport, tokens, config))
    }

    pub fn profile(&self) -> &ProfileContext {
        &self.profile
    }

    pub fn tokens(&self) -> &Arc<TokenCache> {
        &self.tokens
    }

    /// Last rate-limit state reported by the server. Never blocks.
    pub fn rate_limit_snapshot(&self) -> Option<RateLimitSnapshot> {
        self.rate_limits.snapshot()
    }

    pub async fn get(&self, path: &str, query: &[(String, String)]) -> Result<ApiResponse, ApiError> {
        let payload = if query.is_empty() {
            RequestPayload::None
        } else {
            RequestPayload::Query(query.to_vec())
        };
        self.execute(HttpMethod::Get, path, payload).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<ApiResponse, ApiError> {
        self.execute(HttpMethod::Put, path, RequestPayload::Json(body)).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<ApiResponse, ApiError> {
        self.execute(HttpMethod::Post, path, RequestPayload::Json(body)).await
    }

    /// Execute and wrap the outcome in the tool-facing envelope
    pub async fn call(&self, method: HttpMethod, path: &str, payload: RequestPayload) -> ToolResult {
        self.execute(method, path, payload).await.into()
    }

    /// Execute one logical API call
    pub async fn execute(
        &self,
        method: HttpMethod,
        path: &str,
        payload: RequestPayload,
    ) -> Result<ApiResponse, ApiError> {
        let context = self.logger.start_operation(method, path);

        if method.is_mutating() && self.profile.read_only {
            let error = ApiError::read_only(method, path);
            warn!(
                "Rejected {} {}: profile '{}' is read-only",
                method, path, self.profile.profile_key
            );
            self.logger
                .complete_operation(&context, &context.create_metrics(0, Err(&error)));
            return Err(error);
        }

        let url = constants::endpoint(&self.profile.base_url, path);
        let mut attempt = RequestAttempt::first(method, path);
        let mut attempts_sent = 0;
        let mut retries_used = 0;
        let mut reauthenticated = false;
        let mut retry_delays = Vec::new();

        let outcome = loop {
            let token = match self.tokens.get_token(&self.profile).await {
                Ok(token) => token,
                Err(error) => break Err(ApiError::from(error)),
            };

            let request = self.build_request(&context, method, &url, &payload, &token);
            self.logger.log_request(&context, &attempt, &request.headers);

            let response = self.transport.send(request).await;
            attempts_sent += 1;
            if let Ok(response) = &response {
                self.rate_limits.record_headers(&response.headers);
                self.logger
                    .log_response(&context, &attempt, response.status, &response.headers);
            }

            match self.retry_policy.classify(response, retries_used, reauthenticated) {
                RetryDecision::Success(response) => break Ok(response),
                RetryDecision::Reauthenticate => {
                    self.logger.log_reauthentication(&context, &attempt);
                    self.tokens.invalidate(Some(&self.profile.profile_key)).await;
                    reauthenticated = true;
                }
                RetryDecision::Retry { delay, error } => {
                    self.logger.log_retry(&context, &attempt, &error, delay);
                    retries_used += 1;
                    retry_delays.push(delay);
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::Terminal(error) => break Err(error),
            }

            attempt = attempt.next();
        };

        let result = outcome.map(|response| ApiResponse {
            data: parse_body(&response.body),
            status: response.status,
            endpoint: path.to_string(),
            duration: context.elapsed(),
            attempts: attempts_sent,
        });

        let mut metrics = context.create_metrics(attempts_sent, result.as_ref().map(|r| r.status));
        metrics.retry_delays = retry_delays;
        metrics.reauthenticated = reauthenticated;
        self.logger.complete_operation(&context, &metrics);

        result
    }

    fn build_request(
        &self,
        context: &OperationContext,
        method: HttpMethod,
        url: &str,
        payload: &RequestPayload,
        token: &str,
    ) -> HttpRequest {
        let mut request = HttpRequest::new(method, url)
            .header(headers::AUTHORIZATION, format!("Bearer {}", token))
            .header(headers::ACCEPT, headers::CONTENT_TYPE_JSON)
            .header(headers::CORRELATION_ID, context.correlation_id.clone());

        if let Some(tenant_id) = &self.profile.tenant_id {
            request = request.header(headers::TENANT_ID, tenant_id.clone());
        }

        match payload {
            RequestPayload::None => request,
            RequestPayload::Query(params) => request.query(params),
            RequestPayload::Json(body) => request
                .header(headers::CONTENT_TYPE, headers::CONTENT_TYPE_JSON)
                .json(body.clone()),
        }
    }
}

/// Successful bodies are JSON; empty bodies become `null` and anything
/// unparseable is passed through as a string
fn parse_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| {
        debug!("Response body is not JSON, returning it as text");
        Value::String(body.to_string())
    })
}
