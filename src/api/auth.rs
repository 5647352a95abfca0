//! Bearer-token acquisition and caching
//!
//! [`Authenticator`] performs the client-credentials exchange, [`TokenCache`]
//! keeps at most one credential per profile and refreshes it when it goes
//! stale. Concurrent callers for the same profile share a single refresh.

use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::constants::{self, headers};
use super::error::AuthError;
use super::models::{ClientCredentials, Credential, HttpMethod, ProfileContext};
use super::transport::{HttpRequest, HttpTransport};

/// A token as issued by the server, before it is cached
#[derive(Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_in: Duration,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    #[serde(alias = "access_token")]
    access_token: Option<String>,
    #[serde(alias = "expires_in")]
    expires_in: Option<u64>,
}

/// Exchanges client credentials for an access token
pub struct Authenticator {
    transport: Arc<dyn HttpTransport>,
    credentials: ClientCredentials,
    token_path: String,
}

impl Authenticator {
    pub fn new(transport: Arc<dyn HttpTransport>, credentials: ClientCredentials) -> Self {
        Self {
            transport,
            credentials,
            token_path: constants::DEFAULT_TOKEN_PATH.to_string(),
        }
    }

    pub fn with_token_path(mut self, token_path: impl Into<String>) -> Self {
        self.token_path = token_path.into();
        self
    }

    /// `POST <base_url><token_path>` with `{clientId, clientSecret}`
    pub async fn exchange(&self, profile: &ProfileContext) -> Result<IssuedToken, AuthError> {
        let url = constants::endpoint(&profile.base_url, &self.token_path);
        info!("Authenticating profile '{}' against {}", profile.profile_key, url);

        let mut request = HttpRequest::new(HttpMethod::Post, url)
            .header(headers::ACCEPT, headers::CONTENT_TYPE_JSON)
            .json(json!({
                "clientId": self.credentials.client_id,
                "clientSecret": self.credentials.client_secret,
            }));
        if let Some(tenant_id) = &profile.tenant_id {
            request = request.header(headers::TENANT_ID, tenant_id.clone());
        }

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        debug!("Token request status: {}", response.status);

        if !response.is_success() {
            return Err(AuthError::Rejected {
                status: response.status,
                message: rejection_message(&response.body),
            });
        }

        let token: TokenResponse = serde_json::from_str(&response.body)
            .map_err(|_| AuthError::MalformedResponse("a JSON token body".to_string()))?;

        let access_token = token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::MalformedResponse("accessToken".to_string()))?;
        let expires_in = token
            .expires_in
            .ok_or_else(|| AuthError::MalformedResponse("expiresIn".to_string()))?;

        Ok(IssuedToken {
            access_token,
            expires_in: Duration::from_secs(expires_in),
        })
    }
}

fn rejection_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        ["message", "error_description", "error"]
            .iter()
            .find_map(|key| v.get(*key).and_then(|m| m.as_str()))
            .map(|m| m.to_string())
    });

    match message {
        Some(message) => message,
        None if !body.trim().is_empty() => body.trim().chars().take(200).collect(),
        None => "no details provided".to_string(),
    }
}

#[derive(Default)]
struct SlotState {
    credential: Option<Credential>,
    last_error: Option<AuthError>,
}

/// Per-profile slot. The mutex is held for the whole refresh, which makes
/// concurrent callers queue behind the refresh in flight.
#[derive(Default)]
struct ProfileSlot {
    state: Mutex<SlotState>,
    refreshes: AtomicU64,
}

/// Cache of bearer tokens, one credential per profile key
pub struct TokenCache {
    authenticator: Authenticator,
    safety_margin: Duration,
    slots: Mutex<HashMap<String, Arc<ProfileSlot>>>,
}

impl TokenCache {
    pub fn new(authenticator: Authenticator) -> Self {
        Self::with_safety_margin(authenticator, constants::TOKEN_SAFETY_MARGIN)
    }

    pub fn with_safety_margin(authenticator: Authenticator, safety_margin: Duration) -> Self {
        Self {
            authenticator,
            safety_margin,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn safety_margin(&self) -> Duration {
        self.safety_margin
    }

    async fn slot(&self, profile_key: &str) -> Arc<ProfileSlot> {
        let mut slots = self.slots.lock().await;
        slots
            .entry(profile_key.to_string())
            .or_insert_with(|| Arc::new(ProfileSlot::default()))
            .clone()
    }

    /// Return a valid token, refreshing when none is cached or it went stale
    pub async fn get_token(&self, profile: &ProfileContext) -> Result<String, AuthError> {
        let slot = self.slot(&profile.profile_key).await;
        let refreshes_seen = slot.refreshes.load(Ordering::Acquire);
        let mut state = slot.state.lock().await;

        if let Some(credential) = &state.credential {
            if credential.is_valid_at(Instant::now(), self.safety_margin) {
                debug!("Using cached token for profile: {}", profile.profile_key);
                return Ok(credential.access_token.clone());
            }
            debug!("Cached token is stale for profile: {}", profile.profile_key);
        }

        // A refresh completed while we waited for the lock and it failed
        if slot.refreshes.load(Ordering::Acquire) != refreshes_seen {
            if let Some(error) = &state.last_error {
                return Err(error.clone());
            }
        }

        self.refresh_locked(profile, &slot, &mut state).await
    }

    /// Force an authentication exchange and replace the cached credential
    pub async fn refresh_token(&self, profile: &ProfileContext) -> Result<String, AuthError> {
        let slot = self.slot(&profile.profile_key).await;
        let mut state = slot.state.lock().await;
        self.refresh_locked(profile, &slot, &mut state).await
    }

    async fn refresh_locked(
        &self,
        profile: &ProfileContext,
        slot: &ProfileSlot,
        state: &mut SlotState,
    ) -> Result<String, AuthError> {
        state.credential = None;

        let outcome = match self.authenticator.exchange(profile).await {
            Ok(issued) => {
                let lifetime = issued.expires_in.min(constants::MAX_TOKEN_LIFETIME);
                if lifetime < issued.expires_in {
                    warn!(
                        "Token for profile '{}' claims {:?} of validity, caching it for {:?}",
                        profile.profile_key, issued.expires_in, lifetime
                    );
                }
                let now = Instant::now();
                let expires_at = now.checked_add(lifetime).unwrap_or(now);
                if issued.expires_in <= self.safety_margin {
                    warn!(
                        "Token for profile '{}' expires in {:?}, inside the {:?} safety margin",
                        profile.profile_key, issued.expires_in, self.safety_margin
                    );
                }
                state.credential = Some(Credential {
                    profile_key: profile.profile_key.clone(),
                    access_token: issued.access_token.clone(),
                    expires_at,
                });
                state.last_error = None;
                info!("Cached new token for profile: {}", profile.profile_key);
                Ok(issued.access_token)
            }
            Err(error) => {
                warn!("Authentication failed for profile '{}': {}", profile.profile_key, error);
                state.last_error = Some(error.clone());
                Err(error)
            }
        };

        slot.refreshes.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    /// Drop the cached credential for one profile, or for all with `None`
    pub async fn invalidate(&self, profile_key: Option<&str>) {
        let targets: Vec<Arc<ProfileSlot>> = {
            let slots = self.slots.lock().await;
            match profile_key {
                Some(key) => slots.get(key).cloned().into_iter().collect(),
                None => slots.values().cloned().collect(),
            }
        };

        for slot in targets {
            let mut state = slot.state.lock().await;
            state.credential = None;
            state.last_error = None;
        }

        match profile_key {
            Some(key) => debug!("Invalidated cached token for profile: {}", key),
            None => debug!("Invalidated all cached tokens"),
        }
    }

    /// Time left before the cached credential goes stale, if one is valid
    pub async fn cached_expiry(&self, profile_key: &str) -> Option<Duration> {
        let slot = self.slots.lock().await.get(profile_key).cloned()?;
        let state = slot.state.lock().await;
        let now = Instant::now();
        state
            .credential
            .as_ref()
            .filter(|c| c.is_valid_at(now, self.safety_margin))
            .map(|c| c.remaining(now, self.safety_margin))
    }
}
