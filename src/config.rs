use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::constants;
use crate::api::models::{ClientCredentials, ProfileContext};
use crate::api::resilience::ResilienceConfig;

pub const ENV_PROFILE: &str = "PAYDAY_PROFILE";
pub const ENV_BASE_URL: &str = "PAYDAY_BASE_URL";
pub const ENV_CLIENT_ID: &str = "PAYDAY_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "PAYDAY_CLIENT_SECRET";
pub const ENV_TENANT_ID: &str = "PAYDAY_TENANT_ID";
pub const ENV_READ_ONLY: &str = "PAYDAY_READ_ONLY";
pub const ENV_TOKEN_PATH: &str = "PAYDAY_TOKEN_PATH";

const DEFAULT_PROFILE: &str = "default";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub base_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub read_only: bool,
    pub token_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceSettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_retry_after_secs: u64,
    pub request_timeout_secs: u64,
    pub token_safety_margin_secs: u64,
    pub jitter: bool,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        let defaults = ResilienceConfig::default();
        Self {
            max_retries: defaults.retry.max_retries,
            base_delay_ms: defaults.retry.base_delay.as_millis() as u64,
            max_delay_ms: defaults.retry.max_delay.as_millis() as u64,
            max_retry_after_secs: defaults.retry.max_retry_after.as_secs(),
            request_timeout_secs: defaults.request_timeout.as_secs(),
            token_safety_margin_secs: defaults.token_safety_margin.as_secs(),
            jitter: defaults.retry.jitter,
        }
    }
}

impl ResilienceSettings {
    pub fn to_config(&self) -> ResilienceConfig {
        ResilienceConfig::builder()
            .max_retries(self.max_retries)
            .base_delay(Duration::from_millis(self.base_delay_ms))
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .max_retry_after(Duration::from_secs(self.max_retry_after_secs))
            .jitter(self.jitter)
            .request_timeout(Duration::from_secs(self.request_timeout_secs))
            .token_safety_margin(Duration::from_secs(self.token_safety_margin_secs))
            .build()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub current_profile: Option<String>,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
    #[serde(default)]
    pub resilience: ResilienceSettings,
    /// Resource name to API path, for resources whose path is not `/<name>`
    #[serde(default)]
    pub resources: HashMap<String, String>,
}

/// Everything the executor needs for one profile
#[derive(Debug, Clone)]
pub struct ResolvedProfile {
    pub context: ProfileContext,
    pub credentials: ClientCredentials,
    pub token_path: String,
}

impl Config {
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "linux") {
            dirs::config_dir()
                .context("Failed to get XDG config directory")?
                .join("payday-cli")
        } else {
            dirs::home_dir()
                .context("Failed to get home directory")?
                .join(".payday-cli")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Load from `path`, or the default location. A missing file gives defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::get_config_path()?,
        };
        debug!("Loading config from: {:?}", config_path);

        if !config_path.exists() {
            if path.is_some() {
                anyhow::bail!("Config file not found: {:?}", config_path);
            }
            info!("Config file doesn't exist, using defaults");
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config = Self::parse(&config_content)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        debug!("Loaded config with {} profiles", config.profiles.len());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Resolve a profile against the process environment (after `.env`)
    pub fn resolve(&self, profile: Option<&str>) -> Result<ResolvedProfile> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file loaded: {}", e);
        }
        self.resolve_with(profile, |key| std::env::var(key).ok())
    }

    /// Resolve a profile with environment values taken from `env`.
    ///
    /// Precedence: explicit profile, `PAYDAY_PROFILE`, `current_profile`,
    /// then `default`. Environment values override the file.
    pub fn resolve_with<F>(&self, profile: Option<&str>, env: F) -> Result<ResolvedProfile>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let profile_key = profile
            .map(str::to_string)
            .or_else(|| env(ENV_PROFILE))
            .or_else(|| self.current_profile.clone())
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string());

        let file = self.profiles.get(&profile_key).cloned().unwrap_or_default();

        let base_url = env(ENV_BASE_URL).or(file.base_url).with_context(|| {
            format!(
                "No base URL for profile '{}': set base_url in the config or {}",
                profile_key, ENV_BASE_URL
            )
        })?;
        let client_id = env(ENV_CLIENT_ID).or(file.client_id).with_context(|| {
            format!(
                "No client id for profile '{}': set client_id in the config or {}",
                profile_key, ENV_CLIENT_ID
            )
        })?;
        let client_secret = env(ENV_CLIENT_SECRET).or(file.client_secret).with_context(|| {
            format!(
                "No client secret for profile '{}': set client_secret in the config or {}",
                profile_key, ENV_CLIENT_SECRET
            )
        })?;

        let read_only = match env(ENV_READ_ONLY) {
            Some(value) => parse_bool(&value)
                .with_context(|| format!("Invalid {} value: {}", ENV_READ_ONLY, value))?,
            None => file.read_only,
        };

        let mut context = ProfileContext::new(profile_key, base_url.trim_end_matches('/')).read_only(read_only);
        if let Some(tenant_id) = env(ENV_TENANT_ID).or(file.tenant_id) {
            context = context.with_tenant(tenant_id);
        }

        let token_path = env(ENV_TOKEN_PATH)
            .or(file.token_path)
            .unwrap_or_else(|| constants::DEFAULT_TOKEN_PATH.to_string());

        info!(
            "Resolved profile '{}' ({}, read_only={})",
            context.profile_key, context.base_url, context.read_only
        );

        Ok(ResolvedProfile {
            context,
            credentials: ClientCredentials::new(client_id, client_secret),
            token_path,
        })
    }

    /// API path for a resource name
    pub fn resource_path(&self, resource: &str) -> String {
        match self.resources.get(resource) {
            Some(path) => path.clone(),
            None => format!("/{}", resource.trim_start_matches('/')),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
current_profile = "production"

[profiles.production]
base_url = "https://api.example.com/"
client_id = "prod-id"
client_secret = "prod-secret"
tenant_id = "acme"
read_only = true

[profiles.sandbox]
base_url = "https://sandbox.example.com"
client_id = "sb-id"
client_secret = "sb-secret"
token_path = "/oauth/token"

[resilience]
max_retries = 5
base_delay_ms = 200
jitter = true

[resources]
accounts = "/accounting/accounts"
"#;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_parse_and_resolve_current_profile() {
        let config = Config::parse(SAMPLE).unwrap();
        let resolved = config.resolve_with(None, no_env).unwrap();

        assert_eq!(resolved.context.profile_key, "production");
        assert_eq!(resolved.context.base_url, "https://api.example.com");
        assert!(resolved.context.read_only);
        assert_eq!(resolved.context.tenant_id.as_deref(), Some("acme"));
        assert_eq!(resolved.credentials.client_id, "prod-id");
        assert_eq!(resolved.token_path, constants::DEFAULT_TOKEN_PATH);
    }

    #[test]
    fn test_explicit_profile_wins() {
        let config = Config::parse(SAMPLE).unwrap();
        let env = |key: &str| (key == ENV_PROFILE).then(|| "production".to_string());
        let resolved = config.resolve_with(Some("sandbox"), env).unwrap();

        assert_eq!(resolved.context.profile_key, "sandbox");
        assert!(!resolved.context.read_only);
        assert_eq!(resolved.token_path, "/oauth/token");
    }

    #[test]
    fn test_env_overrides_file() {
        let config = Config::parse(SAMPLE).unwrap();
        let env = |key: &str| match key {
            ENV_BASE_URL => Some("http://localhost:8080".to_string()),
            ENV_READ_ONLY => Some("false".to_string()),
            ENV_CLIENT_SECRET => Some("rotated".to_string()),
            _ => None,
        };
        let resolved = config.resolve_with(None, env).unwrap();

        assert_eq!(resolved.context.base_url, "http://localhost:8080");
        assert!(!resolved.context.read_only);
        assert_eq!(resolved.credentials.client_secret, "rotated");
        assert_eq!(resolved.credentials.client_id, "prod-id");
    }

    #[test]
    fn test_env_only_profile() {
        let env = |key: &str| match key {
            ENV_BASE_URL => Some("https://api.example.com".to_string()),
            ENV_CLIENT_ID => Some("id".to_string()),
            ENV_CLIENT_SECRET => Some("secret".to_string()),
            _ => None,
        };
        let resolved = Config::default().resolve_with(None, env).unwrap();
        assert_eq!(resolved.context.profile_key, "default");
    }

    #[test]
    fn test_missing_credentials_is_an_error() {
        let config = Config::parse(
            r#"
[profiles.default]
base_url = "https://api.example.com"
client_id = "id"
"#,
        )
        .unwrap();

        let err = config.resolve_with(None, no_env).unwrap_err();
        assert!(err.to_string().contains("client secret"));
    }

    #[test]
    fn test_invalid_read_only_flag() {
        let config = Config::parse(SAMPLE).unwrap();
        let env = |key: &str| (key == ENV_READ_ONLY).then(|| "maybe".to_string());
        assert!(config.resolve_with(None, env).is_err());
    }

    #[test]
    fn test_resilience_settings() {
        let config = Config::parse(SAMPLE).unwrap();
        let resilience = config.resilience.to_config();

        assert_eq!(resilience.retry.max_retries, 5);
        assert_eq!(resilience.retry.base_delay, Duration::from_millis(200));
        assert_eq!(resilience.retry.max_delay, Duration::from_secs(10));
        assert_eq!(resilience.retry.max_retry_after, Duration::from_secs(300));
        assert!(resilience.retry.jitter);
        assert_eq!(resilience.request_timeout, Duration::from_secs(30));
        assert_eq!(resilience.token_safety_margin, Duration::from_secs(60));
    }

    #[test]
    fn test_resource_path() {
        let config = Config::parse(SAMPLE).unwrap();
        assert_eq!(config.resource_path("accounts"), "/accounting/accounts");
        assert_eq!(config.resource_path("invoices"), "/invoices");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, SAMPLE).unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.profiles.len(), 2);

        let missing = dir.path().join("missing.toml");
        assert!(Config::load(Some(&missing)).is_err());
    }
}
