// Client configuration
//
// Loaded from a JSON file shaped like the Box app config this tool has always
// used, then overridden from BOX_* environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};
use crate::stream::StreamConfig;
use crate::types::string_or_number;

pub const DEFAULT_URL_BASE: &str = "https://api.box.com/2.0";
pub const DEFAULT_TOKEN_URL: &str = "https://api.box.com/oauth2/token";

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub events: EventsConfig,
}

/// Connection and credential settings
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Static bearer token; when empty a JWT exchange is attempted
    #[serde(default)]
    pub token: String,

    /// API base URL, e.g. https://api.box.com/2.0
    #[serde(default = "default_url_base")]
    pub url_base: String,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    #[serde(default)]
    pub jwt_custom_claims: JwtCustomClaims,

    /// OAuth2 token endpoint used for the JWT bearer grant
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// Unencrypted PEM private key matching `jwt_custom_claims.key_id`
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,

    /// Per-request timeout
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Claims used to build the JWT assertion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JwtCustomClaims {
    /// Client ID of the app
    #[serde(default)]
    pub iss: String,

    /// Enterprise or user ID the token is issued for
    #[serde(default)]
    pub sub: String,

    /// "enterprise" or "user"
    #[serde(default, rename = "box_sub_type")]
    pub sub_type: String,

    /// Token endpoint audience
    #[serde(default)]
    pub aud: String,

    /// Unique token ID; generated when empty
    #[serde(default)]
    pub jti: String,

    /// Expiry as a Unix timestamp; computed when zero or in the past
    #[serde(default)]
    pub exp: i64,

    /// Public key ID registered with the app
    #[serde(default)]
    pub key_id: String,
}

/// Event stream settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// ISO-8601 time to start streaming from
    #[serde(default)]
    pub start_time: String,

    /// Page size; older config files store it as a string
    #[serde(default = "default_event_limit", deserialize_with = "string_or_number")]
    pub event_limit: u32,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_buffer")]
    pub buffer: usize,
}

fn default_url_base() -> String {
    DEFAULT_URL_BASE.to_string()
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_event_limit() -> u32 {
    100
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_buffer() -> usize {
    1
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            url_base: default_url_base(),
            client_id: String::new(),
            client_secret: String::new(),
            jwt_custom_claims: JwtCustomClaims::default(),
            token_url: default_token_url(),
            private_key_path: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("url_base", &self.url_base)
            .field("token", &"[REDACTED]")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("token_url", &self.token_url)
            .field("private_key_path", &self.private_key_path)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

impl ClientConfig {
    /// Config with a static token against the given base URL
    pub fn new(token: impl Into<String>, url_base: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            url_base: url_base.into(),
            ..Default::default()
        }
    }

    /// Set the per-request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Reject settings the transport cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.url_base.trim().is_empty() {
            return Err(ClientError::config("url_base must not be empty"));
        }
        url::Url::parse(&self.url_base)
            .map_err(|e| ClientError::config(format!("invalid url_base {}: {}", self.url_base, e)))?;
        if self.request_timeout_ms == 0 {
            return Err(ClientError::config("request_timeout_ms must be positive"));
        }
        Ok(())
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            start_time: String::new(),
            event_limit: default_event_limit(),
            poll_interval_ms: default_poll_interval_ms(),
            buffer: default_buffer(),
        }
    }
}

impl EventsConfig {
    /// Stream settings derived from this section; retry and error backoff keep their defaults
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig::new()
            .with_event_limit(self.event_limit)
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_buffer(self.buffer)
    }
}

impl Config {
    /// Load a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ClientError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    /// Parse a JSON config document
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| ClientError::config(format!("invalid config JSON: {}", e)))
    }

    /// Apply overrides from environment variables
    ///
    /// Environment variables:
    /// - `BOX_TOKEN`: static bearer token
    /// - `BOX_API_URL`: API base URL
    /// - `BOX_CLIENT_ID` / `BOX_CLIENT_SECRET`: app credentials
    /// - `BOX_PRIVATE_KEY_PATH`: PEM key for the JWT assertion
    /// - `BOX_EVENT_LIMIT`: page size
    /// - `BOX_START_TIME`: stream start time
    pub fn apply_env(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key/value source; empty values are ignored
    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(token) = get("BOX_TOKEN") {
            self.client.token = token;
        }
        if let Some(url) = get("BOX_API_URL") {
            self.client.url_base = url;
        }
        if let Some(id) = get("BOX_CLIENT_ID") {
            self.client.client_id = id;
        }
        if let Some(secret) = get("BOX_CLIENT_SECRET") {
            self.client.client_secret = secret;
        }
        if let Some(path) = get("BOX_PRIVATE_KEY_PATH") {
            self.client.private_key_path = Some(PathBuf::from(path));
        }
        if let Some(limit) = get("BOX_EVENT_LIMIT").and_then(|v| v.parse().ok()) {
            self.events.event_limit = limit;
        }
        if let Some(start) = get("BOX_START_TIME") {
            self.events.start_time = start;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"{
        "client": {
            "token": "tok",
            "url_base": "https://api.example.com/2.0",
            "client_id": "cid",
            "client_secret": "secret",
            "jwt_custom_claims": {
                "iss": "cid",
                "sub": "12345",
                "box_sub_type": "enterprise",
                "aud": "https://api.box.com/oauth2/token",
                "jti": "",
                "exp": 0,
                "key_id": "kid1"
            }
        },
        "events": {
            "start_time": "2024-01-01T00:00:00Z",
            "event_limit": 250
        }
    }"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::from_json_str(SAMPLE).unwrap();
        assert_eq!(config.client.token, "tok");
        assert_eq!(config.client.url_base, "https://api.example.com/2.0");
        assert_eq!(config.client.jwt_custom_claims.sub_type, "enterprise");
        assert_eq!(config.client.jwt_custom_claims.key_id, "kid1");
        assert_eq!(config.events.event_limit, 250);
        assert_eq!(config.events.poll_interval_ms, 2_000);
        assert_eq!(config.client.token_url, DEFAULT_TOKEN_URL);
    }

    #[test]
    fn test_event_limit_as_string() {
        let config = Config::from_json_str(
            r#"{
                "client": {"token": "tok", "url_base": "https://api.box.com/2.0"},
                "events": {"start_time": "2024-01-01T00:00:00Z", "event_limit": "100"}
            }"#,
        )
        .unwrap();
        assert_eq!(config.events.event_limit, 100);
        assert_eq!(config.events.start_time, "2024-01-01T00:00:00Z");

        let err = Config::from_json_str(r#"{"events": {"event_limit": "many"}}"#).unwrap_err();
        assert!(matches!(err, ClientError::Configuration(_)));
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config.client.url_base, DEFAULT_URL_BASE);
        assert_eq!(config.client.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.events.event_limit, 100);
        assert_eq!(config.events.buffer, 1);
    }

    #[test]
    fn test_invalid_json() {
        let err = Config::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ClientError::Configuration(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load("/nonexistent/boxwatch.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/boxwatch.json"));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("BOX_TOKEN", "env-token"),
            ("BOX_EVENT_LIMIT", "50"),
            ("BOX_API_URL", ""),
        ]
        .into_iter()
        .collect();

        let config = Config::from_json_str(SAMPLE)
            .unwrap()
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.client.token, "env-token");
        assert_eq!(config.events.event_limit, 50);
        // empty override is ignored
        assert_eq!(config.client.url_base, "https://api.example.com/2.0");
    }

    #[test]
    fn test_validate() {
        assert!(ClientConfig::default().validate().is_ok());
        assert!(ClientConfig::new("t", "").validate().is_err());
        assert!(ClientConfig::new("t", "not a url").validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config::from_json_str(SAMPLE).unwrap();
        let debug = format!("{:?}", config.client);
        assert!(!debug.contains("tok\""));
        assert!(!debug.contains("secret\""));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_stream_config_from_events_section() {
        let config = Config::from_json_str(SAMPLE).unwrap();
        let stream = config.events.stream_config();
        assert_eq!(stream.event_limit, 250);
        assert_eq!(stream.poll_interval, Duration::from_secs(2));
    }
}
