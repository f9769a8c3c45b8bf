// JWT bearer-grant authentication
// Decision: RS256 assertion signed with the app's private key, kid = registered key id
// Decision: Assertions are short-lived (45s); Box rejects anything over 60s

use std::path::Path;

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::config::{ClientConfig, JwtCustomClaims};
use crate::error::{ClientError, Result};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 45;

/// Claims carried by the signed assertion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssertionClaims {
    pub iss: String,
    pub sub: String,
    pub box_sub_type: String,
    pub aud: String,
    pub jti: String,
    pub exp: i64,
}

/// Access token returned by the token endpoint
#[derive(Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: String,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Build the claim set, filling in jti, exp and aud where the config leaves them blank
pub fn assertion_claims(claims: &JwtCustomClaims, default_aud: &str) -> AssertionClaims {
    let now = Utc::now();
    let exp = if claims.exp > now.timestamp() {
        claims.exp
    } else {
        (now + Duration::seconds(ASSERTION_LIFETIME_SECS)).timestamp()
    };
    let jti = if claims.jti.is_empty() {
        Uuid::now_v7().simple().to_string()
    } else {
        claims.jti.clone()
    };
    let aud = if claims.aud.is_empty() {
        default_aud.to_string()
    } else {
        claims.aud.clone()
    };

    AssertionClaims {
        iss: claims.iss.clone(),
        sub: claims.sub.clone(),
        box_sub_type: claims.sub_type.clone(),
        aud,
        jti,
        exp,
    }
}

/// Sign an RS256 assertion with a PEM private key
pub fn build_assertion(
    claims: &AssertionClaims,
    key_id: &str,
    private_key_pem: &[u8],
) -> Result<String> {
    let key = EncodingKey::from_rsa_pem(private_key_pem)
        .map_err(|e| ClientError::auth(format!("invalid private key: {}", e)))?;

    let mut header = Header::new(Algorithm::RS256);
    if !key_id.is_empty() {
        header.kid = Some(key_id.to_string());
    }

    encode(&header, claims, &key)
        .map_err(|e| ClientError::auth(format!("failed to sign assertion: {}", e)))
}

/// Exchanges a signed JWT assertion for an access token
#[derive(Clone)]
pub struct Authenticator {
    http: reqwest::Client,
    config: ClientConfig,
}

impl Authenticator {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { http, config })
    }

    /// Signed assertion built from the configured claims and private key
    pub fn assertion(&self) -> Result<String> {
        let path = self
            .config
            .private_key_path
            .as_deref()
            .ok_or_else(|| ClientError::config("private_key_path is required for JWT auth"))?;
        let pem = read_key(path)?;
        let claims = assertion_claims(&self.config.jwt_custom_claims, &self.config.token_url);
        build_assertion(&claims, &self.config.jwt_custom_claims.key_id, &pem)
    }

    /// Run the JWT bearer grant against the token endpoint
    #[instrument(skip(self), fields(token_url = %self.config.token_url))]
    pub async fn fetch_token(&self) -> Result<AccessToken> {
        let assertion = self.assertion()?;
        let form = [
            ("grant_type", JWT_BEARER_GRANT),
            ("assertion", assertion.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(&self.config.token_url)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::auth(format!(
                "token exchange failed ({}): {}",
                status.as_u16(),
                body
            )));
        }

        let token: AccessToken =
            serde_json::from_str(&body).map_err(|source| ClientError::Decode { source, body })?;
        debug!(expires_in = token.expires_in, "Obtained access token");
        Ok(token)
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("token_url", &self.config.token_url)
            .field("client_id", &self.config.client_id)
            .finish()
    }
}

/// Static token if configured, otherwise a fresh one from the JWT exchange
pub async fn resolve_token(config: &ClientConfig) -> Result<String> {
    if !config.token.is_empty() {
        return Ok(config.token.clone());
    }
    if config.private_key_path.is_none() {
        return Err(ClientError::config(
            "no token configured and no private key for JWT auth",
        ));
    }
    let token = Authenticator::new(config.clone())?.fetch_token().await?;
    Ok(token.access_token)
}

fn read_key(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        ClientError::config(format!(
            "failed to read private key {}: {}",
            path.display(),
            e
        ))
    })
}
