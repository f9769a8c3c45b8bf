// HTTP transport for the Box API
//
// Builds URLs against the configured base, attaches the bearer token, and
// classifies responses. It never sleeps: a 429 comes back as
// ClientError::RateLimited and the retry layer decides what to do with it.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::retry::{with_retries, RetryPolicy};

/// A request that can be issued more than once
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Append a query parameter; values are URL-encoded when the URL is built
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Attach a JSON body
    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self> {
        let value = serde_json::to_value(body).map_err(|source| ClientError::Decode {
            source,
            body: String::new(),
        })?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }
}

/// Authenticated JSON transport sharing one connection pool
#[derive(Clone)]
pub struct Transport {
    http: Client,
    base_url: String,
    token: String,
    timeout: Duration,
}

impl Transport {
    /// Create a transport using the config's static token
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::with_token(config, config.token.clone())
    }

    /// Create a transport with an explicitly supplied token
    pub fn with_token(config: &ClientConfig, token: impl Into<String>) -> Result<Self> {
        config.validate()?;
        let timeout = config.request_timeout();
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: config.url_base.trim_end_matches('/').to_string(),
            token: token.into(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a request
    pub fn url_for(&self, request: &ApiRequest) -> Result<Url> {
        let raw = format!("{}{}", self.base_url, request.path);
        let mut url = Url::parse(&raw)
            .map_err(|e| ClientError::config(format!("invalid request URL {}: {}", raw, e)))?;
        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Issue a request once and decode a 2xx body into `T`
    pub async fn send<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T> {
        let url = self.url_for(request)?;
        trace!(method = %request.method, url = %url, "Sending request");

        let mut builder = self
            .http
            .request(request.method.clone(), url.clone())
            .header("Authorization", format!("Bearer {}", self.token));
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        debug!(
            method = %request.method,
            url = %url,
            status = status.as_u16(),
            "API response"
        );

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(response.headers());
            return Err(ClientError::RateLimited { retry_after });
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(ClientError::RequestFailed {
                status: status.as_u16(),
                body,
            });
        }

        let text = if body.trim().is_empty() { "null" } else { body.as_str() };
        match serde_json::from_str(text) {
            Ok(value) => Ok(value),
            Err(source) => Err(ClientError::Decode { source, body }),
        }
    }

    /// Issue a request under a retry policy
    pub async fn send_with_retries<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        policy: &RetryPolicy,
    ) -> Result<T> {
        with_retries(policy, move |attempt| {
            trace!(attempt, path = %request.path, "Attempt");
            self.send(request)
        })
        .await
    }

    fn transport_error(&self, err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout {
                duration: self.timeout,
            }
        } else {
            ClientError::Transport(err)
        }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// `Retry-After` in whole seconds; absent or unparseable means no wait
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::ZERO)
}
