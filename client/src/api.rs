//! HTTP client for the storefront backend.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_local_cache::{ExistenceProbe, ProbeError};
use storefront_resilience::{RawError, RawErrorKind, RetryClassifiable};

use crate::config::ApiConfig;

const USER_AGENT: &str = concat!("storefront-client/", env!("CARGO_PKG_VERSION"));

/// Errors from backend calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No HTTP response (DNS, connect, timeout, reset).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx response.
    #[error("API error ({status}): {message}")]
    Status {
        status: u16,
        message: String,
        /// Parsed `Retry-After`, when the backend sent one.
        retry_after: Option<Duration>,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            ApiError::Parse(_) | ApiError::InvalidConfig(_) => None,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl RetryClassifiable for ApiError {
    fn raw_error(&self) -> RawError {
        match self {
            ApiError::Network(e) if e.is_timeout() => RawError::timeout(e.to_string()),
            ApiError::Network(e) if e.is_connect() || e.is_request() => {
                RawError::transport(e.to_string())
            }
            ApiError::Network(e) => match e.status() {
                Some(status) => RawError::http(status.as_u16(), e.to_string()),
                None => RawError::transport(e.to_string()),
            },
            ApiError::Status {
                status, message, ..
            } => RawError::http(*status, message.clone()),
            ApiError::Parse(message) | ApiError::InvalidConfig(message) => {
                RawError::new(RawErrorKind::Other, message.clone()).with_retryable(false)
            }
        }
    }
}

/// Shopper identity returned by the auth check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub authenticated: bool,
    #[serde(default)]
    pub customer: Option<CustomerSummary>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(config: &ApiConfig) -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout())
            .build()?;
        Self::with_client(client, &config.base_url)
    }

    /// Use a preconfigured HTTP client, e.g. in tests.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> ApiResult<Self> {
        let base_url = base_url.trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ApiError::InvalidConfig(format!(
                "base url must be http(s): {base_url}"
            )));
        }
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `GET /api/auth/check`
    pub async fn check_auth(&self) -> ApiResult<AuthStatus> {
        let response = self.client.get(self.url("/api/auth/check")).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Self::status_error(status, response).await);
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ApiError::Parse(format!("Failed to parse auth status: {e}")))
    }

    /// `HEAD /api/products/{handle}`: 2xx exists, 404/410 gone.
    pub async fn product_exists(&self, handle: &str) -> ApiResult<bool> {
        let url = self.url(&format!("/api/products/{}", urlencoding::encode(handle)));
        let response = self.client.head(url).send().await?;
        let status = response.status();
        match status {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(false),
            _ => Err(Self::status_error(status, response).await),
        }
    }

    async fn status_error(status: StatusCode, response: reqwest::Response) -> ApiError {
        let retry_after = parse_retry_after(response.headers());
        let error_text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&error_text)
            .ok()
            .and_then(|body| body.message.or(body.error))
            .unwrap_or(error_text);
        tracing::debug!(status = status.as_u16(), %message, "backend returned an error");
        ApiError::Status {
            status: status.as_u16(),
            message,
            retry_after,
        }
    }
}

/// Only the delay-seconds form is honoured; HTTP dates are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[async_trait]
impl ExistenceProbe for BackendClient {
    async fn exists(&self, handle: &str) -> Result<bool, ProbeError> {
        self.product_exists(handle).await.map_err(|e| match e {
            ApiError::Status { status, .. } => ProbeError::UnexpectedStatus {
                handle: handle.to_string(),
                status,
            },
            other => ProbeError::Failed {
                handle: handle.to_string(),
                message: other.to_string(),
            },
        })
    }
}
