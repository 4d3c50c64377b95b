//! Error taxonomy for storefront API failures
//!
//! Every failure that reaches the UI is reduced to a [`RawError`] (what we
//! observed: transport failure, HTTP status, error name, message) and then
//! categorised into a fixed [`ErrorCategory`]. Categorisation is a pure
//! function so it can be exercised with synthetic errors.

pub mod messages;

use serde::{Deserialize, Serialize};

pub use messages::{
    Audience, Diagnostics, MessageBundle, MessageContext, describe_error, get_message,
};

/// HTTP statuses that are worth retrying without further context.
pub const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Error names that identify a failure below HTTP (no response reached us).
const TRANSPORT_ERROR_NAMES: [&str; 3] = ["TypeError", "NetworkError", "FetchError"];

/// Error names that identify an aborted or timed-out request.
const TIMEOUT_ERROR_NAMES: [&str; 2] = ["AbortError", "TimeoutError"];

/// How the failure surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawErrorKind {
    /// The request never produced an HTTP response (DNS, connect, reset).
    Transport,
    /// The request was cut off by a deadline.
    Timeout,
    /// The caller abandoned the request.
    Aborted,
    /// Anything else, usually an HTTP response or an application error.
    Other,
}

/// Observed failure, before categorisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{}", summarize(*status, message))]
pub struct RawError {
    pub kind: RawErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub message: String,
    /// Explicit override of the retry decision, when the backend says so.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl RawError {
    pub fn new(kind: RawErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            name: None,
            message: message.into(),
            retryable: None,
        }
    }

    /// Non-2xx HTTP response.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            ..Self::new(RawErrorKind::Other, message)
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(RawErrorKind::Transport, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(RawErrorKind::Timeout, message)
    }

    pub fn aborted() -> Self {
        Self::new(RawErrorKind::Aborted, "request aborted")
    }

    /// Error identified by name only (e.g. `AbortError`), without a status.
    pub fn named(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(RawErrorKind::Other, message)
        }
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }
}

fn summarize(status: Option<u16>, message: &str) -> String {
    match status {
        Some(status) if message.is_empty() => format!("HTTP {status}"),
        Some(status) => format!("HTTP {status}: {message}"),
        None => message.to_string(),
    }
}

/// Fixed failure taxonomy shown to shoppers and staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    #[serde(rename = "network_error")]
    Network,
    Timeout,
    #[serde(rename = "cors_error")]
    Cors,
    RateLimited,
    ServerError,
    PermissionDenied,
    ExpiredSession,
    InvalidCredentials,
    AccountLocked,
    InvalidToken,
    TwoFactorRequired,
    EmailNotVerified,
    MaintenanceMode,
    #[serde(rename = "unknown_error")]
    Unknown,
}

impl ErrorCategory {
    /// Stable code used in logs and by UI components.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Network => "network_error",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Cors => "cors_error",
            ErrorCategory::RateLimited => "rate_limited",
            ErrorCategory::ServerError => "server_error",
            ErrorCategory::PermissionDenied => "permission_denied",
            ErrorCategory::ExpiredSession => "expired_session",
            ErrorCategory::InvalidCredentials => "invalid_credentials",
            ErrorCategory::AccountLocked => "account_locked",
            ErrorCategory::InvalidToken => "invalid_token",
            ErrorCategory::TwoFactorRequired => "two_factor_required",
            ErrorCategory::EmailNotVerified => "email_not_verified",
            ErrorCategory::MaintenanceMode => "maintenance_mode",
            ErrorCategory::Unknown => "unknown_error",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            ErrorCategory::Timeout
            | ErrorCategory::RateLimited
            | ErrorCategory::ExpiredSession
            | ErrorCategory::InvalidToken => Severity::Warning,
            ErrorCategory::TwoFactorRequired
            | ErrorCategory::EmailNotVerified
            | ErrorCategory::MaintenanceMode => Severity::Info,
            ErrorCategory::Network
            | ErrorCategory::Cors
            | ErrorCategory::ServerError
            | ErrorCategory::PermissionDenied
            | ErrorCategory::InvalidCredentials
            | ErrorCategory::AccountLocked
            | ErrorCategory::Unknown => Severity::Error,
        }
    }

    /// All categories, in taxonomy order.
    pub fn all() -> [Self; 14] {
        [
            ErrorCategory::Network,
            ErrorCategory::Timeout,
            ErrorCategory::Cors,
            ErrorCategory::RateLimited,
            ErrorCategory::ServerError,
            ErrorCategory::PermissionDenied,
            ErrorCategory::ExpiredSession,
            ErrorCategory::InvalidCredentials,
            ErrorCategory::AccountLocked,
            ErrorCategory::InvalidToken,
            ErrorCategory::TwoFactorRequired,
            ErrorCategory::EmailNotVerified,
            ErrorCategory::MaintenanceMode,
            ErrorCategory::Unknown,
        ]
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Categorised view of a failure. Always recomputed from a [`RawError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub category: ErrorCategory,
    pub http_status: Option<u16>,
    pub message: String,
    pub retryable: bool,
    pub severity: Severity,
}

impl ErrorInfo {
    pub fn from_raw(raw: &RawError) -> Self {
        let category = categorize(raw);
        Self {
            category,
            http_status: raw.status,
            message: raw.to_string(),
            retryable: default_retryable(raw, category),
            severity: category.severity(),
        }
    }
}

/// Categorise a failure. First match wins:
/// transport, CORS, timeout, HTTP status, message keywords, unknown.
pub fn categorize(raw: &RawError) -> ErrorCategory {
    let message = raw.message.to_lowercase();
    let name = raw.name.as_deref().unwrap_or_default();

    if raw.status.is_none() && is_transport_failure(raw.kind, name, &message) {
        return ErrorCategory::Network;
    }

    if contains_any(&message, &["cors", "cross-origin"]) {
        return ErrorCategory::Cors;
    }

    if matches!(raw.kind, RawErrorKind::Timeout | RawErrorKind::Aborted)
        || TIMEOUT_ERROR_NAMES.contains(&name)
    {
        return ErrorCategory::Timeout;
    }

    if let Some(status) = raw.status
        && let Some(category) = categorize_status(status, &message)
    {
        return category;
    }

    categorize_message(&message).unwrap_or(ErrorCategory::Unknown)
}

/// Retry decision used when the caller supplies no custom condition.
pub fn default_retryable(raw: &RawError, category: ErrorCategory) -> bool {
    if raw.kind == RawErrorKind::Aborted {
        return false;
    }
    if let Some(explicit) = raw.retryable {
        return explicit;
    }
    match raw.status {
        // A 401 that says "expired" can succeed once the session is refreshed.
        Some(401) => category == ErrorCategory::ExpiredSession,
        Some(status) => RETRYABLE_STATUSES.contains(&status),
        None => matches!(category, ErrorCategory::Network | ErrorCategory::Timeout),
    }
}

fn is_transport_failure(kind: RawErrorKind, name: &str, message: &str) -> bool {
    if kind == RawErrorKind::Transport {
        return true;
    }
    match name {
        // TypeError is only a transport failure when the fetch itself failed.
        "TypeError" => contains_any(message, &["fetch", "network", "load failed"]),
        other => TRANSPORT_ERROR_NAMES.contains(&other),
    }
}

fn categorize_status(status: u16, message: &str) -> Option<ErrorCategory> {
    let category = match status {
        401 => {
            if contains_any(message, &["expired", "expiry", "expire"]) {
                ErrorCategory::ExpiredSession
            } else {
                ErrorCategory::InvalidCredentials
            }
        }
        403 => {
            if contains_any(message, &["locked", "suspended", "disabled"]) {
                ErrorCategory::AccountLocked
            } else if contains_any(message, &["two-factor", "two factor", "2fa", "mfa"]) {
                ErrorCategory::TwoFactorRequired
            } else if contains_any(message, &["verify", "verification", "not verified"]) {
                ErrorCategory::EmailNotVerified
            } else {
                ErrorCategory::PermissionDenied
            }
        }
        408 => ErrorCategory::Timeout,
        423 => ErrorCategory::AccountLocked,
        429 => ErrorCategory::RateLimited,
        503 if message.contains("maintenance") => ErrorCategory::MaintenanceMode,
        500..=599 => ErrorCategory::ServerError,
        _ => return None,
    };
    Some(category)
}

fn categorize_message(message: &str) -> Option<ErrorCategory> {
    const KEYWORDS: &[(&[&str], ErrorCategory)] = &[
        (&["expired"], ErrorCategory::ExpiredSession),
        (
            &[
                "invalid credentials",
                "invalid password",
                "incorrect password",
                "wrong password",
                "bad password",
                "invalid email or password",
            ],
            ErrorCategory::InvalidCredentials,
        ),
        (&["network", "failed to fetch"], ErrorCategory::Network),
        (
            &["permission", "forbidden", "access denied", "not allowed"],
            ErrorCategory::PermissionDenied,
        ),
        (&["locked", "suspended"], ErrorCategory::AccountLocked),
        (
            &["rate limit", "rate-limit", "too many requests", "too many attempts"],
            ErrorCategory::RateLimited,
        ),
        (&["maintenance"], ErrorCategory::MaintenanceMode),
        (&["token"], ErrorCategory::InvalidToken),
        (
            &["2fa", "two-factor", "two factor", "mfa"],
            ErrorCategory::TwoFactorRequired,
        ),
        (&["verify", "verification"], ErrorCategory::EmailNotVerified),
    ];

    KEYWORDS
        .iter()
        .find(|(needles, _)| contains_any(message, needles))
        .map(|(_, category)| *category)
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn status_401_splits_on_expiry() {
        assert_eq!(
            categorize(&RawError::http(401, "Token expired")),
            ErrorCategory::ExpiredSession
        );
        assert_eq!(
            categorize(&RawError::http(401, "bad password")),
            ErrorCategory::InvalidCredentials
        );
    }

    #[test]
    fn fetch_type_error_is_network() {
        let raw = RawError::named("TypeError", "fetch failed");
        assert_eq!(categorize(&raw), ErrorCategory::Network);
        assert_eq!(ErrorCategory::Network.as_str(), "network_error");
    }

    #[test]
    fn unrelated_type_error_is_not_network() {
        let raw = RawError::named("TypeError", "cannot read properties of undefined");
        assert_eq!(categorize(&raw), ErrorCategory::Unknown);
    }

    #[test]
    fn rate_limit_and_server_statuses() {
        assert_eq!(categorize(&RawError::http(429, "")), ErrorCategory::RateLimited);
        assert_eq!(categorize(&RawError::http(503, "")), ErrorCategory::ServerError);
        assert_eq!(categorize(&RawError::http(500, "boom")), ErrorCategory::ServerError);
        assert_eq!(
            categorize(&RawError::http(503, "Down for scheduled maintenance")),
            ErrorCategory::MaintenanceMode
        );
    }

    #[test]
    fn status_403_keywords() {
        let cases = [
            ("Account locked after too many attempts", ErrorCategory::AccountLocked),
            ("Two-factor code required", ErrorCategory::TwoFactorRequired),
            ("Please verify your email", ErrorCategory::EmailNotVerified),
            ("staff only", ErrorCategory::PermissionDenied),
        ];
        for (message, expected) in cases {
            assert_eq!(categorize(&RawError::http(403, message)), expected, "{message}");
        }
    }

    #[test]
    fn cors_beats_status() {
        let raw = RawError::http(500, "Blocked by CORS policy");
        assert_eq!(categorize(&raw), ErrorCategory::Cors);
    }

    #[test]
    fn timeouts_by_kind_name_and_status() {
        assert_eq!(categorize(&RawError::timeout("deadline")), ErrorCategory::Timeout);
        assert_eq!(
            categorize(&RawError::named("AbortError", "signal aborted")),
            ErrorCategory::Timeout
        );
        assert_eq!(categorize(&RawError::http(408, "")), ErrorCategory::Timeout);
        assert_eq!(categorize(&RawError::http(423, "")), ErrorCategory::AccountLocked);
    }

    #[test]
    fn keyword_fallback_for_unhandled_status() {
        assert_eq!(
            categorize(&RawError::http(400, "Invalid token supplied")),
            ErrorCategory::InvalidToken
        );
        assert_eq!(
            categorize(&RawError::new(RawErrorKind::Other, "something odd")),
            ErrorCategory::Unknown
        );
    }

    #[test]
    fn default_retryability() {
        for status in RETRYABLE_STATUSES {
            assert!(ErrorInfo::from_raw(&RawError::http(status, "")).retryable, "{status}");
        }
        assert!(!ErrorInfo::from_raw(&RawError::http(401, "bad password")).retryable);
        assert!(ErrorInfo::from_raw(&RawError::http(401, "session expired")).retryable);
        assert!(!ErrorInfo::from_raw(&RawError::http(403, "")).retryable);
        assert!(!ErrorInfo::from_raw(&RawError::http(400, "bad request")).retryable);
        assert!(ErrorInfo::from_raw(&RawError::transport("connection reset")).retryable);
        assert!(!ErrorInfo::from_raw(&RawError::aborted()).retryable);
        assert!(
            ErrorInfo::from_raw(&RawError::http(400, "retry me").with_retryable(true)).retryable
        );
        assert!(!ErrorInfo::from_raw(&RawError::http(503, "").with_retryable(false)).retryable);
    }

    #[test]
    fn category_codes_serialise_as_taxonomy_names() {
        let json = serde_json::to_string(&ErrorCategory::all()).expect("serialize");
        assert_eq!(
            json,
            r#"["network_error","timeout","cors_error","rate_limited","server_error","permission_denied","expired_session","invalid_credentials","account_locked","invalid_token","two_factor_required","email_not_verified","maintenance_mode","unknown_error"]"#
        );
    }
}
