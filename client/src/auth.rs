//! Session checks with retries and shopper-facing failure copy.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use storefront_resilience::{
    Audience, ErrorCategory, ErrorInfo, MessageBundle, MessageContext, RetryClassifiable,
    RetryEngine, RetryError, Severity, describe_error,
};

use crate::api::{ApiError, AuthStatus, BackendClient};

/// A failed session check, ready to render.
#[derive(Debug, Clone, Error)]
#[error("{code}: {}", .message.title)]
pub struct AuthFailure {
    /// Category code, or `circuit_open` / `aborted`.
    pub code: &'static str,
    /// Categorised error; `None` when no attempt was made or it was cancelled.
    pub info: Option<ErrorInfo>,
    pub message: MessageBundle,
    pub attempts: u32,
}

impl AuthFailure {
    pub fn category(&self) -> Option<ErrorCategory> {
        self.info.as_ref().map(|info| info.category)
    }
}

pub struct AuthSession {
    client: Arc<BackendClient>,
    engine: RetryEngine,
    audience: Audience,
    include_diagnostics: bool,
    failed_attempts: u32,
}

impl AuthSession {
    pub fn new(client: Arc<BackendClient>, engine: RetryEngine) -> Self {
        Self {
            client,
            engine,
            audience: Audience::Customer,
            include_diagnostics: false,
            failed_attempts: 0,
        }
    }

    pub fn with_audience(mut self, audience: Audience) -> Self {
        self.audience = audience;
        self
    }

    /// Attach raw status and message to failure bundles.
    pub fn with_diagnostics(mut self, include: bool) -> Self {
        self.include_diagnostics = include;
        self
    }

    /// Consecutive invalid-credential failures since the last success.
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    pub fn engine(&self) -> &RetryEngine {
        &self.engine
    }

    pub async fn check(&mut self) -> Result<AuthStatus, AuthFailure> {
        let client = &self.client;
        let result = self.engine.execute(|| client.check_auth()).await;
        self.finish(result)
    }

    pub async fn check_cancellable(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<AuthStatus, AuthFailure> {
        let client = &self.client;
        let result = self
            .engine
            .execute_cancellable(|| client.check_auth(), cancel)
            .await;
        self.finish(result)
    }

    fn finish(
        &mut self,
        result: Result<AuthStatus, RetryError<ApiError>>,
    ) -> Result<AuthStatus, AuthFailure> {
        let err = match result {
            Ok(status) => {
                self.failed_attempts = 0;
                return Ok(status);
            }
            Err(err) => err,
        };

        let code = err.code();
        let failure = match err {
            RetryError::CircuitOpen { retry_after } => AuthFailure {
                code,
                info: None,
                message: MessageBundle {
                    title: "Service temporarily unavailable".to_string(),
                    description: format!(
                        "The store is not responding. We'll try again in {} seconds.",
                        retry_after.as_secs().max(1)
                    ),
                    action: "Try again later".to_string(),
                    severity: Severity::Warning,
                    retryable: true,
                    troubleshooting: vec!["Wait a minute before retrying".to_string()],
                    diagnostics: None,
                },
                attempts: 0,
            },
            RetryError::Aborted => AuthFailure {
                code,
                info: None,
                message: MessageBundle {
                    title: "Request cancelled".to_string(),
                    description: "The session check was cancelled.".to_string(),
                    action: "Try again".to_string(),
                    severity: Severity::Info,
                    retryable: true,
                    troubleshooting: Vec::new(),
                    diagnostics: None,
                },
                attempts: self.engine.state().attempt,
            },
            RetryError::Failed {
                attempts,
                info,
                source,
            } => {
                if info.category == ErrorCategory::InvalidCredentials {
                    self.failed_attempts = self.failed_attempts.saturating_add(1);
                }
                let context = MessageContext {
                    audience: self.audience,
                    failed_attempts: self.failed_attempts,
                    retry_after: source.retry_after(),
                    include_diagnostics: self.include_diagnostics,
                };
                AuthFailure {
                    code,
                    message: describe_error(&source.raw_error(), &context),
                    info: Some(info),
                    attempts,
                }
            }
        };

        tracing::warn!(
            code = failure.code,
            attempts = failure.attempts,
            failed_attempts = self.failed_attempts,
            "session check failed"
        );
        Err(failure)
    }
}
