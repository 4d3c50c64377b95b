//! User-facing copy for each error category.
//!
//! `get_message` is pure: the same category and context always produce the
//! same bundle. Technical detail is only attached when the caller opts in.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{ErrorCategory, RawError, Severity, categorize};

/// Failed sign-ins after which the copy points at password reset.
pub const RESET_PASSWORD_AFTER_ATTEMPTS: u32 = 3;

/// Who is looking at the message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    #[default]
    Customer,
    Staff,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageContext {
    pub audience: Audience,
    /// Consecutive failed sign-in attempts in this session.
    pub failed_attempts: u32,
    /// Server-provided wait, when rate limited.
    pub retry_after: Option<Duration>,
    /// Attach raw status/name/message for the diagnostic view.
    pub include_diagnostics: bool,
}

impl MessageContext {
    pub fn staff() -> Self {
        Self {
            audience: Audience::Staff,
            ..Self::default()
        }
    }
}

/// Technical detail, only shown in the opt-in diagnostic view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub category: ErrorCategory,
    pub status: Option<u16>,
    pub name: Option<String>,
    pub raw_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBundle {
    pub title: String,
    pub description: String,
    pub action: String,
    pub severity: Severity,
    /// Whether the UI should offer a "try again" affordance.
    pub retryable: bool,
    pub troubleshooting: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

/// Build the message bundle for a category.
pub fn get_message(category: ErrorCategory, context: &MessageContext) -> MessageBundle {
    let staff = context.audience == Audience::Staff;

    let (title, description, action, retryable, troubleshooting): (
        &str,
        String,
        &str,
        bool,
        &[&str],
    ) = match category {
        ErrorCategory::Network => (
            "Connection problem",
            "We couldn't reach the store. Check your internet connection.".to_string(),
            "Try again",
            true,
            &[
                "Check that you are online",
                "Disable VPN or proxy software and retry",
                "Reload the page",
            ],
        ),
        ErrorCategory::Timeout => (
            "Request timed out",
            "The store took too long to respond.".to_string(),
            "Try again",
            true,
            &[
                "Wait a moment and retry",
                "Check for a slow or unstable connection",
            ],
        ),
        ErrorCategory::Cors => (
            "Blocked request",
            "Your browser blocked a request to the store.".to_string(),
            "Reload the page",
            false,
            &[
                "Make sure you are on the official store address",
                "Disable browser extensions that modify requests",
            ],
        ),
        ErrorCategory::RateLimited => (
            "Too many attempts",
            match context.retry_after {
                Some(wait) => format!(
                    "You've made too many requests. Please wait {} seconds before trying again.",
                    wait.as_secs().max(1)
                ),
                None => "You've made too many requests. Please wait a moment before trying again."
                    .to_string(),
            },
            "Wait and retry",
            true,
            &["Avoid refreshing repeatedly", "Wait before retrying"],
        ),
        ErrorCategory::ServerError => (
            "Something went wrong on our end",
            "The store is having trouble right now. Your data is safe.".to_string(),
            "Try again",
            true,
            &["Retry in a few minutes", "Contact support if the problem persists"],
        ),
        ErrorCategory::PermissionDenied => (
            "Access denied",
            if staff {
                "Your staff role does not allow this action.".to_string()
            } else {
                "You don't have permission to view this page.".to_string()
            },
            if staff {
                "Ask an administrator for access"
            } else {
                "Go to homepage"
            },
            false,
            &["Sign in with a different account", "Contact support"],
        ),
        ErrorCategory::ExpiredSession => (
            "Session expired",
            if staff {
                "Your staff session has expired. Sign in to the admin portal again to continue."
                    .to_string()
            } else {
                "Your session has expired. Please sign in again; your cart has been saved."
                    .to_string()
            },
            "Sign in again",
            false,
            &["Sign in again", "Enable cookies for this site"],
        ),
        ErrorCategory::InvalidCredentials => {
            let escalate = context.failed_attempts >= RESET_PASSWORD_AFTER_ATTEMPTS;
            (
                "Sign-in failed",
                if escalate {
                    format!(
                        "That email and password still don't match after {} attempts.",
                        context.failed_attempts
                    )
                } else {
                    "The email or password you entered is incorrect.".to_string()
                },
                if escalate { "Reset password" } else { "Try again" },
                !escalate,
                &[
                    "Check that Caps Lock is off",
                    "Make sure you are using the email you registered with",
                    "Reset your password if you've forgotten it",
                ],
            )
        }
        ErrorCategory::AccountLocked => (
            "Account locked",
            "Your account has been temporarily locked for your security.".to_string(),
            "Contact support",
            false,
            &[
                "Wait 30 minutes before signing in again",
                "Reset your password to unlock immediately",
            ],
        ),
        ErrorCategory::InvalidToken => (
            "Link no longer valid",
            "This sign-in or reset link is invalid or has already been used.".to_string(),
            "Request a new link",
            false,
            &["Use the most recent email we sent", "Request a new link"],
        ),
        ErrorCategory::TwoFactorRequired => (
            "Verification code required",
            "Enter the code from your authenticator app to continue.".to_string(),
            "Enter code",
            false,
            &[
                "Check that your device clock is correct",
                "Use a backup code if you lost your device",
            ],
        ),
        ErrorCategory::EmailNotVerified => (
            "Verify your email",
            "Please confirm your email address before signing in.".to_string(),
            "Resend verification email",
            false,
            &["Check your spam folder", "Resend the verification email"],
        ),
        ErrorCategory::MaintenanceMode => (
            "Scheduled maintenance",
            "The store is being updated and will be back shortly.".to_string(),
            "Check back soon",
            true,
            &["Try again in a few minutes"],
        ),
        ErrorCategory::Unknown => (
            "Unexpected error",
            "Something unexpected happened.".to_string(),
            "Try again",
            true,
            &["Reload the page", "Contact support if the problem persists"],
        ),
    };

    MessageBundle {
        title: title.to_string(),
        description,
        action: action.to_string(),
        severity: category.severity(),
        retryable,
        troubleshooting: troubleshooting.iter().map(|s| (*s).to_string()).collect(),
        diagnostics: None,
    }
}

/// Categorise `raw` and build its bundle, attaching diagnostics on request.
pub fn describe_error(raw: &RawError, context: &MessageContext) -> MessageBundle {
    let category = categorize(raw);
    let mut bundle = get_message(category, context);
    if context.include_diagnostics {
        bundle.diagnostics = Some(Diagnostics {
            category,
            status: raw.status,
            name: raw.name.clone(),
            raw_message: raw.message.clone(),
        });
    }
    bundle
}
