//! Error classification for retry decisions

use crate::taxonomy::{ErrorInfo, RawError};

/// Trait for errors the retry engine can reason about.
///
/// Implementors only describe what was observed; categorisation and the
/// default retry decision come from the taxonomy.
pub trait RetryClassifiable {
    fn raw_error(&self) -> RawError;

    fn classify(&self) -> ErrorInfo {
        ErrorInfo::from_raw(&self.raw_error())
    }

    fn is_retryable(&self) -> bool {
        self.classify().retryable
    }
}

impl RetryClassifiable for RawError {
    fn raw_error(&self) -> RawError {
        self.clone()
    }
}

impl RetryClassifiable for std::io::Error {
    fn raw_error(&self) -> RawError {
        use std::io::ErrorKind;

        match self.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => RawError::timeout(self.to_string()),
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe => RawError::transport(self.to_string()),
            ErrorKind::Interrupted => RawError::aborted(),
            ErrorKind::PermissionDenied => {
                RawError::new(crate::taxonomy::RawErrorKind::Other, "permission denied")
            }
            _ => RawError::new(crate::taxonomy::RawErrorKind::Other, self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::ErrorCategory;
    use std::io::{Error, ErrorKind};

    #[test]
    fn io_errors_map_onto_taxonomy() {
        let refused = Error::new(ErrorKind::ConnectionRefused, "refused");
        assert_eq!(refused.classify().category, ErrorCategory::Network);
        assert!(refused.is_retryable());

        let timed_out = Error::new(ErrorKind::TimedOut, "slow");
        assert_eq!(timed_out.classify().category, ErrorCategory::Timeout);
        assert!(timed_out.is_retryable());

        let denied = Error::new(ErrorKind::PermissionDenied, "nope");
        assert_eq!(denied.classify().category, ErrorCategory::PermissionDenied);
        assert!(!denied.is_retryable());

        let interrupted = Error::new(ErrorKind::Interrupted, "stop");
        assert!(!interrupted.is_retryable());
    }
}
