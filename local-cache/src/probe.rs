use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("existence check for {handle} failed: {message}")]
    Failed { handle: String, message: String },

    #[error("existence check for {handle} returned HTTP {status}")]
    UnexpectedStatus { handle: String, status: u16 },
}

/// Lightweight "does this product still exist" check.
///
/// `Ok(false)` means the backend positively reported the product gone. Any
/// doubt must be an `Err`, and callers keep the cached item in that case.
#[async_trait]
pub trait ExistenceProbe: Send + Sync {
    async fn exists(&self, handle: &str) -> Result<bool, ProbeError>;
}
