//! Layered storefront configuration
//!
//! 1. Defaults (from code)
//! 2. Config file (`storefront.toml`)
//! 3. Environment variables (`STOREFRONT_*`, `__` for nesting)
//!
//! ```no_run
//! use storefront_client::config::ConfigLoader;
//!
//! let config = ConfigLoader::load_default()?;
//! assert!(!config.api.base_url.is_empty());
//! # Ok::<(), storefront_client::config::ConfigError>(())
//! ```

pub mod error;
pub mod loader;
pub mod validator;

pub use error::{ConfigError, Result};
pub use loader::{
    ApiConfig, AppConfig, BreakerConfig, CacheConfig, CollectionLimits, ConfigLoader,
    LoggingConfig, RetryConfig,
};
pub use validator::SchemaValidator;
