use crate::config::error::{ConfigError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use storefront_local_cache::CollectionSpec;
use storefront_resilience::{CircuitBreakerConfig, RetryPolicy};

/// Environment variable prefix (`STOREFRONT_API__BASE_URL`, ...)
pub const ENV_PREFIX: &str = "STOREFRONT";

/// Root storefront configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub circuit_breaker: BreakerConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Retry policy for backend calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_true")]
    pub exponential_backoff: bool,

    /// Random extra delay as a fraction of the base delay (0.0-1.0)
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

/// Circuit breaker thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_breaker_secs")]
    pub failure_window_secs: u64,

    #[serde(default = "default_breaker_secs")]
    pub open_secs: u64,
}

/// Size and age bounds for one collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionLimits {
    pub max_items: usize,
    pub retention_days: u32,
}

/// Local cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory for collection files. Defaults to the platform data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,

    /// Minimum hours between recently-viewed existence checks
    #[serde(default = "default_revalidation_interval_hours")]
    pub revalidation_interval_hours: u32,

    #[serde(default = "default_recently_viewed_limits")]
    pub recently_viewed: CollectionLimits,

    #[serde(default = "default_wishlist_limits")]
    pub wishlist: CollectionLimits,

    #[serde(default = "default_saved_for_later_limits")]
    pub saved_for_later: CollectionLimits,

    #[serde(default = "default_compare_limits")]
    pub compare: CollectionLimits,
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` wins when set
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_max_retries() -> u32 {
    3
}
fn default_initial_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    10_000
}
fn default_true() -> bool {
    true
}
fn default_jitter_factor() -> f64 {
    0.1
}
fn default_failure_threshold() -> u32 {
    5
}
fn default_breaker_secs() -> u64 {
    60
}
fn default_revalidation_interval_hours() -> u32 {
    24
}
fn default_recently_viewed_limits() -> CollectionLimits {
    CollectionLimits {
        max_items: 10,
        retention_days: 30,
    }
}
fn default_wishlist_limits() -> CollectionLimits {
    CollectionLimits {
        max_items: 100,
        retention_days: 90,
    }
}
fn default_saved_for_later_limits() -> CollectionLimits {
    CollectionLimits {
        max_items: 50,
        retention_days: 60,
    }
}
fn default_compare_limits() -> CollectionLimits {
    CollectionLimits {
        max_items: 4,
        retention_days: 30,
    }
}
fn default_log_filter() -> String {
    "info".to_string()
}

// Default implementations
impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            exponential_backoff: default_true(),
            jitter_factor: default_jitter_factor(),
        }
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            failure_window_secs: default_breaker_secs(),
            open_secs: default_breaker_secs(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            storage_dir: None,
            revalidation_interval_hours: default_revalidation_interval_hours(),
            recently_viewed: default_recently_viewed_limits(),
            wishlist: default_wishlist_limits(),
            saved_for_later: default_saved_for_later_limits(),
            compare: default_compare_limits(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            exponential_backoff: self.exponential_backoff,
            jitter_factor: self.jitter_factor,
        }
    }
}

impl BreakerConfig {
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            failure_window: Duration::from_secs(self.failure_window_secs),
            open_duration: Duration::from_secs(self.open_secs),
        }
    }
}

impl CollectionLimits {
    pub fn apply(&self, spec: CollectionSpec) -> CollectionSpec {
        spec.with_max_items(self.max_items)
            .with_retention_days(self.retention_days)
    }
}

impl CacheConfig {
    /// Configured directory, else `<data_local_dir>/storefront`.
    pub fn resolved_storage_dir(&self) -> Option<PathBuf> {
        self.storage_dir
            .clone()
            .or_else(|| dirs::data_local_dir().map(|dir| dir.join("storefront")))
    }

    pub fn revalidation_interval(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.revalidation_interval_hours))
    }
}

impl AppConfig {
    /// Checks the schema cannot express.
    pub fn check_consistency(&self) -> Result<()> {
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::ValidationError(format!(
                "retry.initial_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.retry.initial_delay_ms, self.retry.max_delay_ms
            )));
        }
        Ok(())
    }
}

/// Configuration loader with layered merging support
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration with layered merging:
    /// 1. Defaults (from Default implementations)
    /// 2. Config file if provided
    /// 3. Environment variables (STOREFRONT_ prefix)
    ///
    /// The merged result is checked against the embedded JSON Schema.
    pub fn load(&self) -> Result<AppConfig> {
        let mut builder = Config::builder();

        let defaults_json = serde_json::to_string(&AppConfig::default())?;
        builder = builder.add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        if let Some(ref path) = self.config_path {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_ref()));
            } else {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
        }

        // STOREFRONT_CACHE__WISHLIST__MAX_ITEMS=200 -> cache.wishlist.max_items
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let app_config: AppConfig = builder.build()?.try_deserialize()?;

        let validator = crate::config::validator::SchemaValidator::new()?;
        validator.validate(&app_config)?;
        app_config.check_consistency()?;

        tracing::debug!(
            file = ?self.config_path,
            base_url = %app_config.api.base_url,
            "configuration loaded"
        );
        Ok(app_config)
    }

    /// Locate the config file in standard locations:
    /// 1. `./storefront.toml`
    /// 2. `<config_dir>/storefront/config.toml`
    /// 3. `~/.storefront.toml`
    pub fn find_config_file() -> Option<PathBuf> {
        let cwd_config = PathBuf::from("./storefront.toml");
        if cwd_config.exists() {
            return Some(cwd_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("storefront").join("config.toml");
            if xdg_config.exists() {
                return Some(xdg_config);
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(".storefront.toml");
            if home_config.exists() {
                return Some(home_config);
            }
        }

        None
    }

    pub fn load_default() -> Result<AppConfig> {
        let loader = match Self::find_config_file() {
            Some(config_path) => ConfigLoader::new().with_file(config_path),
            None => ConfigLoader::new(),
        };
        loader.load()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
