use crate::config::error::{ConfigError, Result};
use crate::config::loader::{AppConfig, ENV_PREFIX};
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

/// Schema validator for the storefront configuration
pub struct SchemaValidator {
    app_schema: JSONSchema,
}

impl SchemaValidator {
    /// Compile the schema embedded at build time.
    pub fn new() -> Result<Self> {
        let app_schema_str = include_str!("schemas/app_config.schema.json");
        let app_schema_value: Value = serde_json::from_str(app_schema_str).map_err(|e| {
            ConfigError::SchemaValidationError(format!("Failed to parse app schema: {e}"))
        })?;

        let app_schema = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&app_schema_value)
            .map_err(|e| {
                ConfigError::SchemaValidationError(format!("Failed to compile app schema: {e}"))
            })?;

        Ok(Self { app_schema })
    }

    /// Validate an `AppConfig`, reporting every violation at once.
    ///
    /// Each violation is keyed by its dotted setting name and the
    /// environment variable that overrides it.
    ///
    /// ```no_run
    /// use storefront_client::config::{AppConfig, SchemaValidator};
    ///
    /// let validator = SchemaValidator::new()?;
    /// validator.validate(&AppConfig::default())?;
    /// # Ok::<(), storefront_client::config::ConfigError>(())
    /// ```
    pub fn validate(&self, config: &AppConfig) -> Result<()> {
        let config_value = serde_json::to_value(config).map_err(|e| {
            ConfigError::SchemaValidationError(format!("Failed to serialize config: {e}"))
        })?;

        let Err(errors) = self.app_schema.validate(&config_value) else {
            return Ok(());
        };

        let mut problems: Vec<(String, String)> = errors
            .map(|e| (setting_key(&e.instance_path.to_string()), e.to_string()))
            .collect();
        problems.sort();

        let mut report = match problems.len() {
            1 => "1 invalid storefront setting:".to_string(),
            n => format!("{n} invalid storefront settings:"),
        };
        for (key, problem) in &problems {
            report.push_str(&format!("\n  {key}: {problem}"));
            if let Some(var) = env_override(key) {
                report.push_str(&format!(" (env {var})"));
            }
        }
        Err(ConfigError::SchemaValidationError(report))
    }
}

/// `/cache/compare/max_items` -> `cache.compare.max_items`.
fn setting_key(pointer: &str) -> String {
    let key = pointer.trim_start_matches('/').replace('/', ".");
    if key.is_empty() {
        "<root>".to_string()
    } else {
        key
    }
}

/// Environment variable the loader maps onto `key`, if it has one.
fn env_override(key: &str) -> Option<String> {
    if key.starts_with('<') {
        return None;
    }
    Some(format!(
        "{ENV_PREFIX}_{}",
        key.replace('.', "__").to_uppercase()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> SchemaValidator {
        SchemaValidator::new().expect("Failed to create validator")
    }

    #[test]
    fn test_valid_default_config() {
        let result = validator().validate(&AppConfig::default());
        assert!(result.is_ok(), "Default config should be valid: {result:?}");
    }

    #[test]
    fn test_jitter_factor_above_one() {
        let mut config = AppConfig::default();
        config.retry.jitter_factor = 1.5;

        let err = validator().validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::SchemaValidationError(_)));
        let err_msg = err.to_string();
        assert!(
            err_msg.contains("jitter_factor"),
            "Error should mention jitter_factor, got: {err_msg}"
        );
    }

    #[test]
    fn test_zero_failure_threshold() {
        let mut config = AppConfig::default();
        config.circuit_breaker.failure_threshold = 0;

        let err_msg = validator().validate(&config).unwrap_err().to_string();
        assert!(
            err_msg.contains("failure_threshold"),
            "Error should mention failure_threshold, got: {err_msg}"
        );
    }

    #[test]
    fn test_base_url_needs_scheme() {
        let mut config = AppConfig::default();
        config.api.base_url = "shop.example.com".to_string();

        let err_msg = validator().validate(&config).unwrap_err().to_string();
        assert!(err_msg.contains("1 invalid storefront setting:"), "got: {err_msg}");
        assert!(err_msg.contains("api.base_url: "), "got: {err_msg}");
    }

    #[test]
    fn test_multiple_errors_are_all_reported() {
        let mut config = AppConfig::default();
        config.cache.compare.max_items = 0;
        config.cache.wishlist.retention_days = 0;
        config.retry.max_retries = 50;

        let err_msg = validator().validate(&config).unwrap_err().to_string();
        assert!(err_msg.contains("3 invalid storefront settings"), "got: {err_msg}");

        // Sorted by setting name, each with its override variable.
        let compare = err_msg.find("cache.compare.max_items:").unwrap();
        let wishlist = err_msg.find("cache.wishlist.retention_days:").unwrap();
        let retries = err_msg.find("retry.max_retries:").unwrap();
        assert!(compare < wishlist && wishlist < retries, "got: {err_msg}");
        assert!(
            err_msg.contains("(env STOREFRONT_CACHE__WISHLIST__RETENTION_DAYS)"),
            "got: {err_msg}"
        );
    }

    #[test]
    fn test_setting_keys_follow_config_paths() {
        assert_eq!(setting_key("/retry/jitter_factor"), "retry.jitter_factor");
        assert_eq!(setting_key(""), "<root>");
        assert_eq!(
            env_override("api.base_url").as_deref(),
            Some("STOREFRONT_API__BASE_URL")
        );
        assert_eq!(env_override("<root>"), None);
    }
}
