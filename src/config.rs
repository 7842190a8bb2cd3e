//! User settings from `config.toml` and credential resolution.

use anyhow::{Context, Result, bail};
use reconcile::{RetryConfig, WaitOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::paths;

/// Environment variable consulted when the config file carries no key
pub const ENV_MANAGEMENT_KEY: &str = "TYPESENSE_MANAGEMENT_KEY";

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Management API key; takes precedence over the environment
    pub key: Option<String>,

    /// Base URL of the management API
    pub api_base: Option<String>,

    /// Seconds between status polls while waiting for a cluster
    pub poll_interval_secs: Option<u64>,

    /// Upper bound on a single wait, in seconds
    pub max_wait_secs: Option<u64>,

    #[serde(default)]
    pub retry: RetrySettings,
}

/// `[retry]` table
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySettings {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub backoff_factor: Option<f64>,
    pub max_delay_ms: Option<u64>,
}

impl Settings {
    /// Load `config.toml` from the config directory
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_file()?)
    }

    /// Load settings from `path`, or defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        settings.validate()?;

        log::debug!("Loaded config from {}", path.display());
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == Some(0) {
            bail!("poll_interval_secs must be at least 1");
        }
        if self.max_wait_secs == Some(0) {
            bail!("max_wait_secs must be at least 1");
        }
        if let Some(factor) = self.retry.backoff_factor
            && !(factor.is_finite() && factor >= 1.0)
        {
            bail!("retry.backoff_factor must be a number >= 1.0, got {factor}");
        }
        Ok(())
    }

    /// Resolve the management key from the config file or the environment
    pub fn resolve_key(&self) -> Result<String> {
        self.resolve_key_with(|name| std::env::var(name).ok())
    }

    /// Config `key` wins; otherwise `TYPESENSE_MANAGEMENT_KEY`
    pub fn resolve_key_with(&self, env: impl Fn(&str) -> Option<String>) -> Result<String> {
        if let Some(key) = self.key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            log::debug!("Using management key from config file");
            return Ok(key.to_string());
        }

        if let Some(key) = env(ENV_MANAGEMENT_KEY)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
        {
            log::debug!("Using management key from {ENV_MANAGEMENT_KEY}");
            return Ok(key);
        }

        bail!(
            "No management API key configured. Set `key` in {} or export {ENV_MANAGEMENT_KEY}",
            paths::config_file()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "config.toml".to_string())
        )
    }

    pub fn api_base(&self) -> &str {
        self.api_base
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or(cloudapi::DEFAULT_API_BASE)
    }

    pub fn wait_options(&self) -> WaitOptions {
        let defaults = WaitOptions::default();
        WaitOptions {
            poll_interval: self
                .poll_interval_secs
                .map_or(defaults.poll_interval, Duration::from_secs),
            max_wait: self
                .max_wait_secs
                .map_or(defaults.max_wait, Duration::from_secs),
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        let defaults = RetryConfig::default();
        RetryConfig {
            max_attempts: self.retry.max_attempts.unwrap_or(defaults.max_attempts),
            base_delay: self
                .retry
                .base_delay_ms
                .map_or(defaults.base_delay, Duration::from_millis),
            backoff_factor: self.retry.backoff_factor.unwrap_or(defaults.backoff_factor),
            max_delay: self
                .retry
                .max_delay_ms
                .map_or(defaults.max_delay, Duration::from_millis),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load_from(&dir.path().join("config.toml")).unwrap();
        assert!(settings.key.is_none());
        assert_eq!(settings.api_base(), cloudapi::DEFAULT_API_BASE);
        assert_eq!(settings.wait_options(), WaitOptions::default());
        assert_eq!(settings.retry_config(), RetryConfig::default());
    }

    #[test]
    fn test_load_full_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
key = "abc"
api_base = "http://localhost:9000/api/v1"
poll_interval_secs = 2
max_wait_secs = 60

[retry]
max_attempts = 5
base_delay_ms = 250
"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.api_base(), "http://localhost:9000/api/v1");

        let wait = settings.wait_options();
        assert_eq!(wait.poll_interval, Duration::from_secs(2));
        assert_eq!(wait.max_wait, Duration::from_secs(60));

        let retry = settings.retry_config();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.base_delay, Duration::from_millis(250));
        assert_eq!(retry.max_delay, RetryConfig::default().max_delay);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_key = \"typo\"\n").unwrap();
        assert!(Settings::load_from(&path).is_err());
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "poll_interval_secs = 0\n").unwrap();
        let err = Settings::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("poll_interval_secs"));
    }

    #[test]
    fn test_config_key_wins_over_env() {
        let settings = Settings {
            key: Some("from-config".to_string()),
            ..Settings::default()
        };
        let key = settings
            .resolve_key_with(|_| Some("from-env".to_string()))
            .unwrap();
        assert_eq!(key, "from-config");
    }

    #[test]
    fn test_env_key_used_when_config_empty() {
        let settings = Settings {
            key: Some("  ".to_string()),
            ..Settings::default()
        };
        let key = settings
            .resolve_key_with(|name| (name == ENV_MANAGEMENT_KEY).then(|| "from-env".to_string()))
            .unwrap();
        assert_eq!(key, "from-env");
    }

    #[test]
    fn test_missing_key_names_both_sources() {
        let err = Settings::default().resolve_key_with(no_env).unwrap_err();
        let message = err.to_string();
        assert!(message.contains(ENV_MANAGEMENT_KEY));
        assert!(message.contains("key"));
    }
}
