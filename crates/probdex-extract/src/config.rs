//! Extractor configuration persisted to `llm-config.json`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::retry::{Backoff, RetryPolicy};

pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";
/// Thinking budget for pro models.
pub const DEFAULT_THINKING_BUDGET: i32 = 32768;
/// Thinking budget for flash models.
pub const FLASH_THINKING_BUDGET: i32 = 512;

/// How waits between attempts grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffMode {
    #[default]
    Exponential,
    Fixed,
}

/// Stored extractor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    /// Per-call timeout for pro models, in seconds.
    #[serde(default = "default_heavy_timeout")]
    pub heavy_timeout_secs: u64,
    /// Per-call timeout for flash models, in seconds.
    #[serde(default = "default_light_timeout")]
    pub light_timeout_secs: u64,
    #[serde(default)]
    pub thinking_budget: Option<i32>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub backoff: BackoffMode,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: u64,
    /// Pages extracted at once per document.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_model() -> String {
    DEFAULT_MODEL.into()
}
fn default_heavy_timeout() -> u64 {
    600
}
fn default_light_timeout() -> u64 {
    60
}
fn default_max_attempts() -> u32 {
    crate::retry::MAX_ATTEMPTS
}
fn default_retry_delay() -> u64 {
    crate::retry::FIXED_RETRY_DELAY.as_secs()
}
fn default_backoff_base() -> u64 {
    crate::retry::EXPONENTIAL_BASE.as_secs()
}
fn default_concurrency() -> usize {
    1
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            temperature: 0.0,
            heavy_timeout_secs: default_heavy_timeout(),
            light_timeout_secs: default_light_timeout(),
            thinking_budget: None,
            max_attempts: default_max_attempts(),
            backoff: BackoffMode::default(),
            retry_delay_secs: default_retry_delay(),
            backoff_base_secs: default_backoff_base(),
            concurrency: default_concurrency(),
        }
    }
}

impl ExtractorConfig {
    /// Load config from file, falling back to `GEMINI_API_KEY` and defaults.
    pub fn load(config_path: &Path) -> Self {
        let mut config: ExtractorConfig = match std::fs::read_to_string(config_path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                debug!("Ignoring unreadable {}: {}", config_path.display(), e);
                ExtractorConfig::default()
            }),
            Err(_) => ExtractorConfig::default(),
        };

        if config.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            config.api_key = std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty());
        }

        config
    }

    pub fn is_flash(&self) -> bool {
        self.model.contains("flash")
    }

    /// Per-call timeout for the configured model.
    pub fn call_timeout(&self) -> Duration {
        if self.is_flash() {
            Duration::from_secs(self.light_timeout_secs)
        } else {
            Duration::from_secs(self.heavy_timeout_secs)
        }
    }

    pub fn thinking_budget(&self) -> i32 {
        self.thinking_budget.unwrap_or(if self.is_flash() {
            FLASH_THINKING_BUDGET
        } else {
            DEFAULT_THINKING_BUDGET
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let backoff = match self.backoff {
            BackoffMode::Exponential => Backoff::Exponential {
                base: Duration::from_secs(self.backoff_base_secs),
            },
            BackoffMode::Fixed => Backoff::Fixed(Duration::from_secs(self.retry_delay_secs)),
        };
        RetryPolicy::new(self.max_attempts, backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_missing() {
        let dir = TempDir::new().unwrap();
        let config = ExtractorConfig::load(&dir.path().join("llm-config.json"));

        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.call_timeout(), Duration::from_secs(600));
        assert_eq!(config.thinking_budget(), DEFAULT_THINKING_BUDGET);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn test_partial_file_and_flash_model() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("llm-config.json");
        std::fs::write(
            &path,
            r#"{"api_key": "k", "model": "gemini-2.5-flash", "backoff": "fixed", "max_attempts": 5}"#,
        )
        .unwrap();

        let config = ExtractorConfig::load(&path);
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert_eq!(config.call_timeout(), Duration::from_secs(60));
        assert_eq!(config.thinking_budget(), FLASH_THINKING_BUDGET);
        assert_eq!(
            config.retry_policy(),
            RetryPolicy::new(5, Backoff::Fixed(Duration::from_secs(15)))
        );
    }
}
