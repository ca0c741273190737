use serde::{Deserialize, Serialize};
use web_time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_STORAGE_PREFIX: &str = "idontgetai:giscus:";
pub const DEFAULT_RETURN_TO_MAX_AGE_MS: u64 = 15 * 60 * 1000;
pub const DEFAULT_CALLBACK_PARAM: &str = "giscus";
pub const DEFAULT_AUTH_REFERRER_HOSTS: [&str; 2] = ["github.com", "giscus.app"];
pub const DEFAULT_MARKDOWN_CACHE_NAME: &str = "idontgetai-md-v1";
pub const DEFAULT_TEXT_CACHE_NAME: &str = "idontgetai-text-v1";
pub const DEFAULT_PDF_CACHE_NAME: &str = "idontgetai-pdf-v1";
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 800;

pub const VIEWER_ACTIVE_KEY: &str = "viewerActive";
pub const RETURN_TO_KEY: &str = "returnTo";
pub const RETURN_TO_AT_KEY: &str = "returnToAt";
pub const RESTORED_FOR_KEY: &str = "restoredFor";

/// Tunables for the site client. Every field has a default, so a partial JSON
/// override only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SiteConfig {
    pub storage_prefix: String,
    pub return_to_max_age_ms: u64,
    pub callback_param: String,
    pub auth_referrer_hosts: Vec<String>,
    pub cache_names: CacheNames,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheNames {
    pub markdown: String,
    pub text: String,
    pub pdf: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            storage_prefix: DEFAULT_STORAGE_PREFIX.to_string(),
            return_to_max_age_ms: DEFAULT_RETURN_TO_MAX_AGE_MS,
            callback_param: DEFAULT_CALLBACK_PARAM.to_string(),
            auth_referrer_hosts: DEFAULT_AUTH_REFERRER_HOSTS
                .iter()
                .map(|host| (*host).to_string())
                .collect(),
            cache_names: CacheNames::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl Default for CacheNames {
    fn default() -> Self {
        Self {
            markdown: DEFAULT_MARKDOWN_CACHE_NAME.to_string(),
            text: DEFAULT_TEXT_CACHE_NAME.to_string(),
            pdf: DEFAULT_PDF_CACHE_NAME.to_string(),
        }
    }
}

impl CacheNames {
    /// Markdown sources get their own cache; any other text source shares
    /// the generic text cache.
    #[must_use]
    pub fn for_text_source(&self, url: &str) -> &str {
        let path = url.split(['?', '#']).next().unwrap_or_default();
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".md") || lower.ends_with(".markdown") {
            &self.markdown
        } else {
            &self.text
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    /// Linear backoff: the wait after failed attempt `attempt` (zero based).
    #[must_use]
    pub fn delay_for_attempt(self, attempt: u32) -> Duration {
        Duration::from_millis(
            self.base_delay_ms
                .saturating_mul(u64::from(attempt).saturating_add(1)),
        )
    }
}

impl SiteConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(|error| ConfigError::Decode {
            message: error.to_string(),
        })?;
        config.validated()
    }

    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.storage_prefix = self.storage_prefix.trim().to_string();
        self.callback_param = self.callback_param.trim().to_string();
        if self.storage_prefix.is_empty() {
            return Err(ConfigError::EmptyField {
                field: "storagePrefix",
            });
        }
        if self.callback_param.is_empty() {
            return Err(ConfigError::EmptyField {
                field: "callbackParam",
            });
        }
        if self.return_to_max_age_ms == 0 {
            return Err(ConfigError::ZeroField {
                field: "returnToMaxAgeMs",
            });
        }
        self.auth_referrer_hosts = self
            .auth_referrer_hosts
            .into_iter()
            .map(|host| host.trim().to_ascii_lowercase())
            .filter(|host| !host.is_empty())
            .collect();
        for (field, name) in [
            ("cacheNames.markdown", &self.cache_names.markdown),
            ("cacheNames.text", &self.cache_names.text),
            ("cacheNames.pdf", &self.cache_names.pdf),
        ] {
            if name.trim().is_empty() {
                return Err(ConfigError::EmptyField { field });
            }
        }
        Ok(self)
    }

    #[must_use]
    pub fn storage_key(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.storage_prefix)
    }

    #[must_use]
    pub fn return_to_max_age(&self) -> Duration {
        Duration::from_millis(self.return_to_max_age_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_site_constants() {
        let config = SiteConfig::default();
        assert_eq!(config.storage_key(RETURN_TO_KEY), "idontgetai:giscus:returnTo");
        assert_eq!(config.return_to_max_age(), Duration::from_secs(15 * 60));
        assert_eq!(config.callback_param, "giscus");
        assert_eq!(config.cache_names.markdown, "idontgetai-md-v1");
    }

    #[test]
    fn partial_json_override_keeps_other_defaults() {
        let config = SiteConfig::from_json(r#"{"returnToMaxAgeMs": 60000, "retry": {"maxRetries": 4}}"#)
            .expect("valid config");
        assert_eq!(config.return_to_max_age_ms, 60_000);
        assert_eq!(config.retry.max_retries, 4);
        assert_eq!(config.retry.base_delay_ms, DEFAULT_RETRY_BASE_DELAY_MS);
        assert_eq!(config.storage_prefix, DEFAULT_STORAGE_PREFIX);
    }

    #[test]
    fn referrer_hosts_are_normalized() {
        let config = SiteConfig::from_json(r#"{"authReferrerHosts": [" GitHub.com ", ""]}"#)
            .expect("valid config");
        assert_eq!(config.auth_referrer_hosts, vec!["github.com".to_string()]);
    }

    #[test]
    fn empty_prefix_is_rejected() {
        let error = SiteConfig::from_json(r#"{"storagePrefix": "  "}"#).expect_err("invalid");
        assert_eq!(
            error,
            ConfigError::EmptyField {
                field: "storagePrefix"
            }
        );
    }

    #[test]
    fn malformed_json_reports_decode_error() {
        let error = SiteConfig::from_json("{not json").expect_err("invalid");
        assert!(matches!(error, ConfigError::Decode { .. }));
    }

    #[test]
    fn text_sources_pick_cache_by_extension() {
        let names = CacheNames::default();
        assert_eq!(
            names.for_text_source("https://raw.githubusercontent.com/o/r/main/a.MD"),
            "idontgetai-md-v1"
        );
        assert_eq!(
            names.for_text_source("https://example.com/notes/a.markdown?raw=1"),
            "idontgetai-md-v1"
        );
        assert_eq!(
            names.for_text_source("https://example.com/notes/a.txt"),
            "idontgetai-text-v1"
        );
    }

    #[test]
    fn retry_delay_grows_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(800));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(1600));
    }
}
