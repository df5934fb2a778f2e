//! Service configuration from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `VOICEFLOW_API_KEY` | `demo_key` (with a warning) |
//! | `VOICEFLOW_API_URL` | `https://analytics-api.voiceflow.com` |
//! | `HELPDESK_CACHE_URL` | unset, caching disabled |
//! | `HELPDESK_CACHE_TTL_MINUTES` | `5` |
//! | `HELPDESK_PORT` | `8000` |
//! | `HELPDESK_CORS_ORIGINS` | `http://localhost:3000` |

use std::env;
use std::time::Duration;

use tracing::warn;

use crate::upstream::client::DEFAULT_API_BASE;

/// Default port if not specified via environment variable.
pub const DEFAULT_PORT: u16 = 8000;

/// Placeholder key used when none is configured.
pub const DEMO_API_KEY: &str = "demo_key";

pub const DEFAULT_CACHE_TTL_MINUTES: u64 = 5;

pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000";

#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub api_url: String,
    /// SQLite connection string; `None` disables caching.
    pub cache_url: Option<String>,
    pub cache_ttl: Duration,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_url", &self.api_url)
            .field("cache_url", &self.cache_url)
            .field("cache_ttl", &self.cache_ttl)
            .field("port", &self.port)
            .field("cors_origins", &self.cors_origins)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = var("VOICEFLOW_API_KEY").unwrap_or_else(|| {
            warn!("VOICEFLOW_API_KEY not set; using placeholder key");
            DEMO_API_KEY.to_string()
        });

        let api_url = var("VOICEFLOW_API_URL").unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let ttl_minutes = var("HELPDESK_CACHE_TTL_MINUTES")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_CACHE_TTL_MINUTES);

        let port = var("HELPDESK_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let cors_origins = var("HELPDESK_CORS_ORIGINS")
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect();

        Self {
            api_key,
            api_url,
            cache_url: var("HELPDESK_CACHE_URL"),
            cache_ttl: Duration::from_secs(ttl_minutes * 60),
            port,
            cors_origins,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);

        assert_eq!(config.api_key, DEMO_API_KEY);
        assert_eq!(config.api_url, DEFAULT_API_BASE);
        assert!(config.cache_url.is_none());
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.port, 8000);
        assert_eq!(config.cors_origins, vec!["http://localhost:3000"]);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("VOICEFLOW_API_KEY", "VF.DM.123"),
            ("HELPDESK_CACHE_URL", "sqlite:cache.db?mode=rwc"),
            ("HELPDESK_CACHE_TTL_MINUTES", "15"),
            ("HELPDESK_PORT", "9001"),
            ("HELPDESK_CORS_ORIGINS", "https://a.example, https://b.example,"),
        ]);

        assert_eq!(config.api_key, "VF.DM.123");
        assert_eq!(config.cache_url.as_deref(), Some("sqlite:cache.db?mode=rwc"));
        assert_eq!(config.cache_ttl, Duration::from_secs(900));
        assert_eq!(config.port, 9001);
        assert_eq!(config.cors_origins, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = config_from(&[("HELPDESK_PORT", "http"), ("HELPDESK_CACHE_TTL_MINUTES", "-1")]);

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let config = config_from(&[("VOICEFLOW_API_KEY", "secret-key")]);
        assert!(!format!("{config:?}").contains("secret-key"));
    }
}
