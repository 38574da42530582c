use crate::core::cache::CachePolicy;
use crate::core::market::MarketQuery;
use crate::core::refresh::RefreshPolicy;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CoinGeckoProviderConfig {
    pub base_url: String,
    /// Pro API key, sent as a request header when present.
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub coingecko: Option<CoinGeckoProviderConfig>,
    pub auth: Option<AuthProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            coingecko: Some(CoinGeckoProviderConfig {
                base_url: "https://api.coingecko.com/api/v3".to_string(),
                api_key: None,
            }),
            auth: Some(AuthProviderConfig {
                base_url: "http://localhost:8000/api/v1".to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
#[serde(default)]
pub struct CacheConfig {
    pub staleness_secs: u64,
    pub eviction_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            staleness_secs: 300,
            eviction_secs: 600,
        }
    }
}

impl CacheConfig {
    pub fn policy(&self) -> CachePolicy {
        CachePolicy {
            staleness: Duration::from_secs(self.staleness_secs),
            eviction: Duration::from_secs(self.eviction_secs),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
#[serde(default)]
pub struct RefreshConfig {
    pub interval_secs: u64,
    pub retry_limit: u32,
    pub retry_delay_ms: u64,
    pub rate_limit_penalty_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        RefreshConfig {
            interval_secs: 30,
            retry_limit: 3,
            retry_delay_ms: 1000,
            rate_limit_penalty_secs: 10,
        }
    }
}

impl RefreshConfig {
    pub fn policy(&self) -> RefreshPolicy {
        RefreshPolicy {
            interval: Duration::from_secs(self.interval_secs),
            retry_limit: self.retry_limit,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            rate_limit_penalty: Duration::from_secs(self.rate_limit_penalty_secs),
        }
    }
}

fn default_top_limit() -> u32 {
    10
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// How many instruments the dashboard tracks, by market cap rank.
    #[serde(default = "default_top_limit")]
    pub top_limit: u32,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    pub data_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            providers: ProvidersConfig::default(),
            top_limit: default_top_limit(),
            cache: CacheConfig::default(),
            refresh: RefreshConfig::default(),
            data_path: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "cryptodash", "cryptodash")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "cryptodash", "cryptodash")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// The query the dashboard subscribes to.
    pub fn query(&self) -> MarketQuery {
        MarketQuery::top(self.top_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
providers:
  coingecko:
    base_url: "http://example.com/cg"
    api_key: "cg-test-key"
  auth:
    base_url: "http://example.com/auth"
top_limit: 25
cache:
  staleness_secs: 120
  eviction_secs: 240
refresh:
  interval_secs: 15
  retry_limit: 5
  retry_delay_ms: 250
  rate_limit_penalty_secs: 3
data_path: "/tmp/cryptodash-test"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");

        let coingecko = config.providers.coingecko.as_ref().unwrap();
        assert_eq!(coingecko.base_url, "http://example.com/cg");
        assert_eq!(coingecko.api_key.as_deref(), Some("cg-test-key"));
        let auth = config.providers.auth.as_ref().unwrap();
        assert_eq!(auth.base_url, "http://example.com/auth");

        assert_eq!(config.top_limit, 25);
        assert_eq!(config.query(), MarketQuery::top(25));
        assert_eq!(config.cache.staleness_secs, 120);
        assert_eq!(config.refresh.retry_limit, 5);
        assert_eq!(config.data_path.as_deref(), Some("/tmp/cryptodash-test"));
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("data_path: null").expect("parse failed");

        assert_eq!(config.top_limit, 10);
        assert_eq!(config.cache.staleness_secs, 300);
        assert_eq!(config.cache.eviction_secs, 600);
        assert_eq!(config.refresh.interval_secs, 30);
        assert_eq!(config.refresh.retry_limit, 3);
        assert_eq!(config.refresh.retry_delay_ms, 1000);
        assert_eq!(config.refresh.rate_limit_penalty_secs, 10);
        assert!(config.providers.coingecko.is_some());
        assert!(config.data_path.is_none());
    }

    #[test]
    fn test_partial_sections_fall_back_per_field() {
        let yaml_str = r#"
refresh:
  interval_secs: 5
"#;
        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("parse failed");

        assert_eq!(config.refresh.interval_secs, 5);
        assert_eq!(config.refresh.retry_limit, 3);
        assert_eq!(config.refresh.retry_delay_ms, 1000);
    }

    #[test]
    fn test_policy_conversion() {
        let config = AppConfig {
            providers: ProvidersConfig::default(),
            top_limit: 10,
            cache: CacheConfig {
                staleness_secs: 60,
                eviction_secs: 90,
            },
            refresh: RefreshConfig {
                interval_secs: 7,
                retry_limit: 2,
                retry_delay_ms: 500,
                rate_limit_penalty_secs: 4,
            },
            data_path: None,
        };

        let cache = config.cache.policy();
        assert_eq!(cache.staleness, Duration::from_secs(60));
        assert_eq!(cache.eviction, Duration::from_secs(90));

        let refresh = config.refresh.policy();
        assert_eq!(refresh.interval, Duration::from_secs(7));
        assert_eq!(refresh.retry_limit, 2);
        assert_eq!(refresh.retry_delay, Duration::from_millis(500));
        assert_eq!(refresh.rate_limit_penalty, Duration::from_secs(4));
    }
}
