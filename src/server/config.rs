//! Configuration loading for snapfeedd.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.snapfeed/config.toml` (user)
//! 3. `/etc/snapfeed/config.toml` (system)
//! 4. built-in defaults
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.snapfeed/secrets.toml` (user, must be 0600)
//! 2. `/etc/snapfeed/secrets.toml` (system, must be 0600)
//!
//! and fall back to the `COINGECKO_API_KEY` / `AEMET_API_KEY` environment
//! variables.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::cache::CachePolicy;
use crate::feeds::{isobar, price};
use crate::store::{MemoryStore, StoreConfig};
use crate::{FeedError, Result, SnapfeedBuilder};

/// Daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub feeds: FeedsConfig,
}

/// Server network configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:8787).
    #[serde(default = "default_address")]
    pub address: String,
    /// Public base URL used for `feed_url` (e.g. `https://feeds.laro.dev`).
    ///
    /// When unset, the request's `Host` header is used.
    #[serde(default)]
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            public_url: None,
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:8787".to_string()
}

/// Upstream API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Timeout per upstream call in seconds (default: 10).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_coingecko_url")]
    pub coingecko_base_url: String,
    #[serde(default = "default_aemet_url")]
    pub aemet_base_url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            coingecko_base_url: default_coingecko_url(),
            aemet_base_url: default_aemet_url(),
        }
    }
}

fn default_timeout() -> u64 {
    10
}

fn default_coingecko_url() -> String {
    price::DEFAULT_BASE_URL.to_string()
}

fn default_aemet_url() -> String {
    isobar::DEFAULT_BASE_URL.to_string()
}

/// Snapshot store settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Maximum stored snapshots (default: 1,000).
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
        }
    }
}

fn default_max_entries() -> u64 {
    1_000
}

/// Per-feed overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedsConfig {
    #[serde(default)]
    pub price: FeedPolicyConfig,
    #[serde(default)]
    pub isobar_map: FeedPolicyConfig,
}

/// Cache timing override for one feed. Unset fields keep the feed's default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedPolicyConfig {
    #[serde(default)]
    pub freshness_secs: Option<u64>,
    #[serde(default)]
    pub outer_ttl_secs: Option<u64>,
}

impl FeedPolicyConfig {
    /// Merge over `default`, validating the result.
    pub fn to_policy(&self, default: CachePolicy) -> Result<CachePolicy> {
        CachePolicy::new(
            self.freshness_secs
                .map(Duration::from_secs)
                .unwrap_or(default.freshness),
            self.outer_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(default.outer_ttl),
        )
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided; must exist)
    /// 2. `~/.snapfeed/config.toml`
    /// 3. `/etc/snapfeed/config.toml`
    /// 4. Defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let Some(path) = Self::resolve_config_path(explicit_path)? else {
            info!("no config file found, using defaults");
            return Ok(Config::default());
        };
        Self::load_from_file(&path)
    }

    /// Parse a specific config file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            FeedError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            FeedError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(FeedError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".snapfeed").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/snapfeed/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Apply this configuration and `secrets` to a gateway builder.
    pub fn apply(
        &self,
        secrets: &Secrets,
        mut builder: SnapfeedBuilder,
    ) -> Result<SnapfeedBuilder> {
        let store =
            MemoryStore::with_config(&StoreConfig::new().max_entries(self.cache.max_entries));
        builder = builder
            .store(Arc::new(store))
            .timeout(self.upstream.timeout_secs)
            .coingecko_base_url(&self.upstream.coingecko_base_url)
            .aemet_base_url(&self.upstream.aemet_base_url)
            .price_policy(self.feeds.price.to_policy(CachePolicy {
                freshness: price::FRESHNESS,
                outer_ttl: price::OUTER_TTL,
            })?)
            .isobar_map_policy(self.feeds.isobar_map.to_policy(CachePolicy {
                freshness: isobar::FRESHNESS,
                outer_ttl: isobar::OUTER_TTL,
            })?);

        if let Some(key) = secrets.api_key("coingecko") {
            builder = builder.coingecko_key(key);
        }
        if let Some(key) = secrets.api_key("aemet") {
            builder = builder.aemet_key(key);
        }
        Ok(builder)
    }
}

/// Secrets configuration (API keys).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub coingecko: Option<ApiKeySecret>,
    #[serde(default)]
    pub aemet: Option<ApiKeySecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

/// Upstream name → environment variable name mapping.
const UPSTREAM_ENV_VARS: &[(&str, &str)] = &[
    ("coingecko", "COINGECKO_API_KEY"),
    ("aemet", "AEMET_API_KEY"),
];

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Resolution order:
    /// 1. `~/.snapfeed/secrets.toml` (if exists, must be 0600)
    /// 2. `/etc/snapfeed/secrets.toml` (if exists, must be 0600)
    ///
    /// Returns empty secrets if no file exists (keys may come from env vars).
    pub fn load() -> Result<Self> {
        // Try user secrets first
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".snapfeed").join("secrets.toml");
            if user_secrets.exists() {
                Self::check_permissions(&user_secrets)?;
                return Self::load_from_file(&user_secrets);
            }
        }

        // Try system secrets
        let system_secrets = PathBuf::from("/etc/snapfeed/secrets.toml");
        if system_secrets.exists() {
            Self::check_permissions(&system_secrets)?;
            return Self::load_from_file(&system_secrets);
        }

        // No secrets file; keys can still come from env vars
        Ok(Secrets::default())
    }

    /// Parse a specific secrets file (no permission check).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            FeedError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            FeedError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    pub fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            FeedError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        // Reject if group or other bits are set
        if mode & 0o077 != 0 {
            return Err(FeedError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    pub fn check_permissions(_path: &Path) -> Result<()> {
        // Permission check not available on non-Unix platforms
        Ok(())
    }

    /// Get the API key for an upstream, falling back to its environment variable.
    pub fn api_key(&self, upstream: &str) -> Option<String> {
        let from_file = match upstream {
            "coingecko" => self.coingecko.as_ref(),
            "aemet" => self.aemet.as_ref(),
            _ => None,
        }
        .map(|s| s.api_key.clone());

        from_file.or_else(|| {
            UPSTREAM_ENV_VARS
                .iter()
                .find(|(name, _)| *name == upstream)
                .and_then(|(_, env_var)| std::env::var(env_var).ok())
                .filter(|key| !key.is_empty())
        })
    }
}
