// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Client Configuration
//
// Defines the configuration schema for the Spark client, including:
// - Agent backend endpoint and polling cadence
// - Default wallet address / user id sent with chat requests
// - Hosted data service URL and access key (required by the dashboard)
// - Wallet provider endpoint
//
// Values come from a YAML file (discovered like the node config of the agent
// host) and are then overridden by environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_WALLET_ADDRESS: &str = "0xDemoWallet123";
pub const DEFAULT_USER_ID: &str = "demo_user";
pub const CONFIG_FILE_NAME: &str = "spark-config.yaml";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing data service environment variables (SUPABASE_URL / SUPABASE_ANON_KEY)")]
    MissingDataService,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparkConfig {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub chat: ChatDefaults,

    /// Hosted data service; required by dashboard commands only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_service: Option<DataServiceConfig>,

    #[serde(default)]
    pub wallet: WalletConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the agent backend
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// Delay between status polls of a running execution
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Per-request timeout
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            poll_interval: default_poll_interval(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Identity attached to every chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatDefaults {
    #[serde(default = "default_wallet_address")]
    pub wallet_address: String,

    #[serde(default = "default_user_id")]
    pub user_id: String,
}

impl Default for ChatDefaults {
    fn default() -> Self {
        Self {
            wallet_address: default_wallet_address(),
            user_id: default_user_id(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataServiceConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,

    /// Public (anon) access key
    pub anon_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletConfig {
    /// JSON-RPC endpoint of the wallet provider. Absent means "not installed".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,

    /// How often the provider is checked for account / chain changes
    #[serde(default = "default_watch_interval", with = "humantime_serde")]
    pub watch_interval: Duration,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            rpc_url: None,
            watch_interval: default_watch_interval(),
        }
    }
}

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_wallet_address() -> String {
    DEFAULT_WALLET_ADDRESS.to_string()
}

fn default_user_id() -> String {
    DEFAULT_USER_ID.to_string()
}

fn default_watch_interval() -> Duration {
    Duration::from_secs(4)
}

impl SparkConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. SPARK_CONFIG_PATH environment variable
    /// 2. ./spark-config.yaml (working directory)
    /// 3. ~/.spark/config.yaml (user home)
    /// 4. /etc/spark/config.yaml (system, Unix)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("SPARK_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from(format!("./{}", CONFIG_FILE_NAME));
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".spark").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/spark/config.yaml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            Self::from_yaml_file(config_path)?
        } else {
            tracing::debug!("No configuration file found in standard locations. Using defaults.");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (the process environment in
    /// production, a map in tests).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = non_empty("SPARK_BACKEND_URL") {
            tracing::info!("Environment override: SPARK_BACKEND_URL={}", url);
            self.backend.url = url;
        }

        if let Some(raw) = non_empty("SPARK_POLL_INTERVAL") {
            match humantime_serde::re::humantime::parse_duration(&raw) {
                Ok(interval) => self.backend.poll_interval = interval,
                Err(e) => tracing::warn!(
                    "Invalid value for SPARK_POLL_INTERVAL: '{}' ({}). Ignoring.",
                    raw,
                    e
                ),
            }
        }

        if let Some(address) = non_empty("SPARK_WALLET_ADDRESS") {
            self.chat.wallet_address = address;
        }

        if let Some(user_id) = non_empty("SPARK_USER_ID") {
            self.chat.user_id = user_id;
        }

        if let Some(rpc_url) = non_empty("SPARK_WALLET_RPC_URL") {
            self.wallet.rpc_url = Some(rpc_url);
        }

        let url = non_empty("SUPABASE_URL").or_else(|| non_empty("NEXT_PUBLIC_SUPABASE_URL"));
        let key = non_empty("SUPABASE_ANON_KEY")
            .or_else(|| non_empty("NEXT_PUBLIC_SUPABASE_ANON_KEY"));
        match (url, key, self.data_service.as_mut()) {
            (Some(url), Some(anon_key), _) => {
                self.data_service = Some(DataServiceConfig { url, anon_key });
            }
            (Some(url), None, Some(existing)) => existing.url = url,
            (None, Some(anon_key), Some(existing)) => existing.anon_key = anon_key,
            _ => {}
        }
    }

    /// Data service settings, or the configuration failure that prevents any
    /// dashboard view from initializing.
    pub fn data_service(&self) -> Result<&DataServiceConfig, ConfigError> {
        match &self.data_service {
            Some(cfg) if !cfg.url.trim().is_empty() && !cfg.anon_key.trim().is_empty() => Ok(cfg),
            _ => Err(ConfigError::MissingDataService),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_http_url("backend.url", &self.backend.url)?;

        if self.backend.poll_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "backend.poll_interval must be greater than zero".to_string(),
            ));
        }

        if self.chat.wallet_address.trim().is_empty() {
            return Err(ConfigError::Invalid("chat.wallet_address cannot be empty".to_string()));
        }

        if let Some(data) = &self.data_service {
            check_http_url("data_service.url", &data.url)?;
            if data.anon_key.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "data_service.anon_key cannot be empty".to_string(),
                ));
            }
        }

        if let Some(rpc_url) = &self.wallet.rpc_url {
            check_http_url("wallet.rpc_url", rpc_url)?;
        }

        Ok(())
    }
}

fn check_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value)
        .map_err(|e| ConfigError::Invalid(format!("{} '{}' is not a valid URL: {}", field, value, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::Invalid(format!(
            "{} must use http or https, got '{}'",
            field, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SparkConfig::default();
        assert_eq!(config.backend.url, "http://localhost:8000");
        assert_eq!(config.backend.poll_interval, Duration::from_secs(2));
        assert_eq!(config.chat.wallet_address, "0xDemoWallet123");
        assert_eq!(config.chat.user_id, "demo_user");
        assert!(config.wallet.rpc_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_with_humantime_durations() {
        let yaml = r#"
backend:
  url: http://agents.internal:8001
  poll_interval: 500ms
data_service:
  url: https://project.supabase.co
  anon_key: public-anon-key
wallet:
  rpc_url: http://127.0.0.1:1248
"#;
        let config = SparkConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.backend.poll_interval, Duration::from_millis(500));
        assert_eq!(config.backend.request_timeout, Duration::from_secs(30));
        assert_eq!(config.data_service().unwrap().anon_key, "public-anon-key");
        assert_eq!(config.wallet.rpc_url.as_deref(), Some("http://127.0.0.1:1248"));
        assert_eq!(config.chat.user_id, "demo_user");
    }

    #[test]
    fn test_missing_data_service_is_a_config_error() {
        let config = SparkConfig::default();
        assert_eq!(config.data_service().unwrap_err(), ConfigError::MissingDataService);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = SparkConfig::default();
        config.apply_overrides(env(&[
            ("SPARK_BACKEND_URL", "http://10.0.0.5:8000"),
            ("SPARK_POLL_INTERVAL", "5s"),
            ("NEXT_PUBLIC_SUPABASE_URL", "https://p.supabase.co"),
            ("NEXT_PUBLIC_SUPABASE_ANON_KEY", "k"),
            ("SPARK_WALLET_RPC_URL", "http://127.0.0.1:1248"),
        ]));

        assert_eq!(config.backend.url, "http://10.0.0.5:8000");
        assert_eq!(config.backend.poll_interval, Duration::from_secs(5));
        assert_eq!(config.data_service().unwrap().url, "https://p.supabase.co");
        assert_eq!(config.wallet.rpc_url.as_deref(), Some("http://127.0.0.1:1248"));
    }

    #[test]
    fn test_invalid_poll_interval_override_is_ignored() {
        let mut config = SparkConfig::default();
        config.apply_overrides(env(&[("SPARK_POLL_INTERVAL", "soon")]));
        assert_eq!(config.backend.poll_interval, DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        let mut config = SparkConfig::default();
        config.backend.url = "ftp://example.com".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = SparkConfig::default();
        config.wallet.rpc_url = Some("not a url".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spark-config.yaml");
        std::fs::write(&path, "backend:\n  url: http://localhost:9000\n").unwrap();

        let config = SparkConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.backend.url, "http://localhost:9000");

        assert!(SparkConfig::load_or_default(Some(dir.path().join("missing.yaml"))).is_err());
    }
}
