use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Client configuration loaded from sealtalk.toml with env var overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the SealTalk server. Default: "http://localhost:4000"
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Path of the encrypted local key store. Default: "sealtalk-keys.db"
    #[serde(default = "default_key_store_path")]
    pub key_store_path: PathBuf,
    /// How long sent plaintexts stay readable from the send cache. Default: 300
    #[serde(default = "default_send_cache_ttl_secs")]
    pub send_cache_ttl_secs: u64,
    /// Maximum entries in the send cache. Default: 256
    #[serde(default = "default_send_cache_capacity")]
    pub send_cache_capacity: usize,
    /// HTTP request timeout for directory calls. Default: 15
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Tracing log level. Default: "info"
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_api_base_url() -> String {
    "http://localhost:4000".to_string()
}
fn default_key_store_path() -> PathBuf {
    PathBuf::from("sealtalk-keys.db")
}
fn default_send_cache_ttl_secs() -> u64 {
    300
}
fn default_send_cache_capacity() -> usize {
    256
}
fn default_request_timeout_secs() -> u64 {
    15
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            key_store_path: default_key_store_path(),
            send_cache_ttl_secs: default_send_cache_ttl_secs(),
            send_cache_capacity: default_send_cache_capacity(),
            request_timeout_secs: default_request_timeout_secs(),
            log_level: default_log_level(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from TOML file with environment variable overrides.
    ///
    /// Reads `sealtalk.toml` from CWD (or path in `SEALTALK_CONFIG` env var).
    /// A missing file falls back to defaults plus env overrides.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let path = std::env::var("SEALTALK_CONFIG").unwrap_or_else(|_| "sealtalk.toml".to_string());
        match std::fs::read_to_string(&path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let mut config = Self::default();
                config.apply_env_overrides()?;
                Ok(config)
            }
            Err(e) => Err(format!("failed to read {path}: {e}").into()),
        }
    }

    /// Load configuration from a TOML string, then apply env var overrides.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config: ClientConfig = toml::from_str(toml_str)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the config.
    pub fn apply_env_overrides(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Ok(val) = std::env::var("SEALTALK_API_URL") {
            self.api_base_url = val;
        }
        if let Ok(val) = std::env::var("SEALTALK_KEY_STORE") {
            self.key_store_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("SEALTALK_LOG_LEVEL") {
            self.log_level = val;
        }
        self.api_base_url = self.api_base_url.trim_end_matches('/').to_string();
        if self.api_base_url.is_empty() {
            return Err("api_base_url must not be empty".into());
        }
        Ok(())
    }

    pub fn send_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.send_cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_loads_from_valid_toml_string() {
        let toml = r#"
            api_base_url = "https://chat.example.com"
            key_store_path = "/var/lib/sealtalk/keys.db"
            send_cache_ttl_secs = 60
            send_cache_capacity = 32
            request_timeout_secs = 5
            log_level = "debug"
        "#;
        let config = ClientConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.api_base_url, "https://chat.example.com");
        assert_eq!(config.key_store_path, PathBuf::from("/var/lib/sealtalk/keys.db"));
        assert_eq!(config.send_cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.send_cache_capacity, 32);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    #[serial]
    fn test_config_has_correct_defaults_for_omitted_fields() {
        let config = ClientConfig::from_toml_str("").unwrap();
        assert_eq!(config.api_base_url, "http://localhost:4000");
        assert_eq!(config.key_store_path, PathBuf::from("sealtalk-keys.db"));
        assert_eq!(config.send_cache_ttl_secs, 300);
        assert_eq!(config.send_cache_capacity, 256);
        assert_eq!(config.request_timeout_secs, 15);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    #[serial]
    fn test_config_applies_env_var_overrides() {
        std::env::set_var("SEALTALK_API_URL", "http://10.0.0.2:4000/");
        std::env::set_var("SEALTALK_KEY_STORE", "/tmp/other.db");
        let config = ClientConfig::from_toml_str("api_base_url = \"http://ignored\"").unwrap();
        std::env::remove_var("SEALTALK_API_URL");
        std::env::remove_var("SEALTALK_KEY_STORE");

        assert_eq!(config.api_base_url, "http://10.0.0.2:4000");
        assert_eq!(config.key_store_path, PathBuf::from("/tmp/other.db"));
    }

    #[test]
    #[serial]
    fn test_config_rejects_empty_base_url() {
        assert!(ClientConfig::from_toml_str("api_base_url = \"/\"").is_err());
    }

    #[test]
    #[serial]
    fn test_config_fails_on_malformed_toml() {
        assert!(ClientConfig::from_toml_str("send_cache_ttl_secs = \"soon\"").is_err());
    }
}
