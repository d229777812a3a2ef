use serde::Deserialize;

/// Server configuration loaded from config.toml with env var overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to. Default: "127.0.0.1"
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on. Default: 4000
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins. Default: ["http://localhost:3000"]
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
    /// Tracing log level. Default: "info"
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Buffered presence transitions per subscriber. Default: 1024
    #[serde(default = "default_presence_channel_capacity")]
    pub presence_channel_capacity: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    4000
}
fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_presence_channel_capacity() -> usize {
    1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
            log_level: default_log_level(),
            presence_channel_capacity: default_presence_channel_capacity(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from TOML file with environment variable overrides.
    ///
    /// Reads `config.toml` from CWD (or path in `CONFIG_PATH` env var). A
    /// missing file is not an error: defaults plus env overrides are used.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
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
        let mut config: ServerConfig = toml::from_str(toml_str)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the config.
    ///
    /// Returns an error if an env var is set but has an invalid format
    /// (e.g., PORT=abc).
    pub fn apply_env_overrides(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Ok(val) = std::env::var("HOST") {
            self.host = val;
        }
        if let Ok(val) = std::env::var("PORT") {
            self.port = val
                .parse()
                .map_err(|_| format!("invalid PORT value: {val}"))?;
        }
        if let Ok(val) = std::env::var("LOG_LEVEL") {
            self.log_level = val;
        }
        if self.presence_channel_capacity == 0 {
            return Err("presence_channel_capacity must be greater than zero".into());
        }
        Ok(())
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
            host = "0.0.0.0"
            port = 8080
            cors_origins = ["http://localhost:5173"]
            log_level = "debug"
            presence_channel_capacity = 16
        "#;
        let config = ServerConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.presence_channel_capacity, 16);
    }

    #[test]
    #[serial]
    fn test_config_applies_env_var_overrides() {
        std::env::set_var("PORT", "9999");
        std::env::set_var("LOG_LEVEL", "trace");
        let config = ServerConfig::from_toml_str("port = 8080").unwrap();
        std::env::remove_var("PORT");
        std::env::remove_var("LOG_LEVEL");
        assert_eq!(config.port, 9999);
        assert_eq!(config.log_level, "trace");
    }

    #[test]
    #[serial]
    fn test_config_rejects_invalid_port_override() {
        std::env::set_var("PORT", "abc");
        let result = ServerConfig::from_toml_str("");
        std::env::remove_var("PORT");
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_config_has_correct_defaults_for_omitted_fields() {
        let config = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 4000);
        assert_eq!(config.cors_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.presence_channel_capacity, 1024);
    }

    #[test]
    #[serial]
    fn test_config_rejects_zero_presence_capacity() {
        assert!(ServerConfig::from_toml_str("presence_channel_capacity = 0").is_err());
    }

    #[test]
    #[serial]
    fn test_config_fails_on_malformed_toml() {
        let toml = "this is not valid = [[[toml";
        let result = ServerConfig::from_toml_str(toml);
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_config_load_reads_config_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        std::fs::write(&path, "port = 4321").unwrap();

        std::env::set_var("CONFIG_PATH", &path);
        let config = ServerConfig::load();
        std::env::remove_var("CONFIG_PATH");
        assert_eq!(config.unwrap().port, 4321);
    }

    #[test]
    #[serial]
    fn test_config_load_without_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("CONFIG_PATH", dir.path().join("absent.toml"));
        let config = ServerConfig::load();
        std::env::remove_var("CONFIG_PATH");
        assert_eq!(config.unwrap().port, 4000);
    }
}
