//! Configuration for zp-records

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::RecordsError;

/// Default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("zp-records")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding `records.db` and `config.toml`
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// HTTP API port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HS256 signing secret. Never written back to disk.
    #[serde(default, skip_serializing)]
    pub jwt_secret: Option<String>,

    /// Token lifetime in seconds
    #[serde(default = "default_jwt_expiry")]
    pub jwt_expiry_secs: u64,

    /// Production mode: require a real JWT secret and hide internal errors
    #[serde(default)]
    pub production: bool,
}

fn default_http_port() -> u16 {
    3000
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_jwt_expiry() -> u64 {
    24 * 60 * 60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            http_port: default_http_port(),
            bind_address: default_bind_address(),
            jwt_secret: None,
            jwt_expiry_secs: default_jwt_expiry(),
            production: false,
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RecordsError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| RecordsError::Config(format!("Invalid config: {}", e)))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), RecordsError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| RecordsError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }

    /// `bind_address:http_port`
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, RecordsError> {
        format!("{}:{}", self.bind_address, self.http_port)
            .parse()
            .map_err(|e| RecordsError::Config(format!("Invalid bind address: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_file() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.http_port, 3000);
        assert_eq!(config.jwt_expiry_secs, 86_400);
        assert!(!config.production);
        assert!(config.jwt_secret.is_none());
    }

    #[test]
    fn test_save_skips_secret() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            jwt_secret: Some("s".repeat(40)),
            ..Default::default()
        };

        let path = config.config_path();
        config.save(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.contains("jwt_secret"));

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.data_dir, config.data_dir);
        assert!(loaded.jwt_secret.is_none());
    }

    #[test]
    fn test_socket_addr() {
        let config = Config { bind_address: "127.0.0.1".into(), http_port: 8080, ..Default::default() };
        assert_eq!(config.socket_addr().unwrap().port(), 8080);

        let bad = Config { bind_address: "not an ip".into(), ..Default::default() };
        assert!(matches!(bad.socket_addr(), Err(RecordsError::Config(_))));
    }
}
