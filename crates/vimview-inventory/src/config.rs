//! Client configuration loading and types

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::InventoryError;
use crate::task::TaskWaiter;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "VIMVIEW_CONFIG";

/// Top-level client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Management service connection
    #[serde(default)]
    pub server: ServerConfig,
    /// Task polling
    #[serde(default)]
    pub tasks: TaskConfig,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Management service connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the invocation endpoint
    #[serde(default = "default_url")]
    pub url: String,
    /// Login user name
    #[serde(default)]
    pub username: String,
    /// Login password, stored inline
    #[serde(default)]
    pub password: Option<String>,
    /// Environment variable holding the password
    #[serde(default)]
    pub password_env: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            username: String::new(),
            password: None,
            password_env: None,
            timeout_secs: default_request_timeout(),
        }
    }
}

/// Task polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Interval between polls in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Overall wait limit in seconds; unset waits indefinitely
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            timeout_secs: None,
        }
    }
}

fn default_url() -> String {
    "https://localhost/sdk".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ServerConfig {
    /// Per-request timeout
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve the login password
    ///
    /// `password_env` wins over an inline `password` when both are set.
    ///
    /// # Errors
    /// Returns `InventoryError::Config` if neither source yields a password.
    pub fn resolve_password(&self) -> Result<String, InventoryError> {
        if let Some(var) = &self.password_env {
            return std::env::var(var)
                .map_err(|_| InventoryError::Config(format!("password variable {var} is not set")));
        }
        self.password
            .clone()
            .ok_or_else(|| InventoryError::Config("no password configured".to_string()))
    }
}

impl TaskConfig {
    /// Waiter honoring the configured interval and timeout
    #[must_use]
    pub fn waiter(&self) -> TaskWaiter {
        let waiter = TaskWaiter::new().with_poll_interval(Duration::from_millis(self.poll_interval_ms));
        match self.timeout_secs {
            Some(secs) => waiter.with_timeout(Duration::from_secs(secs)),
            None => waiter,
        }
    }
}

impl ClientConfig {
    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// Returns `InventoryError::Config` if the text is not valid configuration.
    pub fn from_toml(content: &str) -> Result<Self, InventoryError> {
        toml::from_str(content).map_err(|e| InventoryError::Config(e.to_string()))
    }

    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, InventoryError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| InventoryError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Load from default paths or use defaults
    ///
    /// # Errors
    /// Returns error if a config file is found but cannot be read or parsed
    pub fn load_default() -> Result<Self, InventoryError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(&PathBuf::from(path));
        }

        let paths = [
            PathBuf::from("vimview.toml"),
            PathBuf::from("/etc/vimview/vimview.toml"),
            dirs::config_dir()
                .map(|p| p.join("vimview/vimview.toml"))
                .unwrap_or_default(),
        ];

        for path in paths {
            if path.is_file() {
                return Self::load(&path);
            }
        }

        tracing::warn!("no config file found, using defaults");
        Ok(ClientConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_toml("").unwrap();
        assert_eq!(config.server.url, "https://localhost/sdk");
        assert_eq!(config.server.timeout(), Duration::from_secs(30));
        assert_eq!(config.tasks.poll_interval_ms, 2000);
        assert_eq!(config.tasks.timeout_secs, None);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_parse_full() {
        let config = ClientConfig::from_toml(
            r#"
            log_level = "debug"

            [server]
            url = "https://vcenter.example.com/sdk"
            username = "administrator@vsphere.local"
            password = "hunter2"
            timeout_secs = 10

            [tasks]
            poll_interval_ms = 500
            timeout_secs = 600
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.server.username, "administrator@vsphere.local");
        assert_eq!(config.server.resolve_password().unwrap(), "hunter2");
        assert_eq!(config.server.timeout(), Duration::from_secs(10));

        let waiter = config.tasks.waiter();
        assert_eq!(waiter.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_missing_password() {
        let config = ClientConfig::from_toml("[server]\nusername = \"root\"").unwrap();
        assert!(matches!(
            config.server.resolve_password(),
            Err(InventoryError::Config(_))
        ));
    }

    #[test]
    fn test_unset_password_env() {
        let config = ClientConfig::from_toml(
            "[server]\npassword = \"inline\"\npassword_env = \"VIMVIEW_TEST_PASSWORD_NEVER_SET\"",
        )
        .unwrap();
        assert!(matches!(
            config.server.resolve_password(),
            Err(InventoryError::Config(msg)) if msg.contains("VIMVIEW_TEST_PASSWORD_NEVER_SET")
        ));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            ClientConfig::from_toml("[server\nurl ="),
            Err(InventoryError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ClientConfig::load(Path::new("/nonexistent/vimview.toml")).unwrap_err();
        assert!(matches!(err, InventoryError::Config(msg) if msg.contains("/nonexistent/vimview.toml")));
    }
}
