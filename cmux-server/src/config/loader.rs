//! Configuration loader

use std::path::{Path, PathBuf};

use cmux_utils::{config_file, CmuxError, Result};

use super::AppConfig;

/// Environment variable overriding `socket.path`
pub const ENV_SOCKET_PATH: &str = "CMUX_SOCKET_PATH";
/// Environment variable overriding `socket.mode`
pub const ENV_SOCKET_MODE: &str = "CMUX_SOCKET_MODE";
/// Environment variable overriding `socket.password`
pub const ENV_SOCKET_PASSWORD: &str = "CMUX_SOCKET_PASSWORD";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from default location
    pub fn load() -> Result<AppConfig> {
        let path = config_file();
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            Ok(AppConfig::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<AppConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| CmuxError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content, path)
    }

    /// Parse configuration from string
    pub fn parse(content: &str, path: &Path) -> Result<AppConfig> {
        toml::from_str(content).map_err(|e| CmuxError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Apply `CMUX_SOCKET_*` overrides from the process environment
    pub fn apply_env(config: &mut AppConfig) -> Result<()> {
        Self::apply_overrides(config, |key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup
    pub fn apply_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_SOCKET_PATH).filter(|v| !v.is_empty()) {
            config.socket.path = Some(PathBuf::from(path));
        }
        if let Some(mode) = lookup(ENV_SOCKET_MODE).filter(|v| !v.is_empty()) {
            config.socket.mode = mode
                .parse()
                .map_err(|e: String| CmuxError::config(format!("{}: {}", ENV_SOCKET_MODE, e)))?;
        }
        if let Some(password) = lookup(ENV_SOCKET_PASSWORD) {
            config.socket.password = Some(password);
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(config: &AppConfig) -> Result<()> {
        if config.socket.mode == super::SocketMode::Password
            && config.socket.password.as_deref().map_or(true, str::is_empty)
        {
            return Err(CmuxError::config(
                "password mode requires a non-empty socket.password",
            ));
        }

        if config.socket.read_timeout_ms == 0 {
            return Err(CmuxError::config("read_timeout_ms must be greater than 0"));
        }

        if config.socket.max_ancestry_depth == 0 {
            return Err(CmuxError::config(
                "max_ancestry_depth must be greater than 0",
            ));
        }

        if config.socket.max_line_bytes == 0 {
            return Err(CmuxError::config("max_line_bytes must be greater than 0"));
        }

        Ok(())
    }

    /// Load, apply environment overrides, and validate
    pub fn load_and_validate() -> Result<AppConfig> {
        let mut config = Self::load()?;
        Self::apply_env(&mut config)?;
        Self::validate(&config)?;
        Ok(config)
    }
}
