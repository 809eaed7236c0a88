//! Configuration schema structs

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub socket: SocketConfig,
    pub protocol: ProtocolConfig,
    pub sidebar: SidebarConfig,
}

/// Who may use the control socket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SocketMode {
    /// Only processes descended from the host application
    #[default]
    CmuxOnly,
    /// Any local process
    AllowAll,
    /// Any local process that logs in with the configured password
    Password,
}

impl SocketMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SocketMode::CmuxOnly => "cmuxOnly",
            SocketMode::AllowAll => "allowAll",
            SocketMode::Password => "password",
        }
    }
}

impl fmt::Display for SocketMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SocketMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "cmuxonly" => Ok(SocketMode::CmuxOnly),
            "allowall" => Ok(SocketMode::AllowAll),
            "password" => Ok(SocketMode::Password),
            _ => Err(format!("unknown socket mode: {}", s)),
        }
    }
}

/// Socket settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    /// Socket path (default: build-flavour well-known path)
    pub path: Option<PathBuf>,
    pub mode: SocketMode,
    /// Required in password mode
    pub password: Option<String>,
    /// Idle time before a session logs itself as idle
    pub read_timeout_ms: u64,
    /// Maximum number of parent hops checked in cmuxOnly mode
    pub max_ancestry_depth: usize,
    /// How long a rejected connection waits for a first record to answer
    pub reject_reply_timeout_ms: u64,
    pub max_line_bytes: usize,
    /// Record the socket path in the last-socket pointer file on bind
    pub write_last_socket_pointer: bool,
    /// Process whose descendants are admitted (default: this process)
    pub host_pid: Option<u32>,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            path: None,
            mode: SocketMode::default(),
            password: None,
            read_timeout_ms: 30_000,
            max_ancestry_depth: 64,
            reject_reply_timeout_ms: 1_000,
            max_line_bytes: cmux_protocol::DEFAULT_MAX_LINE_BYTES,
            write_last_socket_pointer: true,
            host_pid: None,
        }
    }
}

/// Which spellings of aliased v1 commands are accepted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum V1Spellings {
    #[default]
    Both,
    Modern,
    Legacy,
}

impl FromStr for V1Spellings {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "both" => Ok(V1Spellings::Both),
            "modern" => Ok(V1Spellings::Modern),
            "legacy" => Ok(V1Spellings::Legacy),
            _ => Err(format!("unknown v1 spelling policy: {}", s)),
        }
    }
}

/// Protocol settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub v1_spellings: V1Spellings,
    /// Expose `debug.*` methods and their v1 counterparts
    pub debug_methods: bool,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            v1_spellings: V1Spellings::default(),
            debug_methods: cfg!(debug_assertions),
        }
    }
}

/// Sidebar settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SidebarConfig {
    /// Log entries kept per scope
    pub max_log_entries: usize,
}

impl Default for SidebarConfig {
    fn default() -> Self {
        Self {
            max_log_entries: 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_mode_spellings() {
        assert_eq!("cmuxOnly".parse::<SocketMode>().unwrap(), SocketMode::CmuxOnly);
        assert_eq!("allow-all".parse::<SocketMode>().unwrap(), SocketMode::AllowAll);
        assert_eq!("PASSWORD".parse::<SocketMode>().unwrap(), SocketMode::Password);
        assert!("open".parse::<SocketMode>().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.socket.mode, SocketMode::CmuxOnly);
        assert_eq!(config.socket.read_timeout_ms, 30_000);
        assert_eq!(config.socket.max_ancestry_depth, 64);
        assert_eq!(config.protocol.v1_spellings, V1Spellings::Both);
        assert_eq!(config.sidebar.max_log_entries, 200);
    }
}
