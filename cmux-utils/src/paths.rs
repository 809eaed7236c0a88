//! Path utilities for cmux
//!
//! Handles XDG directories for config and state, and locates the control
//! socket of a running cmux instance.

use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use directories::ProjectDirs;

/// Application identifier for XDG directories
const APP_NAME: &str = "cmux";

/// Environment variable overriding the socket path
pub const SOCKET_PATH_ENV: &str = "CMUX_SOCKET_PATH";

/// Pointer file naming the socket of the most recently started instance
pub const LAST_SOCKET_PATH_FILE: &str = "/tmp/cmux-last-socket-path";

/// Socket path used by release builds
pub const RELEASE_SOCKET_PATH: &str = "/tmp/cmux.sock";

/// Socket path used by debug builds
pub const DEBUG_SOCKET_PATH: &str = "/tmp/cmux-debug.sock";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

/// Get the default socket path for this build flavour
pub fn default_socket_path() -> PathBuf {
    if cfg!(debug_assertions) {
        PathBuf::from(DEBUG_SOCKET_PATH)
    } else {
        PathBuf::from(RELEASE_SOCKET_PATH)
    }
}

/// Get the configuration directory
///
/// Location: `$XDG_CONFIG_HOME/cmux` or `~/.config/cmux`
pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(|| home_dir().join(".config").join(APP_NAME))
}

/// Get the main configuration file path
///
/// Location: `$XDG_CONFIG_HOME/cmux/config.toml`
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Get the state directory
///
/// Location: `$XDG_STATE_HOME/cmux` or `~/.local/state/cmux`
pub fn state_dir() -> PathBuf {
    project_dirs()
        .and_then(|p| p.state_dir().map(|d| d.to_path_buf()))
        .unwrap_or_else(|| home_dir().join(".local").join("state").join(APP_NAME))
}

/// Get the log directory
///
/// Location: `$XDG_STATE_HOME/cmux/log`
pub fn log_dir() -> PathBuf {
    state_dir().join("log")
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

/// Record `socket` as the last known good socket path
pub fn write_last_socket_pointer(socket: &Path) -> std::io::Result<()> {
    std::fs::write(LAST_SOCKET_PATH_FILE, socket.to_string_lossy().as_bytes())
}

fn read_pointer(pointer: &Path) -> Option<PathBuf> {
    let raw = std::fs::read_to_string(pointer).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(PathBuf::from(trimmed))
    }
}

/// Resolve the socket path with the default discovery rules
pub fn resolve_socket_path(explicit: Option<&Path>) -> PathBuf {
    SocketDiscovery::default().resolve(explicit)
}

/// Socket discovery rules
///
/// Resolution order: explicit path, `CMUX_SOCKET_PATH`, the pointer file,
/// the well-known paths, then the youngest tagged debug socket. The last
/// three only count when something is listening on them.
#[derive(Debug, Clone)]
pub struct SocketDiscovery {
    /// Directory searched for tagged debug sockets
    pub search_dir: PathBuf,
    /// Pointer file written by the server on bind
    pub pointer_file: PathBuf,
    /// Conventional paths tried in order
    pub well_known: Vec<PathBuf>,
    /// Value of `CMUX_SOCKET_PATH`, if honoured
    pub env_override: Option<PathBuf>,
}

impl Default for SocketDiscovery {
    fn default() -> Self {
        Self {
            search_dir: PathBuf::from("/tmp"),
            pointer_file: PathBuf::from(LAST_SOCKET_PATH_FILE),
            well_known: vec![
                PathBuf::from(DEBUG_SOCKET_PATH),
                PathBuf::from(RELEASE_SOCKET_PATH),
            ],
            env_override: std::env::var_os(SOCKET_PATH_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }
}

impl SocketDiscovery {
    /// Discovery rooted in `dir`, ignoring the environment
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            pointer_file: dir.join("cmux-last-socket-path"),
            well_known: vec![dir.join("cmux-debug.sock"), dir.join("cmux.sock")],
            search_dir: dir,
            env_override: None,
        }
    }

    /// Pick the socket path to connect to
    pub fn resolve(&self, explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        if let Some(path) = &self.env_override {
            return path.clone();
        }
        if let Some(path) = read_pointer(&self.pointer_file) {
            if is_connectable(&path) {
                return path;
            }
        }
        if let Some(path) = self.well_known.iter().find(|p| is_connectable(p)) {
            return path.clone();
        }
        if let Some(path) = self.youngest_tagged_socket() {
            return path;
        }
        self.well_known
            .first()
            .cloned()
            .unwrap_or_else(default_socket_path)
    }

    /// Most recently modified `cmux-debug-*.sock` in the search directory
    fn youngest_tagged_socket(&self) -> Option<PathBuf> {
        let entries = std::fs::read_dir(&self.search_dir).ok()?;
        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                name.starts_with("cmux-debug-") && name.ends_with(".sock")
            })
            .map(|entry| {
                let modified = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (modified, entry.path())
            })
            .filter(|(_, path)| is_connectable(path))
            .max_by_key(|(modified, _)| *modified)
            .map(|(_, path)| path)
    }
}

fn is_connectable(path: &Path) -> bool {
    UnixStream::connect(path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixListener;

    #[test]
    fn test_paths_are_namespaced() {
        assert!(config_dir().to_string_lossy().contains("cmux"));
        assert!(config_file().ends_with("config.toml"));
        assert!(log_dir().ends_with("log"));
    }

    #[test]
    fn test_explicit_wins() {
        let dir = tempfile::tempdir().unwrap();
        let discovery = SocketDiscovery {
            env_override: Some(dir.path().join("env.sock")),
            ..SocketDiscovery::in_dir(dir.path())
        };
        let explicit = dir.path().join("explicit.sock");
        assert_eq!(discovery.resolve(Some(&explicit)), explicit);
        assert_eq!(discovery.resolve(None), dir.path().join("env.sock"));
    }

    #[test]
    fn test_pointer_file_used_when_live() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("live.sock");
        let _listener = UnixListener::bind(&live).unwrap();
        let discovery = SocketDiscovery::in_dir(dir.path());
        std::fs::write(&discovery.pointer_file, format!("{}\n", live.display())).unwrap();

        assert_eq!(discovery.resolve(None), live);
    }

    #[test]
    fn test_stale_pointer_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let discovery = SocketDiscovery::in_dir(dir.path());
        std::fs::write(&discovery.pointer_file, dir.path().join("gone.sock").to_string_lossy().as_bytes()).unwrap();
        let release = dir.path().join("cmux.sock");
        let _listener = UnixListener::bind(&release).unwrap();

        assert_eq!(discovery.resolve(None), release);
    }

    #[test]
    fn test_tagged_debug_socket_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let tagged = dir.path().join("cmux-debug-feature.sock");
        let _listener = UnixListener::bind(&tagged).unwrap();
        let discovery = SocketDiscovery::in_dir(dir.path());

        assert_eq!(discovery.resolve(None), tagged);
    }

    #[test]
    fn test_nothing_listening_falls_back_to_first_well_known() {
        let dir = tempfile::tempdir().unwrap();
        let discovery = SocketDiscovery::in_dir(dir.path());
        assert_eq!(discovery.resolve(None), dir.path().join("cmux-debug.sock"));
    }
}
