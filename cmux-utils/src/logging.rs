//! tracing setup for the server and the CLI
//!
//! The server writes to a log file so the control socket never shares a
//! terminal with it; the CLI only reports warnings on stderr.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{paths, CmuxError, Result};

/// Environment variable holding the log filter directive
pub const LOG_ENV: &str = "CMUX_LOG";

/// File name of the server log inside [`paths::log_dir`]
pub const SERVER_LOG_FILE: &str = "cmux.log";

/// Where log lines go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stderr,
    /// Append to a file, creating its directory
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub output: LogOutput,
    /// `EnvFilter` directive, e.g. `cmux_server=debug`
    pub filter: String,
    /// Tag each line with its source file and line
    pub source_location: bool,
}

impl LogConfig {
    /// Warnings on stderr unless `CMUX_LOG` asks for more
    pub fn client() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: filter_directive(std::env::var(LOG_ENV).ok(), "warn"),
            source_location: false,
        }
    }

    /// Info and above to `$XDG_STATE_HOME/cmux/log/cmux.log`
    pub fn server() -> Self {
        Self {
            output: LogOutput::File(paths::log_dir().join(SERVER_LOG_FILE)),
            filter: filter_directive(std::env::var(LOG_ENV).ok(), "info"),
            source_location: true,
        }
    }
}

/// The configured directive, or `default` when unset or blank
fn filter_directive(configured: Option<String>, default: &str) -> String {
    configured
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Install the global subscriber
///
/// Fails on an unparsable filter or if a subscriber is already installed.
pub fn init_logging_with_config(config: LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| CmuxError::config(format!("Invalid {} filter '{}': {}", LOG_ENV, config.filter, e)))?;

    let layer = fmt::layer()
        .with_target(true)
        .with_file(config.source_location)
        .with_line_number(config.source_location);

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match &config.output {
        LogOutput::Stderr => registry.with(layer.with_writer(std::io::stderr)).try_init(),
        LogOutput::File(path) => {
            let file = open_append(path)?;
            registry
                .with(layer.with_writer(file).with_ansi(false))
                .try_init()
        }
    };
    installed.map_err(|e| CmuxError::internal(format!("Logging already initialized: {}", e)))
}

fn open_append(path: &Path) -> Result<File> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| CmuxError::FileWrite {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| CmuxError::FileWrite {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_falls_back_when_blank() {
        assert_eq!(filter_directive(None, "warn"), "warn");
        assert_eq!(filter_directive(Some("  ".into()), "warn"), "warn");
        assert_eq!(
            filter_directive(Some(" cmux_server=debug ".into()), "warn"),
            "cmux_server=debug"
        );
    }

    #[test]
    fn test_server_logs_to_state_dir() {
        let config = LogConfig::server();
        match config.output {
            LogOutput::File(path) => {
                assert!(path.ends_with(Path::new("log").join(SERVER_LOG_FILE)));
            }
            other => panic!("unexpected output {:?}", other),
        }
        assert!(config.source_location);
    }

    #[test]
    fn test_open_append_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cmux.log");
        open_append(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let config = LogConfig {
            output: LogOutput::Stderr,
            filter: "cmux=[".into(),
            source_location: false,
        };
        let result = init_logging_with_config(config);
        assert!(matches!(result, Err(CmuxError::Config(_))));
    }
}
