//! cmux-utils: Common utilities shared across cmux crates
//!
//! This crate provides:
//! - Unified error types ([`CmuxError`], [`Result`])
//! - tracing setup ([`init_logging_with_config`], [`LogConfig`])
//! - Socket discovery and XDG path utilities ([`paths`] module)

pub mod error;
pub mod logging;
pub mod paths;

// Re-export main types at crate root for convenience
pub use error::{CmuxError, Result};
pub use logging::{init_logging_with_config, LogConfig, LogOutput};

// Re-export commonly used path functions
pub use paths::{
    config_dir, config_file, default_socket_path, log_dir, resolve_socket_path, state_dir,
    write_last_socket_pointer, SocketDiscovery,
};
