//! Command-line argument parsing for the cmux client

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use cmux_protocol::quote_option_value;

/// cmux - drive a running cmux instance over its control socket
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Socket path (skips discovery)
    #[arg(long, short = 'S', env = "CMUX_SOCKET_PATH")]
    pub socket: Option<PathBuf>,

    /// Log in with this password before running the command
    #[arg(long, env = "CMUX_SOCKET_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Print the full v2 response envelope instead of just the result
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Reply timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Call a v2 method, e.g. `cmux rpc workspace.list '{"window_id":0}'`
    Rpc {
        method: String,
        /// JSON object of parameters
        params: Option<String>,
    },
    /// Any other word is sent as a v1 command line
    #[command(external_subcommand)]
    V1(Vec<String>),
}

/// Commands whose argument text the server takes verbatim
const VERBATIM: &[&str] = &[
    "auth",
    "send",
    "send_surface",
    "send_key",
    "send_key_surface",
    "notify",
    "notify_surface",
];

/// Join shell words into one v1 command line
///
/// Words before a `--` separator that contain whitespace or quotes are
/// quoted; `--name=value` keeps the name bare.
pub fn command_line(words: &[String]) -> String {
    let Some((name, rest)) = words.split_first() else {
        return String::new();
    };
    let mut parts = vec![name.clone()];
    if VERBATIM.contains(&name.as_str()) {
        parts.extend(rest.iter().cloned());
        return parts.join(" ");
    }

    let mut after_separator = false;
    for word in rest {
        if after_separator {
            parts.push(word.clone());
            continue;
        }
        if word == "--" {
            after_separator = true;
            parts.push(word.clone());
            continue;
        }
        if !needs_quoting(word) {
            parts.push(word.clone());
            continue;
        }
        match word.strip_prefix("--").and_then(|w| w.split_once('=')) {
            Some((option, value)) => {
                parts.push(format!("--{}={}", option, quote_option_value(value)))
            }
            None => parts.push(quote_option_value(word)),
        }
    }
    parts.join(" ")
}

fn needs_quoting(word: &str) -> bool {
    word.is_empty() || word.chars().any(|c| c.is_whitespace() || c == '"')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(input: &[&str]) -> Vec<String> {
        input.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_v1_passthrough() {
        let args = Args::parse_from(["cmux", "list_workspaces", "--window=1"]);
        assert_eq!(
            args.command,
            Command::V1(words(&["list_workspaces", "--window=1"]))
        );
        assert!(!args.json);
    }

    #[test]
    fn test_rpc_subcommand() {
        let args = Args::parse_from(["cmux", "--json", "rpc", "system.ping"]);
        assert!(args.json);
        assert_eq!(
            args.command,
            Command::Rpc {
                method: "system.ping".into(),
                params: None
            }
        );
    }

    #[test]
    fn test_command_line_quoting() {
        assert_eq!(
            command_line(&words(&["rename_workspace", "--workspace=my ws", "--", "New  title"])),
            "rename_workspace --workspace=\"my ws\" -- New  title"
        );
        assert_eq!(
            command_line(&words(&["report_meta", "key", "two words"])),
            "report_meta key \"two words\""
        );
        assert_eq!(
            command_line(&words(&["send", "echo", "\"hi\""])),
            "send echo \"hi\""
        );
    }
}
