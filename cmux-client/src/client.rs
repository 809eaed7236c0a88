//! Control socket client
//!
//! v1 commands are retried under their other spelling when the server
//! answers `ERROR: Unknown command`; v2 calls verify the echoed id.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::UnixStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::debug;

use cmux_protocol::{LineCodec, RpcRequest, RpcResponse};
use cmux_utils::{resolve_socket_path, CmuxError, Result};

/// Default time to wait for the first reply line
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Once a reply has started, it is complete after this much silence
const REPLY_QUIET: Duration = Duration::from_millis(100);

const UNKNOWN_COMMAND: &str = "ERROR: Unknown command";
const ACCESS_DENIED: &str = "ERROR: Access denied";

/// (modern, legacy) spellings of aliased v1 commands
const SPELLINGS: &[(&str, &str)] = &[
    ("list_workspaces", "list_tabs"),
    ("new_workspace", "new_tab"),
    ("close_workspace", "close_tab"),
    ("select_workspace", "select_tab"),
    ("current_workspace", "current_tab"),
    ("report_meta", "set_status"),
    ("clear_meta", "clear_status"),
];

/// The other spelling of an aliased command, if it has one
pub fn alternate_spelling(name: &str) -> Option<&'static str> {
    SPELLINGS.iter().find_map(|&(modern, legacy)| {
        if name == modern {
            Some(legacy)
        } else if name == legacy {
            Some(modern)
        } else {
            None
        }
    })
}

/// A connection to the control socket
pub struct Client {
    framed: Framed<UnixStream, LineCodec>,
    socket_path: PathBuf,
    timeout: Duration,
    next_id: u64,
}

impl Client {
    /// Connect to a specific socket path
    pub async fn connect(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CmuxError::ServerNotRunning {
                path: path.to_path_buf(),
            });
        }
        let stream = UnixStream::connect(path).await.map_err(|e| {
            CmuxError::connection(format!("Failed to connect to {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Connected to control socket");
        Ok(Self {
            framed: Framed::new(stream, LineCodec::default()),
            socket_path: path.to_path_buf(),
            timeout: DEFAULT_TIMEOUT,
            next_id: 1,
        })
    }

    /// Connect to the explicit path, or whatever discovery finds
    pub async fn discover(explicit: Option<&Path>) -> Result<Self> {
        let path = resolve_socket_path(explicit);
        Self::connect(&path).await
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Send one v1 line and return the raw reply, errors included
    pub async fn send_line(&mut self, line: &str) -> Result<String> {
        self.framed.send(line.to_string()).await.map_err(codec_error)?;

        let first = self.read_line(self.timeout).await?;
        let mut lines = vec![first];
        loop {
            match timeout(REPLY_QUIET, self.framed.next()).await {
                Ok(Some(Ok(line))) => lines.push(line),
                Ok(Some(Err(e))) => return Err(codec_error(e)),
                Ok(None) | Err(_) => break,
            }
        }
        Ok(lines.join("\n"))
    }

    /// Run a v1 command, retrying the other spelling on `Unknown command`
    ///
    /// An `ERROR:` reply becomes [`CmuxError::Remote`].
    pub async fn command(&mut self, line: &str) -> Result<String> {
        let reply = self.send_line(line).await?;
        let reply = match retry_line(line, &reply) {
            Some(retry) => {
                debug!(command = %retry, "Retrying with alternate spelling");
                self.send_line(&retry).await?
            }
            None => reply,
        };
        check_reply(reply)
    }

    /// Log in with `auth <password>`
    pub async fn login(&mut self, password: &str) -> Result<()> {
        self.command(&format!("auth {}", password)).await.map(|_| ())
    }

    /// Issue a v2 call and return its `result`
    pub async fn call(&mut self, method: &str, params: Value) -> Result<Value> {
        self.call_raw(method, params).await?
            .into_result()
            .map_err(|e| CmuxError::Remote(format!("{}: {}", e.code, e.message)))
    }

    /// Issue a v2 call and return the full response envelope
    pub async fn call_raw(&mut self, method: &str, params: Value) -> Result<RpcResponse> {
        let id = self.next_id;
        self.next_id += 1;

        let request = RpcRequest::new(id, method, params);
        self.framed.send(request.to_line()).await.map_err(codec_error)?;

        let line = self.read_line(self.timeout).await?;
        let response: RpcResponse = serde_json::from_str(&line)
            .map_err(|e| CmuxError::InvalidMessage(format!("{}: {}", e, line)))?;

        let expected = Value::from(id);
        if response.id != expected {
            if let Some(error) = response.error.as_ref().filter(|e| e.code == "access_denied") {
                debug!("Denied: {}", error.message);
                return Err(CmuxError::AccessDenied);
            }
            return Err(CmuxError::ResponseIdMismatch {
                expected: expected.to_string(),
                got: response.id.to_string(),
            });
        }
        Ok(response)
    }

    async fn read_line(&mut self, wait: Duration) -> Result<String> {
        match timeout(wait, self.framed.next()).await {
            Ok(Some(Ok(line))) => Ok(line),
            Ok(Some(Err(e))) => Err(codec_error(e)),
            Ok(None) => Err(CmuxError::ConnectionClosed),
            Err(_) => Err(CmuxError::Timeout {
                millis: wait.as_millis() as u64,
            }),
        }
    }
}

fn codec_error(err: cmux_protocol::CodecError) -> CmuxError {
    CmuxError::protocol(err.to_string())
}

/// The line to resend when `reply` reports the command name as unknown
fn retry_line(line: &str, reply: &str) -> Option<String> {
    let trimmed = line.trim_start();
    let (name, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, Some(rest)),
        None => (trimmed, None),
    };
    if reply != format!("{} {}", UNKNOWN_COMMAND, name) {
        return None;
    }
    let alternate = alternate_spelling(name)?;
    Some(match rest {
        Some(rest) => format!("{} {}", alternate, rest),
        None => alternate.to_string(),
    })
}

fn check_reply(reply: String) -> Result<String> {
    if reply.starts_with(ACCESS_DENIED) {
        Err(CmuxError::AccessDenied)
    } else if reply.starts_with("ERROR:") {
        Err(CmuxError::Remote(reply))
    } else {
        Ok(reply)
    }
}
