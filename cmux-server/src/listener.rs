//! Unix socket listener

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tokio::net::UnixListener;
use tracing::{debug, error, info, warn};

use cmux_utils::{write_last_socket_pointer, CmuxError, Result};

use crate::session::run_session;
use crate::SharedState;

/// Bind the control socket, replacing a stale socket file
///
/// Fails if another server is still accepting on `path`.
pub fn bind_socket(path: &Path) -> Result<UnixListener> {
    if path.exists() {
        if std::os::unix::net::UnixStream::connect(path).is_ok() {
            return Err(CmuxError::connection(format!(
                "Another server is already listening on {}",
                path.display()
            )));
        }
        debug!(path = %path.display(), "Removing stale socket");
        std::fs::remove_file(path)?;
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let listener = UnixListener::bind(path)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(listener)
}

/// Accept connections until shutdown, one session task per connection
pub async fn run_accept_loop(listener: UnixListener, shared_state: SharedState) {
    let mut shutdown_rx = shared_state.subscribe_shutdown();

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let state_clone = shared_state.clone();
                        tokio::spawn(async move {
                            run_session(stream, state_clone).await;
                        });
                    }
                    Err(e) => {
                        error!("Socket accept error: {}", e);
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received, stopping accept loop");
                break;
            }
        }
    }
}

/// Bind, record the pointer file, serve until shutdown, then remove the socket
pub async fn serve(shared_state: SharedState) -> Result<()> {
    let path = shared_state.socket_path().to_path_buf();
    let listener = bind_socket(&path)?;
    info!(
        path = %path.display(),
        mode = shared_state.gate.mode().as_str(),
        "Listening on control socket"
    );

    if shared_state.config.socket.write_last_socket_pointer {
        if let Err(e) = write_last_socket_pointer(&path) {
            warn!("Failed to write socket pointer file: {}", e);
        }
    }

    run_accept_loop(listener, shared_state).await;

    if let Err(e) = std::fs::remove_file(&path) {
        debug!(path = %path.display(), "Socket already gone: {}", e);
    }
    info!(path = %path.display(), "Control socket closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessGate, StaticProcessTable};
    use crate::config::{AppConfig, SocketMode, V1Spellings};
    use serde_json::Value;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
    use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
    use tokio::net::UnixStream;
    use tokio::task::JoinHandle;

    struct TestServer {
        _dir: TempDir,
        path: PathBuf,
        shared: SharedState,
        task: JoinHandle<Result<()>>,
    }

    impl TestServer {
        async fn start(mut config: AppConfig) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("cmux.sock");
            config.socket.write_last_socket_pointer = false;
            config.socket.reject_reply_timeout_ms = 200;
            config.protocol.debug_methods = true;
            // Nothing in the empty table descends from pid 1 except pid 1
            let gate = AccessGate::from_config(&config.socket)
                .with_process_table(Arc::new(StaticProcessTable::new()))
                .with_host_pid(1);
            let shared = SharedState::new(config, gate, path.clone());
            let task = tokio::spawn(serve(shared.clone()));
            for _ in 0..100 {
                if path.exists() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            Self {
                _dir: dir,
                path,
                shared,
                task,
            }
        }

        async fn connect(&self) -> TestClient {
            let stream = UnixStream::connect(&self.path).await.unwrap();
            let (read, write) = stream.into_split();
            TestClient {
                lines: BufReader::new(read).lines(),
                write,
            }
        }
    }

    struct TestClient {
        lines: Lines<BufReader<OwnedReadHalf>>,
        write: OwnedWriteHalf,
    }

    impl TestClient {
        /// Send one line and read `n` reply lines
        async fn request(&mut self, line: &str, n: usize) -> Vec<String> {
            self.write.write_all(format!("{}\n", line).as_bytes()).await.unwrap();
            let mut out = Vec::new();
            for _ in 0..n {
                match self.lines.next_line().await.unwrap() {
                    Some(line) => out.push(line),
                    None => break,
                }
            }
            out
        }

        async fn one(&mut self, line: &str) -> String {
            self.request(line, 1).await.remove(0)
        }

        async fn rpc(&mut self, request: Value) -> Value {
            serde_json::from_str(&self.one(&request.to_string()).await).unwrap()
        }
    }

    fn config(mode: SocketMode) -> AppConfig {
        let mut config = AppConfig::default();
        config.socket.mode = mode;
        config
    }

    #[tokio::test]
    async fn test_socket_permissions_and_cleanup() {
        let server = TestServer::start(config(SocketMode::AllowAll)).await;
        let mode = std::fs::metadata(&server.path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        let mut client = server.connect().await;
        assert_eq!(client.one("ping").await, "PONG");

        let _ = server.shared.shutdown_tx.send(());
        let result = tokio::time::timeout(Duration::from_secs(2), server.task).await;
        assert!(result.unwrap().unwrap().is_ok());
        assert!(!server.path.exists());
    }

    #[tokio::test]
    async fn test_second_bind_fails_while_listening() {
        let server = TestServer::start(config(SocketMode::AllowAll)).await;
        assert!(bind_socket(&server.path).is_err());
    }

    #[tokio::test]
    async fn test_stale_socket_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.sock");
        drop(std::os::unix::net::UnixListener::bind(&path).unwrap());
        assert!(path.exists());
        assert!(bind_socket(&path).is_ok());
    }

    #[tokio::test]
    async fn test_rejecting_gate_is_evaluated_per_connection() {
        let server = TestServer::start(config(SocketMode::CmuxOnly)).await;
        for _ in 0..20 {
            let mut client = server.connect().await;
            let replies = client.request("ping", 2).await;
            assert_eq!(replies.len(), 1, "only one reply before close");
            assert!(replies[0].starts_with("ERROR: Access denied"));
        }
    }

    #[tokio::test]
    async fn test_password_login() {
        let mut config = config(SocketMode::Password);
        config.socket.password = Some("opensesame".into());
        let server = TestServer::start(config).await;
        let mut client = server.connect().await;

        assert!(client.one("list_workspaces").await.starts_with("ERROR: Authentication required"));
        let reply = client
            .rpc(serde_json::json!({"id": 1, "method": "system.ping"}))
            .await;
        assert_eq!(reply["error"]["code"], "auth_required");

        let reply = client
            .rpc(serde_json::json!({"id": 2, "method": "auth.login", "params": {"password": "opensesame"}}))
            .await;
        assert_eq!(reply["ok"], true);
        assert_eq!(client.one("ping").await, "PONG");
        assert_eq!(client.one("auth opensesame").await, "OK: Authenticated");
    }

    #[tokio::test]
    async fn test_live_ordinals_across_connections() {
        let server = TestServer::start(config(SocketMode::AllowAll)).await;
        let mut a = server.connect().await;
        let mut b = server.connect().await;

        a.one("new_workspace").await;
        let listing = a.request("list_workspaces", 2).await;
        assert_eq!(listing.len(), 2);

        let created = b.one("new_workspace").await;
        let w3 = created.strip_prefix("OK ").unwrap().to_string();

        assert_eq!(a.one("select_workspace 2").await, "OK");
        assert_eq!(a.one("current_workspace").await, w3);
    }

    #[tokio::test]
    async fn test_sidebar_over_socket() {
        let server = TestServer::start(config(SocketMode::AllowAll)).await;
        let mut client = server.connect().await;
        let ws = client.one("current_workspace").await;

        for (key, priority) in [("a", 50), ("b", 10), ("c", 80)] {
            let line = format!("report_meta {} --priority={} --tab={} -- v", key, priority, ws);
            assert_eq!(client.one(&line).await, "OK");
        }
        let rows = client.request("list_meta", 3).await;
        let keys: Vec<&str> = rows.iter().map(|r| &r[..1]).collect();
        assert_eq!(keys, vec!["c", "a", "b"]);

        client.one("report_pr 12 https://example.com/12 --state=open").await;
        client.one("report_pr 12 https://example.com/12 --state=merged").await;
        client.one("clear_pr").await;
        client.one("report_pr 12 https://example.com/12 --state=merged").await;
        let state = client.request("sidebar_state", 10).await;
        assert_eq!(
            state.iter().filter(|l| l.starts_with("pr=")).count(),
            1
        );
        assert!(state.iter().any(|l| l == "pr=#12 merged https://example.com/12"));
    }

    #[tokio::test]
    async fn test_legacy_only_build_drives_fallback() {
        let mut config = config(SocketMode::AllowAll);
        config.protocol.v1_spellings = V1Spellings::Legacy;
        let server = TestServer::start(config).await;
        let mut client = server.connect().await;

        assert_eq!(
            client.one("new_workspace").await,
            "ERROR: Unknown command new_workspace"
        );
        assert!(client.one("new_tab").await.starts_with("OK "));
    }
}
