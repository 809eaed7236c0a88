//! Per-connection session loop
//!
//! Each accepted stream is gated once, then serves records strictly in
//! arrival order: a reply is written before the next record is handled.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::UnixStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, trace, warn};

use cmux_protocol::{CommandError, Record, RecordCodec, RpcResponse};

use crate::access::AccessDecision;
use crate::connections::ConnectionId;
use crate::handlers::{AuthState, HandlerContext};
use crate::SharedState;

type Connection = Framed<UnixStream, RecordCodec>;

/// Serve one client until it disconnects or the server shuts down
pub async fn run_session(stream: UnixStream, shared: SharedState) {
    let peer_pid = match stream.peer_cred() {
        Ok(cred) => cred.pid().and_then(|pid| u32::try_from(pid).ok()),
        Err(e) => {
            debug!("Peer credentials unavailable: {}", e);
            None
        }
    };
    let connection_id = shared.connections.register(peer_pid);

    let gate = Arc::clone(&shared.gate);
    let decision = match tokio::task::spawn_blocking(move || gate.evaluate(peer_pid)).await {
        Ok(decision) => decision,
        Err(e) => {
            error!(conn = %connection_id, "Access check failed: {}", e);
            AccessDecision::Reject
        }
    };
    info!(
        conn = %connection_id,
        ?peer_pid,
        mode = shared.gate.mode().as_str(),
        ?decision,
        "Accepted connection"
    );

    let framed = Framed::new(
        stream,
        RecordCodec::new(shared.config.socket.max_line_bytes),
    );
    match decision {
        AccessDecision::Reject => reject(framed, &shared, connection_id).await,
        AccessDecision::Admit => serve(framed, &shared, connection_id, AuthState::Open).await,
        AccessDecision::AdmitPendingAuth => {
            serve(framed, &shared, connection_id, AuthState::Pending).await
        }
    }

    shared.connections.unregister(connection_id);
}

/// Answer the first record (if one arrives soon) with access denied, then close
async fn reject(mut framed: Connection, shared: &SharedState, connection_id: ConnectionId) {
    let wait = Duration::from_millis(shared.config.socket.reject_reply_timeout_ms);
    let first = match timeout(wait, framed.next()).await {
        Ok(Some(Ok(record))) => Some(record),
        _ => None,
    };

    let err = CommandError::access_denied();
    let reply = match first {
        Some(Record::V2(line)) => RpcResponse::failure(request_id(&line), err).to_line(),
        Some(Record::Oversized { json: true }) => RpcResponse::failure(Value::Null, err).to_line(),
        _ => err.to_v1_line(),
    };
    if let Err(e) = framed.send(reply).await {
        debug!(conn = %connection_id, "Failed to write denial: {}", e);
    }
    warn!(conn = %connection_id, "Rejected connection");
}

/// Best-effort id recovery so a denied v2 caller can match the reply
fn request_id(line: &str) -> Value {
    serde_json::from_str::<Value>(line)
        .ok()
        .and_then(|value| value.get("id").cloned())
        .unwrap_or(Value::Null)
}

async fn serve(
    mut framed: Connection,
    shared: &SharedState,
    connection_id: ConnectionId,
    auth: AuthState,
) {
    let mut ctx = HandlerContext::new(shared.clone(), connection_id, auth);
    let mut shutdown_rx = shared.subscribe_shutdown();
    let idle = Duration::from_millis(shared.config.socket.read_timeout_ms);

    loop {
        tokio::select! {
            next = timeout(idle, framed.next()) => match next {
                Err(_) => {
                    trace!(conn = %connection_id, "Session idle");
                }
                Ok(None) => {
                    debug!(conn = %connection_id, "Client disconnected");
                    break;
                }
                Ok(Some(Err(e))) => {
                    debug!(conn = %connection_id, "Read error: {}", e);
                    break;
                }
                Ok(Some(Ok(record))) => {
                    let reply = ctx.handle_record(record).await;
                    if let Err(e) = framed.send(reply).await {
                        debug!(conn = %connection_id, "Write error: {}", e);
                        break;
                    }
                }
            },
            _ = shutdown_rx.recv() => {
                debug!(conn = %connection_id, "Closing session for shutdown");
                break;
            }
        }
    }
}
