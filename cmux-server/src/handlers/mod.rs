//! Request handlers
//!
//! `v1` and `v2` turn records into typed calls on [`HandlerContext`]; the
//! domain submodules perform those calls against the shared state, each one
//! under a single hold of the state lock.

mod aliases;
mod notification;
mod pane;
mod sidebar;
mod surface;
mod system;
mod v1;
mod v2;
mod workspace;

use tracing::{debug, info};
use uuid::Uuid;

use cmux_protocol::{CommandError, Handle, Record};

use crate::connections::ConnectionId;
use crate::registry::{Placement, Registry};
use crate::state::ServerState;
use crate::SharedState;

pub use aliases::AliasTable;
pub use sidebar::ScopeTarget;
pub use system::{AuthOutcome, Identity};

type Result<T> = std::result::Result<T, CommandError>;

/// Where a session stands with respect to password login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No login required
    Open,
    /// Password mode, not yet logged in
    Pending,
    Authenticated,
}

impl AuthState {
    pub fn allows_commands(&self) -> bool {
        !matches!(self, AuthState::Pending)
    }
}

/// Per-connection handler state
pub struct HandlerContext {
    shared: SharedState,
    connection_id: ConnectionId,
    auth: AuthState,
}

impl HandlerContext {
    pub fn new(shared: SharedState, connection_id: ConnectionId, auth: AuthState) -> Self {
        Self {
            shared,
            connection_id,
            auth,
        }
    }

    /// Handle one framed record, returning the reply to write
    pub async fn handle_record(&mut self, record: Record) -> String {
        self.shared.connections.record_request(self.connection_id);
        match record {
            Record::V1(line) => self.handle_v1(&line).await,
            Record::V2(line) => self.handle_v2(&line).await,
            Record::Oversized { json } => {
                let max = self.shared.config.socket.max_line_bytes;
                debug!(conn = %self.connection_id, max, "Oversized record");
                let err = CommandError::invalid_params(format!(
                    "Request exceeds {} bytes",
                    max
                ));
                if json {
                    cmux_protocol::RpcResponse::failure(serde_json::Value::Null, err).to_line()
                } else {
                    err.to_v1_line()
                }
            }
        }
    }

    fn mark_authenticated(&mut self) {
        self.auth = AuthState::Authenticated;
        self.shared.connections.mark_authenticated(self.connection_id);
        info!(conn = %self.connection_id, "Session authenticated");
    }

    /// Run `f` under the state lock, then drop state of closed workspaces
    async fn mutate<T>(&self, f: impl FnOnce(&mut ServerState) -> Result<T>) -> Result<T> {
        let mut state = self.shared.state.lock().await;
        let result = f(&mut state);
        state.prune_closed_workspaces();
        result
    }

    async fn read<T>(&self, f: impl FnOnce(&ServerState) -> T) -> T {
        let state = self.shared.state.lock().await;
        f(&state)
    }
}

/// Positional target for reorder and move operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub index: Option<usize>,
    pub before: Option<Handle>,
    pub after: Option<Handle>,
}

impl Position {
    pub fn is_empty(&self) -> bool {
        self.index.is_none() && self.before.is_none() && self.after.is_none()
    }

    /// Resolve sibling handles; exactly one target is required
    fn exactly_one(&self, resolve: impl Fn(Handle) -> Result<Uuid>) -> Result<Placement> {
        let (before, after) = self.resolve_anchors(&resolve)?;
        Placement::exactly_one(self.index, before, after)
    }

    /// Resolve sibling handles; no target is fine
    fn at_most_one(&self, resolve: impl Fn(Handle) -> Result<Uuid>) -> Result<Option<Placement>> {
        let (before, after) = self.resolve_anchors(&resolve)?;
        Placement::at_most_one(self.index, before, after)
    }

    fn resolve_anchors(
        &self,
        resolve: &impl Fn(Handle) -> Result<Uuid>,
    ) -> Result<(Option<Uuid>, Option<Uuid>)> {
        let before = self.before.map(resolve).transpose()?;
        let after = self.after.map(resolve).transpose()?;
        Ok((before, after))
    }
}

// Scope helpers: `None` means the focused entity

fn window_scope(registry: &Registry, window: Option<Handle>) -> Result<Uuid> {
    match window {
        Some(handle) => registry.resolve_window(handle),
        None => registry.current_window(),
    }
}

fn workspace_scope(registry: &Registry, workspace: Option<Handle>) -> Result<Uuid> {
    match workspace {
        Some(handle) => registry.resolve_workspace(handle, None),
        None => registry.current_workspace(),
    }
}

fn pane_target(registry: &Registry, pane: Option<Handle>, workspace: Option<Handle>) -> Result<Uuid> {
    let scope = workspace_scope(registry, workspace)?;
    match pane {
        Some(handle) => registry.resolve_pane(handle, Some(scope)),
        None => registry.focused_pane_in(scope),
    }
}

fn surface_target(
    registry: &Registry,
    surface: Option<Handle>,
    workspace: Option<Handle>,
) -> Result<Uuid> {
    let scope = workspace_scope(registry, workspace)?;
    match surface {
        Some(handle) => registry.resolve_surface(handle, Some(scope)),
        None => {
            let pane = registry.focused_pane_in(scope)?;
            registry
                .list_pane_surfaces(pane)?
                .into_iter()
                .find(|s| s.selected)
                .map(|s| s.id)
                .ok_or_else(|| CommandError::not_found("No surface focused"))
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;

    use crate::access::AccessGate;
    use crate::config::AppConfig;
    use crate::SharedState;

    use super::{AuthState, HandlerContext};

    pub fn shared_with(config: AppConfig) -> SharedState {
        let gate = AccessGate::from_config(&config.socket);
        SharedState::new(config, gate, PathBuf::from("/tmp/cmux-test.sock"))
    }

    pub fn context_with(config: AppConfig, auth: AuthState) -> HandlerContext {
        let shared = shared_with(config);
        let id = shared.connections.register(None);
        HandlerContext::new(shared, id, auth)
    }

    pub fn context() -> HandlerContext {
        let mut config = AppConfig::default();
        config.protocol.debug_methods = true;
        context_with(config, AuthState::Open)
    }
}
