//! Window and workspace operations

use cmux_protocol::Handle;
use tracing::debug;
use uuid::Uuid;

use crate::registry::{Created, Cycle, WindowInfo, WorkspaceInfo};

use super::{window_scope, workspace_scope, HandlerContext, Position, Result};

impl HandlerContext {
    pub(super) async fn list_windows(&self) -> Vec<WindowInfo> {
        self.read(|state| state.registry.list_windows()).await
    }

    pub(super) async fn current_window(&self) -> Result<Uuid> {
        self.read(|state| state.registry.current_window()).await
    }

    pub(super) async fn create_window(&self) -> Result<Created> {
        let created = self.mutate(|state| Ok(state.registry.create_window())).await?;
        debug!(window = %created.window_id, "Created window");
        Ok(created)
    }

    pub(super) async fn focus_window(&self, window: Handle) -> Result<Uuid> {
        self.mutate(|state| {
            let id = state.registry.resolve_window(window)?;
            state.registry.focus_window(id)?;
            Ok(id)
        })
        .await
    }

    pub(super) async fn close_window(&self, window: Option<Handle>) -> Result<Uuid> {
        self.mutate(|state| {
            let id = window_scope(&state.registry, window)?;
            state.registry.close_window(id)?;
            Ok(id)
        })
        .await
    }

    pub(super) async fn list_workspaces(
        &self,
        window: Option<Handle>,
    ) -> Result<(Uuid, Vec<WorkspaceInfo>)> {
        self.read(|state| {
            let id = window_scope(&state.registry, window)?;
            Ok((id, state.registry.list_workspaces(id)?))
        })
        .await
    }

    pub(super) async fn create_workspace(&self, window: Option<Handle>) -> Result<Created> {
        let created = self
            .mutate(|state| {
                let id = window_scope(&state.registry, window)?;
                state.registry.create_workspace(id)
            })
            .await?;
        debug!(workspace = %created.workspace_id, "Created workspace");
        Ok(created)
    }

    pub(super) async fn close_workspace(&self, workspace: Option<Handle>) -> Result<Uuid> {
        self.mutate(|state| {
            let id = workspace_scope(&state.registry, workspace)?;
            state.registry.close_workspace(id)?;
            Ok(id)
        })
        .await
    }

    /// Select a workspace; ordinals count within `window` (default: focused)
    pub(super) async fn select_workspace(
        &self,
        workspace: Handle,
        window: Option<Handle>,
    ) -> Result<Uuid> {
        self.mutate(|state| {
            let scope = window.map(|w| state.registry.resolve_window(w)).transpose()?;
            let id = state.registry.resolve_workspace(workspace, scope)?;
            state.registry.select_workspace(id)?;
            Ok(id)
        })
        .await
    }

    pub(super) async fn current_workspace(&self, window: Option<Handle>) -> Result<Uuid> {
        self.read(|state| {
            let id = window_scope(&state.registry, window)?;
            state.registry.selected_workspace_in(id)
        })
        .await
    }

    pub(super) async fn rename_workspace(
        &self,
        workspace: Option<Handle>,
        title: &str,
    ) -> Result<Uuid> {
        self.mutate(|state| {
            let id = workspace_scope(&state.registry, workspace)?;
            state.registry.rename_workspace(id, title)?;
            Ok(id)
        })
        .await
    }

    pub(super) async fn cycle_workspace(
        &self,
        direction: Cycle,
        window: Option<Handle>,
    ) -> Result<Uuid> {
        self.mutate(|state| {
            let id = window_scope(&state.registry, window)?;
            state.registry.cycle_workspace(id, direction)
        })
        .await
    }

    pub(super) async fn last_workspace(&self, window: Option<Handle>) -> Result<Uuid> {
        self.mutate(|state| {
            let id = window_scope(&state.registry, window)?;
            state.registry.last_workspace(id)
        })
        .await
    }

    pub(super) async fn move_workspace_to_window(
        &self,
        workspace: Option<Handle>,
        window: Handle,
        focus: bool,
    ) -> Result<(Uuid, Uuid)> {
        self.mutate(|state| {
            let workspace = workspace_scope(&state.registry, workspace)?;
            let window = state.registry.resolve_window(window)?;
            state
                .registry
                .move_workspace_to_window(workspace, window, focus)?;
            Ok((workspace, window))
        })
        .await
    }

    /// Reorder within the workspace's window; returns the new index
    pub(super) async fn reorder_workspace(
        &self,
        workspace: Handle,
        position: Position,
        window: Option<Handle>,
    ) -> Result<usize> {
        self.mutate(|state| {
            let registry = &state.registry;
            let window = window.map(|w| registry.resolve_window(w)).transpose()?;
            let id = registry.resolve_workspace(workspace, window)?;
            let placement = position.exactly_one(|h| registry.resolve_workspace(h, window))?;
            state.registry.reorder_workspace(id, placement, window)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::context;
    use super::*;
    use cmux_protocol::ErrorCode;

    #[tokio::test]
    async fn test_select_by_live_ordinal() {
        let ctx = context();
        ctx.create_workspace(None).await.unwrap();
        let (_, listed) = ctx.list_workspaces(None).await.unwrap();
        assert_eq!(listed.len(), 2);

        let w3 = ctx.create_workspace(None).await.unwrap().workspace_id;
        ctx.select_workspace(Handle::Ordinal(0), None).await.unwrap();
        assert_eq!(ctx.select_workspace(Handle::Ordinal(2), None).await.unwrap(), w3);
        assert_eq!(ctx.current_workspace(None).await.unwrap(), w3);
    }

    #[tokio::test]
    async fn test_reorder_requires_one_target() {
        let ctx = context();
        ctx.create_workspace(None).await.unwrap();

        let err = ctx
            .reorder_workspace(Handle::Ordinal(0), Position::default(), None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParams);

        let both = Position {
            index: Some(0),
            before: Some(Handle::Ordinal(1)),
            after: None,
        };
        let err = ctx
            .reorder_workspace(Handle::Ordinal(0), both, None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParams);

        let to_end = Position {
            index: Some(1),
            ..Position::default()
        };
        assert_eq!(
            ctx.reorder_workspace(Handle::Ordinal(0), to_end, None).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_window_lifecycle() {
        let ctx = context();
        let first = ctx.current_window().await.unwrap();
        let second = ctx.create_window().await.unwrap().window_id;
        assert_eq!(ctx.list_windows().await.len(), 2);
        assert_eq!(ctx.current_window().await.unwrap(), second);

        ctx.focus_window(Handle::Id(first)).await.unwrap();
        assert_eq!(ctx.current_window().await.unwrap(), first);

        ctx.close_window(Some(Handle::Id(second))).await.unwrap();
        assert_eq!(ctx.list_windows().await.len(), 1);
    }
}
