//! Pane operations

use cmux_protocol::{CommandError, Handle};
use uuid::Uuid;

use crate::registry::{
    Created, MoveDestination, PaneInfo, Registry, SplitDirection, SurfaceInfo, SurfaceType,
};

use super::{pane_target, surface_target, workspace_scope, HandlerContext, Result};

/// The surface a break/join acts on: explicit surface, else the pane's
/// visible surface, else the focused surface
fn source_surface(
    registry: &Registry,
    pane: Option<Handle>,
    surface: Option<Handle>,
) -> Result<Uuid> {
    match (surface, pane) {
        (Some(_), _) | (None, None) => surface_target(registry, surface, None),
        (None, Some(pane)) => {
            let pane = pane_target(registry, Some(pane), None)?;
            registry
                .list_pane_surfaces(pane)?
                .into_iter()
                .find(|s| s.selected)
                .map(|s| s.id)
                .ok_or_else(|| CommandError::not_found(format!("Pane {} has no surface", pane)))
        }
    }
}

impl HandlerContext {
    pub(super) async fn list_panes(&self, workspace: Option<Handle>) -> Result<(Uuid, Vec<PaneInfo>)> {
        self.read(|state| {
            let id = workspace_scope(&state.registry, workspace)?;
            Ok((id, state.registry.list_panes(id)?))
        })
        .await
    }

    pub(super) async fn focus_pane(&self, pane: Handle, workspace: Option<Handle>) -> Result<Uuid> {
        self.mutate(|state| {
            let id = pane_target(&state.registry, Some(pane), workspace)?;
            state.registry.focus_pane(id)?;
            Ok(id)
        })
        .await
    }

    pub(super) async fn list_pane_surfaces(
        &self,
        pane: Option<Handle>,
        workspace: Option<Handle>,
    ) -> Result<(Uuid, Vec<SurfaceInfo>)> {
        self.read(|state| {
            let id = pane_target(&state.registry, pane, workspace)?;
            Ok((id, state.registry.list_pane_surfaces(id)?))
        })
        .await
    }

    /// Split `anchor` (default: focused pane) and focus the new pane
    pub(super) async fn create_pane(
        &self,
        direction: SplitDirection,
        kind: SurfaceType,
        url: Option<String>,
        anchor: Option<Handle>,
        workspace: Option<Handle>,
    ) -> Result<Created> {
        self.mutate(|state| {
            let anchor = pane_target(&state.registry, anchor, workspace)?;
            state.registry.create_pane(anchor, direction, kind, url, true)
        })
        .await
    }

    pub(super) async fn swap_panes(
        &self,
        pane: Handle,
        target: Handle,
        focus: bool,
    ) -> Result<(Uuid, Uuid)> {
        self.mutate(|state| {
            let a = pane_target(&state.registry, Some(pane), None)?;
            let b = pane_target(&state.registry, Some(target), None)?;
            state.registry.swap_panes(a, b, focus)?;
            Ok((a, b))
        })
        .await
    }

    /// Move a surface out into a new workspace
    pub(super) async fn break_pane(
        &self,
        pane: Option<Handle>,
        surface: Option<Handle>,
        focus: bool,
    ) -> Result<Created> {
        self.mutate(|state| {
            let surface = source_surface(&state.registry, pane, surface)?;
            state.registry.break_surface(surface, focus)
        })
        .await
    }

    /// Move a surface into `target`, collapsing whatever it leaves empty
    pub(super) async fn join_pane(
        &self,
        target: Handle,
        pane: Option<Handle>,
        surface: Option<Handle>,
        focus: bool,
    ) -> Result<(Uuid, Uuid)> {
        self.mutate(|state| {
            let target = pane_target(&state.registry, Some(target), None)?;
            let surface = source_surface(&state.registry, pane, surface)?;
            state
                .registry
                .move_surface(surface, Some(MoveDestination::Pane(target)), None, focus)?;
            Ok((surface, target))
        })
        .await
    }

    pub(super) async fn last_pane(&self, workspace: Option<Handle>) -> Result<Uuid> {
        self.mutate(|state| {
            let id = workspace_scope(&state.registry, workspace)?;
            state.registry.last_pane(id)
        })
        .await
    }
}
