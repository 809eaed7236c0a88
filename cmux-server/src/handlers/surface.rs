//! Surface, browser and terminal-input operations

use cmux_protocol::{CommandError, Handle};
use uuid::Uuid;

use crate::registry::{
    Created, MoveDestination, Registry, SplitDirection, SurfaceInfo, SurfaceInput, SurfaceType,
    BLANK_PAGE,
};

use super::{pane_target, surface_target, workspace_scope, HandlerContext, Position, Result};

/// Where `surface.move` should send a surface
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveTarget {
    pub pane: Option<Handle>,
    pub workspace: Option<Handle>,
    pub window: Option<Handle>,
}

impl MoveTarget {
    /// Most specific destination wins: pane, then workspace, then window
    fn resolve(&self, registry: &Registry) -> Result<Option<MoveDestination>> {
        if let Some(pane) = self.pane {
            return Ok(Some(MoveDestination::Pane(registry.resolve_pane(pane, None)?)));
        }
        if let Some(workspace) = self.workspace {
            return Ok(Some(MoveDestination::Workspace(
                registry.resolve_workspace(workspace, None)?,
            )));
        }
        self.window
            .map(|w| registry.resolve_window(w).map(MoveDestination::Window))
            .transpose()
    }
}

/// Current URL of a browser surface after a browser operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserLocation {
    pub surface_id: Uuid,
    pub url: String,
    pub can_go_back: bool,
    pub can_go_forward: bool,
}

#[derive(Debug, Clone, Copy)]
enum HistoryStep {
    Back,
    Forward,
}

impl HandlerContext {
    pub(super) async fn list_surfaces(
        &self,
        workspace: Option<Handle>,
    ) -> Result<(Uuid, Vec<SurfaceInfo>)> {
        self.read(|state| {
            let id = workspace_scope(&state.registry, workspace)?;
            Ok((id, state.registry.list_surfaces(id)?))
        })
        .await
    }

    pub(super) async fn focus_surface(
        &self,
        surface: Handle,
        workspace: Option<Handle>,
    ) -> Result<Uuid> {
        self.mutate(|state| {
            let id = surface_target(&state.registry, Some(surface), workspace)?;
            state.registry.focus_surface(id)?;
            Ok(id)
        })
        .await
    }

    /// Split the pane holding `surface` (default: focused surface)
    pub(super) async fn split_surface(
        &self,
        direction: SplitDirection,
        surface: Option<Handle>,
        kind: SurfaceType,
        url: Option<String>,
    ) -> Result<Created> {
        self.mutate(|state| {
            let surface = surface_target(&state.registry, surface, None)?;
            let anchor = state
                .registry
                .locate_surface(surface)
                .ok_or_else(|| CommandError::not_found(format!("Surface not found: {}", surface)))?
                .pane;
            state.registry.create_pane(anchor, direction, kind, url, true)
        })
        .await
    }

    /// Add a surface to `pane` (default: focused pane)
    pub(super) async fn create_surface(
        &self,
        pane: Option<Handle>,
        workspace: Option<Handle>,
        kind: SurfaceType,
        url: Option<String>,
    ) -> Result<(Uuid, Uuid)> {
        self.mutate(|state| {
            let pane = pane_target(&state.registry, pane, workspace)?;
            let surface = state.registry.create_surface(pane, kind, url)?;
            Ok((pane, surface))
        })
        .await
    }

    pub(super) async fn close_surface(
        &self,
        surface: Option<Handle>,
        workspace: Option<Handle>,
    ) -> Result<Uuid> {
        self.mutate(|state| {
            let id = surface_target(&state.registry, surface, workspace)?;
            state.registry.close_surface(id)?;
            Ok(id)
        })
        .await
    }

    pub(super) async fn move_surface(
        &self,
        surface: Handle,
        target: MoveTarget,
        position: Position,
        focus: bool,
    ) -> Result<Uuid> {
        self.mutate(|state| {
            let registry = &state.registry;
            let id = surface_target(registry, Some(surface), None)?;
            let destination = target.resolve(registry)?;
            let placement = position.at_most_one(|h| registry.resolve_surface(h, None))?;
            state.registry.move_surface(id, destination, placement, focus)?;
            Ok(id)
        })
        .await
    }

    /// Reorder within the surface's pane; returns the new index
    pub(super) async fn reorder_surface(&self, surface: Handle, position: Position) -> Result<usize> {
        self.mutate(|state| {
            let registry = &state.registry;
            let id = surface_target(registry, Some(surface), None)?;
            let placement = position.exactly_one(|h| registry.resolve_surface(h, None))?;
            state.registry.reorder_surface(id, placement)
        })
        .await
    }

    /// Queue input for a terminal surface (default: focused surface)
    pub(super) async fn send_input(
        &self,
        surface: Option<Handle>,
        input: SurfaceInput,
    ) -> Result<Uuid> {
        self.mutate(|state| {
            let id = surface_target(&state.registry, surface, None)?;
            state.registry.surface_mut(id)?.push_input(input)?;
            Ok(id)
        })
        .await
    }

    pub(super) async fn trigger_flash(&self, surface: Option<Handle>) -> Result<Uuid> {
        self.mutate(|state| {
            let id = surface_target(&state.registry, surface, None)?;
            state.registry.surface_mut(id)?.flash();
            Ok(id)
        })
        .await
    }

    // ==================== Browser ====================

    /// Open a browser in a new pane beside `anchor` (default: focused surface)
    pub(super) async fn open_browser(
        &self,
        url: Option<String>,
        anchor: Option<Handle>,
        direction: SplitDirection,
    ) -> Result<Created> {
        let url = Some(url.unwrap_or_else(|| BLANK_PAGE.to_string()));
        self.split_surface(direction, anchor, SurfaceType::Browser, url)
            .await
    }

    pub(super) async fn navigate(&self, surface: Option<Handle>, url: &str) -> Result<BrowserLocation> {
        let url = url.trim();
        if url.is_empty() {
            return Err(CommandError::invalid_params("URL must not be empty"));
        }
        self.mutate(|state| {
            let id = surface_target(&state.registry, surface, None)?;
            let target = state.registry.surface_mut(id)?;
            target.browser_mut()?.navigate(url);
            target.sync_title();
            browser_location(&state.registry, id)
        })
        .await
    }

    pub(super) async fn browser_url(&self, surface: Option<Handle>) -> Result<BrowserLocation> {
        self.read(|state| {
            let id = surface_target(&state.registry, surface, None)?;
            browser_location(&state.registry, id)
        })
        .await
    }

    pub(super) async fn browser_back(&self, surface: Option<Handle>) -> Result<BrowserLocation> {
        self.step_history(surface, HistoryStep::Back).await
    }

    pub(super) async fn browser_forward(&self, surface: Option<Handle>) -> Result<BrowserLocation> {
        self.step_history(surface, HistoryStep::Forward).await
    }

    async fn step_history(&self, surface: Option<Handle>, step: HistoryStep) -> Result<BrowserLocation> {
        self.mutate(|state| {
            let id = surface_target(&state.registry, surface, None)?;
            let target = state.registry.surface_mut(id)?;
            let history = target.browser_mut()?;
            // Stepping past either end leaves the page unchanged
            match step {
                HistoryStep::Back => history.back(),
                HistoryStep::Forward => history.forward(),
            };
            target.sync_title();
            browser_location(&state.registry, id)
        })
        .await
    }

    // ==================== Debug ====================

    pub(super) async fn flash_count(&self, surface: Option<Handle>) -> Result<(Uuid, u64)> {
        self.read(|state| {
            let id = surface_target(&state.registry, surface, None)?;
            let count = state
                .registry
                .surface(id)
                .map(|s| s.flash_count())
                .unwrap_or_default();
            Ok((id, count))
        })
        .await
    }

    pub(super) async fn reset_flash_counts(&self) {
        let mut state = self.shared.state.lock().await;
        state.registry.reset_flash_counts();
    }

    /// Take every queued input item for a surface
    pub(super) async fn drain_input(&self, surface: Option<Handle>) -> Result<(Uuid, Vec<SurfaceInput>)> {
        self.mutate(|state| {
            let id = surface_target(&state.registry, surface, None)?;
            let drained = state.registry.surface_mut(id)?.drain_input();
            Ok((id, drained))
        })
        .await
    }
}

fn browser_location(registry: &Registry, id: Uuid) -> Result<BrowserLocation> {
    let history = registry
        .surface(id)
        .and_then(|s| s.browser())
        .ok_or_else(|| CommandError::invalid_params(format!("Surface {} is not a browser", id)))?;
    Ok(BrowserLocation {
        surface_id: id,
        url: history.current().to_string(),
        can_go_back: history.can_go_back(),
        can_go_forward: history.can_go_forward(),
    })
}
