//! Entity registry
//!
//! Holds the live address space: windows own workspaces, workspaces own
//! panes, panes own surfaces. Ordinals are positions in each parent's order
//! and are recomputed on every call, never cached.

mod ordered;
mod pane;
mod surface;
mod window;
mod workspace;

use serde::Serialize;
use uuid::Uuid;

use cmux_protocol::{CommandError, EntityKind, Handle};

pub use ordered::{Identified, Ordered, Placement};
pub use pane::Pane;
pub use surface::{BrowserHistory, Surface, SurfaceInput, SurfaceType, BLANK_PAGE};
pub use window::{Cycle, Window};
pub use workspace::Workspace;

type Result<T> = std::result::Result<T, CommandError>;

/// Where a new pane goes relative to its anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitDirection {
    Left,
    Right,
    Up,
    Down,
}

impl SplitDirection {
    fn placement(self, anchor: Uuid) -> Placement {
        match self {
            SplitDirection::Left | SplitDirection::Up => Placement::Before(anchor),
            SplitDirection::Right | SplitDirection::Down => Placement::After(anchor),
        }
    }
}

impl std::str::FromStr for SplitDirection {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(SplitDirection::Left),
            "right" => Ok(SplitDirection::Right),
            "up" => Ok(SplitDirection::Up),
            "down" => Ok(SplitDirection::Down),
            other => Err(CommandError::invalid_params(format!(
                "Invalid direction: {} (expected left, right, up or down)",
                other
            ))),
        }
    }
}

/// Where a moved surface should land
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDestination {
    Pane(Uuid),
    /// The focused pane of this workspace
    Workspace(Uuid),
    /// The focused pane of this window's selected workspace
    Window(Uuid),
}

/// Full path to a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfacePath {
    pub window: Uuid,
    pub workspace: Uuid,
    pub pane: Uuid,
}

/// Ids of everything a create operation produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Created {
    pub window_id: Uuid,
    pub workspace_id: Uuid,
    pub pane_id: Uuid,
    pub surface_id: Uuid,
}

/// The focused chain, each level optional
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Focused {
    pub window_id: Option<Uuid>,
    pub workspace_id: Option<Uuid>,
    pub pane_id: Option<Uuid>,
    pub surface_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowInfo {
    pub id: Uuid,
    pub index: usize,
    pub focused: bool,
    pub workspace_count: usize,
    pub selected_workspace_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceInfo {
    pub id: Uuid,
    pub index: usize,
    pub title: String,
    pub selected: bool,
    pub window_id: Uuid,
    pub pane_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaneInfo {
    pub id: Uuid,
    pub index: usize,
    pub focused: bool,
    pub surface_count: usize,
    pub selected_surface_id: Option<Uuid>,
    pub workspace_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurfaceInfo {
    pub id: Uuid,
    pub index: usize,
    #[serde(rename = "type")]
    pub kind: SurfaceType,
    pub title: String,
    /// Visible surface of the workspace's focused pane
    pub focused: bool,
    /// Visible surface of its own pane
    pub selected: bool,
    pub pane_id: Uuid,
    pub workspace_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// The live window/workspace/pane/surface tree
#[derive(Debug, Clone, Default)]
pub struct Registry {
    windows: Ordered<Window>,
    focused_window: Option<Uuid>,
    workspace_serial: u64,
}

impl Registry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with one window holding one terminal workspace
    pub fn bootstrap() -> Self {
        let mut registry = Self::new();
        registry.create_window();
        registry
    }

    // ==================== Lookup ====================

    pub fn window(&self, id: Uuid) -> Option<&Window> {
        self.windows.get(id)
    }

    pub fn windows(&self) -> impl Iterator<Item = &Window> {
        self.windows.iter()
    }

    /// Window containing workspace `id`
    pub fn locate_workspace(&self, id: Uuid) -> Option<Uuid> {
        self.windows
            .iter()
            .find(|w| w.contains_workspace(id))
            .map(Window::id)
    }

    /// (window, workspace) containing pane `id`
    pub fn locate_pane(&self, id: Uuid) -> Option<(Uuid, Uuid)> {
        self.windows.iter().find_map(|w| {
            w.workspaces()
                .find(|ws| ws.pane(id).is_some())
                .map(|ws| (w.id(), ws.id()))
        })
    }

    pub fn locate_surface(&self, id: Uuid) -> Option<SurfacePath> {
        self.windows.iter().find_map(|w| {
            w.workspaces().find_map(|ws| {
                ws.pane_of_surface(id).map(|pane| SurfacePath {
                    window: w.id(),
                    workspace: ws.id(),
                    pane,
                })
            })
        })
    }

    pub fn contains_workspace(&self, id: Uuid) -> bool {
        self.locate_workspace(id).is_some()
    }

    pub fn workspace(&self, id: Uuid) -> Option<&Workspace> {
        let window = self.locate_workspace(id)?;
        self.windows.get(window)?.workspace(id)
    }

    fn workspace_mut(&mut self, id: Uuid) -> Result<&mut Workspace> {
        let window = self
            .locate_workspace(id)
            .ok_or_else(|| not_found(EntityKind::Workspace, id))?;
        self.windows
            .get_mut(window)
            .and_then(|w| w.workspace_mut(id))
            .ok_or_else(|| not_found(EntityKind::Workspace, id))
    }

    fn window_mut(&mut self, id: Uuid) -> Result<&mut Window> {
        self.windows
            .get_mut(id)
            .ok_or_else(|| not_found(EntityKind::Window, id))
    }

    pub fn surface(&self, id: Uuid) -> Option<&Surface> {
        let path = self.locate_surface(id)?;
        self.windows
            .get(path.window)?
            .workspace(path.workspace)?
            .pane(path.pane)?
            .surface(id)
    }

    pub fn surface_mut(&mut self, id: Uuid) -> Result<&mut Surface> {
        let path = self
            .locate_surface(id)
            .ok_or_else(|| not_found(EntityKind::Surface, id))?;
        self.windows
            .get_mut(path.window)
            .and_then(|w| w.workspace_mut(path.workspace))
            .and_then(|ws| ws.surface_mut(id))
            .ok_or_else(|| not_found(EntityKind::Surface, id))
    }

    /// Every surface, in global listing order
    pub fn surfaces_mut(&mut self) -> impl Iterator<Item = &mut Surface> {
        self.windows
            .iter_mut()
            .flat_map(|w| w.workspaces_mut())
            .flat_map(|ws| ws.panes_mut())
            .flat_map(|p| p.surfaces_mut())
    }

    // ==================== Current context ====================

    pub fn focused(&self) -> Focused {
        let window_id = self.focused_window;
        let workspace_id = window_id
            .and_then(|id| self.windows.get(id))
            .and_then(Window::selected_workspace_id);
        let workspace = workspace_id.and_then(|id| self.workspace(id));
        Focused {
            window_id,
            workspace_id,
            pane_id: workspace.and_then(Workspace::focused_pane_id),
            surface_id: workspace.and_then(Workspace::focused_surface_id),
        }
    }

    pub fn current_window(&self) -> Result<Uuid> {
        self.focused_window
            .ok_or_else(|| CommandError::not_found("No window"))
    }

    pub fn current_workspace(&self) -> Result<Uuid> {
        self.selected_workspace_in(self.current_window()?)
    }

    pub fn current_pane(&self) -> Result<Uuid> {
        self.focused_pane_in(self.current_workspace()?)
    }

    pub fn current_surface(&self) -> Result<Uuid> {
        let pane = self.current_pane()?;
        let (window, workspace) = self
            .locate_pane(pane)
            .ok_or_else(|| not_found(EntityKind::Pane, pane))?;
        self.windows
            .get(window)
            .and_then(|w| w.workspace(workspace))
            .and_then(|ws| ws.pane(pane))
            .and_then(Pane::selected_surface_id)
            .ok_or_else(|| CommandError::not_found("No surface focused"))
    }

    pub fn selected_workspace_in(&self, window: Uuid) -> Result<Uuid> {
        self.windows
            .get(window)
            .ok_or_else(|| not_found(EntityKind::Window, window))?
            .selected_workspace_id()
            .ok_or_else(|| CommandError::not_found("No workspace selected"))
    }

    pub fn focused_pane_in(&self, workspace: Uuid) -> Result<Uuid> {
        self.workspace(workspace)
            .ok_or_else(|| not_found(EntityKind::Workspace, workspace))?
            .focused_pane_id()
            .ok_or_else(|| CommandError::not_found("No pane focused"))
    }

    // ==================== Resolution ====================

    pub fn resolve_window(&self, handle: Handle) -> Result<Uuid> {
        match handle.expect_kind(EntityKind::Window)? {
            Handle::Id(id) => self
                .windows
                .get(id)
                .map(Window::id)
                .ok_or_else(|| not_found(EntityKind::Window, id)),
            Handle::Ordinal(n) | Handle::Ref { ordinal: n, .. } => self
                .windows
                .id_at(n)
                .ok_or_else(|| index_not_found(EntityKind::Window, n)),
        }
    }

    /// Ordinals count within `window` (default: focused window)
    pub fn resolve_workspace(&self, handle: Handle, window: Option<Uuid>) -> Result<Uuid> {
        match handle.expect_kind(EntityKind::Workspace)? {
            Handle::Id(id) => self
                .contains_workspace(id)
                .then_some(id)
                .ok_or_else(|| not_found(EntityKind::Workspace, id)),
            Handle::Ordinal(n) => {
                let window = match window {
                    Some(id) => id,
                    None => self.current_window()?,
                };
                self.windows
                    .get(window)
                    .ok_or_else(|| not_found(EntityKind::Window, window))?
                    .workspace_ids()
                    .get(n)
                    .copied()
                    .ok_or_else(|| index_not_found(EntityKind::Workspace, n))
            }
            Handle::Ref { ordinal, .. } => self
                .windows
                .iter()
                .flat_map(|w| w.workspace_ids().iter().copied())
                .nth(ordinal)
                .ok_or_else(|| index_not_found(EntityKind::Workspace, ordinal)),
        }
    }

    /// Ordinals count within `workspace` (default: current workspace)
    pub fn resolve_pane(&self, handle: Handle, workspace: Option<Uuid>) -> Result<Uuid> {
        match handle.expect_kind(EntityKind::Pane)? {
            Handle::Id(id) => self
                .locate_pane(id)
                .map(|_| id)
                .ok_or_else(|| not_found(EntityKind::Pane, id)),
            Handle::Ordinal(n) => {
                let workspace = self.scope_workspace(workspace)?;
                workspace
                    .pane_ids()
                    .get(n)
                    .copied()
                    .ok_or_else(|| index_not_found(EntityKind::Pane, n))
            }
            Handle::Ref { ordinal, .. } => self
                .windows
                .iter()
                .flat_map(|w| w.workspaces())
                .flat_map(|ws| ws.pane_ids().iter().copied())
                .nth(ordinal)
                .ok_or_else(|| index_not_found(EntityKind::Pane, ordinal)),
        }
    }

    /// Ordinals count within `workspace` (default: current workspace)
    pub fn resolve_surface(&self, handle: Handle, workspace: Option<Uuid>) -> Result<Uuid> {
        match handle.expect_kind(EntityKind::Surface)? {
            Handle::Id(id) => self
                .locate_surface(id)
                .map(|_| id)
                .ok_or_else(|| not_found(EntityKind::Surface, id)),
            Handle::Ordinal(n) => {
                let workspace = self.scope_workspace(workspace)?;
                workspace
                    .surfaces()
                    .nth(n)
                    .map(|(_, s)| s.id())
                    .ok_or_else(|| index_not_found(EntityKind::Surface, n))
            }
            Handle::Ref { ordinal, .. } => self
                .windows
                .iter()
                .flat_map(|w| w.workspaces())
                .flat_map(|ws| ws.surfaces().map(|(_, s)| s.id()))
                .nth(ordinal)
                .ok_or_else(|| index_not_found(EntityKind::Surface, ordinal)),
        }
    }

    fn scope_workspace(&self, workspace: Option<Uuid>) -> Result<&Workspace> {
        let id = match workspace {
            Some(id) => id,
            None => self.current_workspace()?,
        };
        self.workspace(id)
            .ok_or_else(|| not_found(EntityKind::Workspace, id))
    }

    // ==================== Listings ====================

    pub fn list_windows(&self) -> Vec<WindowInfo> {
        self.windows
            .iter()
            .enumerate()
            .map(|(index, w)| WindowInfo {
                id: w.id(),
                index,
                focused: self.focused_window == Some(w.id()),
                workspace_count: w.workspace_count(),
                selected_workspace_id: w.selected_workspace_id(),
            })
            .collect()
    }

    pub fn list_workspaces(&self, window: Uuid) -> Result<Vec<WorkspaceInfo>> {
        let w = self
            .windows
            .get(window)
            .ok_or_else(|| not_found(EntityKind::Window, window))?;
        Ok(w.workspaces()
            .enumerate()
            .map(|(index, ws)| WorkspaceInfo {
                id: ws.id(),
                index,
                title: ws.title().to_string(),
                selected: w.selected_workspace_id() == Some(ws.id()),
                window_id: window,
                pane_count: ws.pane_count(),
            })
            .collect())
    }

    pub fn list_panes(&self, workspace: Uuid) -> Result<Vec<PaneInfo>> {
        let ws = self
            .workspace(workspace)
            .ok_or_else(|| not_found(EntityKind::Workspace, workspace))?;
        Ok(ws
            .panes()
            .enumerate()
            .map(|(index, p)| PaneInfo {
                id: p.id(),
                index,
                focused: ws.focused_pane_id() == Some(p.id()),
                surface_count: p.surface_count(),
                selected_surface_id: p.selected_surface_id(),
                workspace_id: workspace,
            })
            .collect())
    }

    /// Surfaces of a workspace, indexed across all its panes
    pub fn list_surfaces(&self, workspace: Uuid) -> Result<Vec<SurfaceInfo>> {
        let ws = self
            .workspace(workspace)
            .ok_or_else(|| not_found(EntityKind::Workspace, workspace))?;
        Ok(ws
            .surfaces()
            .enumerate()
            .map(|(index, (pane, surface))| surface_info(ws, pane, surface, index))
            .collect())
    }

    /// Surfaces of one pane, indexed within the pane
    pub fn list_pane_surfaces(&self, pane: Uuid) -> Result<Vec<SurfaceInfo>> {
        let (_, workspace) = self
            .locate_pane(pane)
            .ok_or_else(|| not_found(EntityKind::Pane, pane))?;
        let ws = self
            .workspace(workspace)
            .ok_or_else(|| not_found(EntityKind::Workspace, workspace))?;
        let p = ws.pane(pane).ok_or_else(|| not_found(EntityKind::Pane, pane))?;
        Ok(p.surfaces()
            .enumerate()
            .map(|(index, surface)| surface_info(ws, p, surface, index))
            .collect())
    }

    // ==================== Windows ====================

    fn next_workspace(&mut self, pane: Pane) -> Workspace {
        self.workspace_serial += 1;
        Workspace::new(format!("Workspace {}", self.workspace_serial), pane)
    }

    /// Open a window with one terminal workspace and focus it
    pub fn create_window(&mut self) -> Created {
        let surface = Surface::terminal();
        let surface_id = surface.id();
        let pane = Pane::new(surface);
        let pane_id = pane.id();
        let workspace = self.next_workspace(pane);
        let workspace_id = workspace.id();

        let mut window = Window::new();
        let window_id = window.id();
        window.push_workspace(workspace, true);
        self.windows.push(window);
        self.focused_window = Some(window_id);

        Created {
            window_id,
            workspace_id,
            pane_id,
            surface_id,
        }
    }

    pub fn focus_window(&mut self, id: Uuid) -> Result<()> {
        if !self.windows.contains(id) {
            return Err(not_found(EntityKind::Window, id));
        }
        self.focused_window = Some(id);
        Ok(())
    }

    /// Close a window and everything in it
    pub fn close_window(&mut self, id: Uuid) -> Result<()> {
        let (index, _) = self
            .windows
            .remove(id)
            .ok_or_else(|| not_found(EntityKind::Window, id))?;
        if self.focused_window == Some(id) {
            self.focused_window = self.windows.neighbor_of_removed(index);
        }
        Ok(())
    }

    // ==================== Workspaces ====================

    /// Add a terminal workspace to `window` and select it
    pub fn create_workspace(&mut self, window: Uuid) -> Result<Created> {
        if !self.windows.contains(window) {
            return Err(not_found(EntityKind::Window, window));
        }
        let surface = Surface::terminal();
        let surface_id = surface.id();
        let pane = Pane::new(surface);
        let pane_id = pane.id();
        let workspace = self.next_workspace(pane);
        let workspace_id = workspace.id();
        self.window_mut(window)?.add_workspace(workspace, None, true)?;

        Ok(Created {
            window_id: window,
            workspace_id,
            pane_id,
            surface_id,
        })
    }

    pub fn close_workspace(&mut self, id: Uuid) -> Result<()> {
        let window = self
            .locate_workspace(id)
            .ok_or_else(|| not_found(EntityKind::Workspace, id))?;
        self.window_mut(window)?.take_workspace(id);
        Ok(())
    }

    /// Select a workspace and focus its window
    pub fn select_workspace(&mut self, id: Uuid) -> Result<()> {
        let window = self
            .locate_workspace(id)
            .ok_or_else(|| not_found(EntityKind::Workspace, id))?;
        self.window_mut(window)?.select_workspace(id);
        self.focused_window = Some(window);
        Ok(())
    }

    pub fn rename_workspace(&mut self, id: Uuid, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(CommandError::invalid_params("Title must not be empty"));
        }
        self.workspace_mut(id)?.set_title(title);
        Ok(())
    }

    pub fn cycle_workspace(&mut self, window: Uuid, direction: Cycle) -> Result<Uuid> {
        let id = self
            .window_mut(window)?
            .cycle(direction)
            .ok_or_else(|| CommandError::not_found("No workspace selected"))?;
        self.focused_window = Some(window);
        Ok(id)
    }

    /// Reselect the previously selected workspace of `window`
    pub fn last_workspace(&mut self, window: Uuid) -> Result<Uuid> {
        let last = self
            .windows
            .get(window)
            .ok_or_else(|| not_found(EntityKind::Window, window))?
            .last_selected_workspace_id()
            .ok_or_else(|| CommandError::not_found("No previous workspace"))?;
        self.select_workspace(last)?;
        Ok(last)
    }

    /// Move a workspace to the end of another window
    pub fn move_workspace_to_window(&mut self, id: Uuid, window: Uuid, focus: bool) -> Result<()> {
        let source = self
            .locate_workspace(id)
            .ok_or_else(|| not_found(EntityKind::Workspace, id))?;
        if !self.windows.contains(window) {
            return Err(not_found(EntityKind::Window, window));
        }
        if source != window {
            let workspace = self
                .window_mut(source)?
                .take_workspace(id)
                .ok_or_else(|| not_found(EntityKind::Workspace, id))?;
            self.window_mut(window)?.add_workspace(workspace, None, focus)?;
        }
        if focus {
            self.select_workspace(id)?;
        }
        Ok(())
    }

    pub fn reorder_workspace(&mut self, id: Uuid, placement: Placement, window: Option<Uuid>) -> Result<usize> {
        let located = self
            .locate_workspace(id)
            .ok_or_else(|| not_found(EntityKind::Workspace, id))?;
        if let Some(window) = window {
            if window != located {
                return Err(CommandError::invalid_params(format!(
                    "Workspace {} is not in window {}",
                    id, window
                )));
            }
        }
        self.window_mut(located)?.reorder_workspace(id, placement)
    }

    // ==================== Panes ====================

    /// Focus a pane, selecting its workspace and window
    pub fn focus_pane(&mut self, id: Uuid) -> Result<()> {
        let (window, workspace) = self
            .locate_pane(id)
            .ok_or_else(|| not_found(EntityKind::Pane, id))?;
        self.workspace_mut(workspace)?.focus_pane(id);
        self.window_mut(window)?.select_workspace(workspace);
        self.focused_window = Some(window);
        Ok(())
    }

    pub fn last_pane(&mut self, workspace: Uuid) -> Result<Uuid> {
        let last = self
            .workspace(workspace)
            .ok_or_else(|| not_found(EntityKind::Workspace, workspace))?
            .last_focused_pane_id()
            .ok_or_else(|| CommandError::not_found("No previous pane"))?;
        self.focus_pane(last)?;
        Ok(last)
    }

    /// Split next to `anchor`, creating a pane that shows a new surface
    pub fn create_pane(
        &mut self,
        anchor: Uuid,
        direction: SplitDirection,
        kind: SurfaceType,
        url: Option<String>,
        focus: bool,
    ) -> Result<Created> {
        let (window, workspace) = self
            .locate_pane(anchor)
            .ok_or_else(|| not_found(EntityKind::Pane, anchor))?;
        let surface = Surface::new(kind, url);
        let surface_id = surface.id();
        let pane = Pane::new(surface);
        let pane_id = pane.id();
        self.workspace_mut(workspace)?
            .add_pane(pane, Some(direction.placement(anchor)), focus)?;

        Ok(Created {
            window_id: window,
            workspace_id: workspace,
            pane_id,
            surface_id,
        })
    }

    /// Exchange two panes' slots, possibly across workspaces
    pub fn swap_panes(&mut self, a: Uuid, b: Uuid, focus: bool) -> Result<()> {
        if a == b {
            return Err(CommandError::invalid_params("Cannot swap a pane with itself"));
        }
        let (_, ws_a) = self.locate_pane(a).ok_or_else(|| not_found(EntityKind::Pane, a))?;
        let (_, ws_b) = self.locate_pane(b).ok_or_else(|| not_found(EntityKind::Pane, b))?;

        if ws_a == ws_b {
            self.workspace_mut(ws_a)?.swap_panes(a, b);
        } else {
            let (a_was_focused, index_a, pane_a) = {
                let ws = self.workspace_mut(ws_a)?;
                let was_focused = ws.focused_pane_id() == Some(a);
                let (index, pane) = ws.take_pane(a).ok_or_else(|| not_found(EntityKind::Pane, a))?;
                (was_focused, index, pane)
            };
            let (b_was_focused, index_b, pane_b) = {
                let ws = self.workspace_mut(ws_b)?;
                let was_focused = ws.focused_pane_id() == Some(b);
                let (index, pane) = ws.take_pane(b).ok_or_else(|| not_found(EntityKind::Pane, b))?;
                (was_focused, index, pane)
            };
            {
                let ws = self.workspace_mut(ws_a)?;
                ws.put_pane_at(pane_b, index_a)?;
                if a_was_focused {
                    ws.focus_pane(b);
                }
            }
            let ws = self.workspace_mut(ws_b)?;
            ws.put_pane_at(pane_a, index_b)?;
            if b_was_focused {
                ws.focus_pane(a);
            }
        }

        if focus {
            self.focus_pane(a)?;
        }
        Ok(())
    }

    /// Move a surface out into a new workspace next to its current one
    pub fn break_surface(&mut self, surface: Uuid, focus: bool) -> Result<Created> {
        let path = self
            .locate_surface(surface)
            .ok_or_else(|| not_found(EntityKind::Surface, surface))?;
        let taken = self
            .workspace_mut(path.workspace)?
            .pane_mut(path.pane)
            .and_then(|p| p.take_surface(surface))
            .ok_or_else(|| not_found(EntityKind::Surface, surface))?;

        let pane = Pane::new(taken);
        let pane_id = pane.id();
        let workspace = self.next_workspace(pane);
        let workspace_id = workspace.id();

        let window = self.window_mut(path.window)?;
        window.add_workspace(workspace, Some(Placement::After(path.workspace)), focus)?;
        self.prune(path.window, path.workspace)?;
        if focus {
            self.focused_window = Some(path.window);
        }

        Ok(Created {
            window_id: path.window,
            workspace_id,
            pane_id,
            surface_id: surface,
        })
    }

    // ==================== Surfaces ====================

    /// Focus a surface and every container above it
    pub fn focus_surface(&mut self, id: Uuid) -> Result<()> {
        let path = self
            .locate_surface(id)
            .ok_or_else(|| not_found(EntityKind::Surface, id))?;
        if let Some(pane) = self.workspace_mut(path.workspace)?.pane_mut(path.pane) {
            pane.select_surface(id);
        }
        self.focus_pane(path.pane)
    }

    /// Add a surface to `pane` and make it the visible one
    pub fn create_surface(&mut self, pane: Uuid, kind: SurfaceType, url: Option<String>) -> Result<Uuid> {
        let (_, workspace) = self
            .locate_pane(pane)
            .ok_or_else(|| not_found(EntityKind::Pane, pane))?;
        let surface = Surface::new(kind, url);
        let id = surface.id();
        self.workspace_mut(workspace)?
            .pane_mut(pane)
            .ok_or_else(|| not_found(EntityKind::Pane, pane))?
            .add_surface(surface, None, true)?;
        Ok(id)
    }

    /// Close a surface, collapsing a pane or workspace it leaves empty
    pub fn close_surface(&mut self, id: Uuid) -> Result<()> {
        let path = self
            .locate_surface(id)
            .ok_or_else(|| not_found(EntityKind::Surface, id))?;
        self.workspace_mut(path.workspace)?
            .pane_mut(path.pane)
            .and_then(|p| p.take_surface(id))
            .ok_or_else(|| not_found(EntityKind::Surface, id))?;
        self.prune(path.window, path.workspace)
    }

    /// Move a surface to another pane, workspace or window
    pub fn move_surface(
        &mut self,
        id: Uuid,
        destination: Option<MoveDestination>,
        placement: Option<Placement>,
        focus: bool,
    ) -> Result<()> {
        let source = self
            .locate_surface(id)
            .ok_or_else(|| not_found(EntityKind::Surface, id))?;
        if placement.and_then(|p| p.anchor()) == Some(id) {
            return Err(CommandError::invalid_params(
                "Cannot position a surface relative to itself",
            ));
        }

        let target_pane = match destination {
            Some(MoveDestination::Pane(pane)) => {
                self.locate_pane(pane)
                    .ok_or_else(|| not_found(EntityKind::Pane, pane))?;
                pane
            }
            Some(MoveDestination::Workspace(workspace)) => self.focused_pane_in(workspace)?,
            Some(MoveDestination::Window(window)) => {
                let workspace = self.selected_workspace_in(window)?;
                self.focused_pane_in(workspace)?
            }
            None => match placement.and_then(|p| p.anchor()) {
                Some(anchor) => {
                    self.locate_surface(anchor)
                        .ok_or_else(|| not_found(EntityKind::Surface, anchor))?
                        .pane
                }
                None => {
                    return Err(CommandError::invalid_params(
                        "Move requires a destination pane, workspace, window or anchor surface",
                    ))
                }
            },
        };
        let (_, target_workspace) = self
            .locate_pane(target_pane)
            .ok_or_else(|| not_found(EntityKind::Pane, target_pane))?;

        if let Some(anchor) = placement.and_then(|p| p.anchor()) {
            let in_target = self
                .workspace(target_workspace)
                .and_then(|ws| ws.pane(target_pane))
                .is_some_and(|p| p.contains_surface(anchor));
            if !in_target {
                return Err(CommandError::invalid_params(format!(
                    "Surface {} is not in the destination pane",
                    anchor
                )));
            }
        }

        if target_pane == source.pane {
            if let Some(placement) = placement {
                self.workspace_mut(source.workspace)?
                    .pane_mut(source.pane)
                    .ok_or_else(|| not_found(EntityKind::Pane, source.pane))?
                    .reorder_surface(id, placement)?;
            }
        } else {
            let surface = self
                .workspace_mut(source.workspace)?
                .pane_mut(source.pane)
                .and_then(|p| p.take_surface(id))
                .ok_or_else(|| not_found(EntityKind::Surface, id))?;
            self.workspace_mut(target_workspace)?
                .pane_mut(target_pane)
                .ok_or_else(|| not_found(EntityKind::Pane, target_pane))?
                .add_surface(surface, placement, true)?;
            self.prune(source.window, source.workspace)?;
        }

        if focus {
            self.focus_surface(id)?;
        }
        Ok(())
    }

    pub fn reorder_surface(&mut self, id: Uuid, placement: Placement) -> Result<usize> {
        let path = self
            .locate_surface(id)
            .ok_or_else(|| not_found(EntityKind::Surface, id))?;
        self.workspace_mut(path.workspace)?
            .pane_mut(path.pane)
            .ok_or_else(|| not_found(EntityKind::Pane, path.pane))?
            .reorder_surface(id, placement)
    }

    pub fn reset_flash_counts(&mut self) {
        for surface in self.surfaces_mut() {
            surface.reset_flash_count();
        }
    }

    /// Collapse a pane and workspace emptied by a removal
    fn prune(&mut self, window: Uuid, workspace: Uuid) -> Result<()> {
        let window = self.window_mut(window)?;
        if let Some(ws) = window.workspace_mut(workspace) {
            ws.prune_empty_panes();
        }
        window.prune_empty_workspaces();
        Ok(())
    }
}

fn surface_info(ws: &Workspace, pane: &Pane, surface: &Surface, index: usize) -> SurfaceInfo {
    let selected = pane.selected_surface_id() == Some(surface.id());
    SurfaceInfo {
        id: surface.id(),
        index,
        kind: surface.kind(),
        title: surface.title().to_string(),
        focused: selected && ws.focused_pane_id() == Some(pane.id()),
        selected,
        pane_id: pane.id(),
        workspace_id: ws.id(),
        url: surface.url().map(str::to_string),
    }
}

fn not_found(kind: EntityKind, id: Uuid) -> CommandError {
    CommandError::not_found(format!("{} not found: {}", capitalize(kind), id))
}

fn index_not_found(kind: EntityKind, index: usize) -> CommandError {
    CommandError::not_found(format!("{} index not found: {}", capitalize(kind), index))
}

fn capitalize(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Window => "Window",
        EntityKind::Workspace => "Workspace",
        EntityKind::Pane => "Pane",
        EntityKind::Surface => "Surface",
    }
}
