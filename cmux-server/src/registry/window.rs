//! Windows: top-level containers of workspaces

use uuid::Uuid;

use cmux_protocol::CommandError;

use super::ordered::{Identified, Ordered, Placement};
use super::workspace::Workspace;

/// A top-level window
#[derive(Debug, Clone)]
pub struct Window {
    id: Uuid,
    workspaces: Ordered<Workspace>,
    /// Always set while the window has workspaces
    selected_workspace: Option<Uuid>,
    /// Previously selected workspace, for `workspace.last`
    last_selected_workspace: Option<Uuid>,
}

impl Identified for Window {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// Direction for cycling through workspaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    Next,
    Previous,
}

impl Window {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            workspaces: Ordered::new(),
            selected_workspace: None,
            last_selected_workspace: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn workspace_count(&self) -> usize {
        self.workspaces.len()
    }

    pub fn selected_workspace_id(&self) -> Option<Uuid> {
        self.selected_workspace
    }

    pub fn last_selected_workspace_id(&self) -> Option<Uuid> {
        self.last_selected_workspace
    }

    pub fn contains_workspace(&self, id: Uuid) -> bool {
        self.workspaces.contains(id)
    }

    pub fn workspace(&self, id: Uuid) -> Option<&Workspace> {
        self.workspaces.get(id)
    }

    pub fn workspace_mut(&mut self, id: Uuid) -> Option<&mut Workspace> {
        self.workspaces.get_mut(id)
    }

    pub fn workspaces(&self) -> impl Iterator<Item = &Workspace> {
        self.workspaces.iter()
    }

    pub fn workspaces_mut(&mut self) -> impl Iterator<Item = &mut Workspace> {
        self.workspaces.iter_mut()
    }

    pub fn workspace_ids(&self) -> &[Uuid] {
        self.workspaces.ids()
    }

    pub fn add_workspace(
        &mut self,
        workspace: Workspace,
        placement: Option<Placement>,
        select: bool,
    ) -> Result<(), CommandError> {
        let id = workspace.id();
        self.workspaces.insert(workspace, placement)?;
        self.adopt_selection(id, select);
        Ok(())
    }

    /// Append a workspace at the end of the window
    pub fn push_workspace(&mut self, workspace: Workspace, select: bool) {
        let id = workspace.id();
        self.workspaces.push(workspace);
        self.adopt_selection(id, select);
    }

    fn adopt_selection(&mut self, id: Uuid, select: bool) {
        if select || self.selected_workspace.is_none() {
            self.select_workspace(id);
        }
    }

    /// Detach a workspace; selection falls to its neighbour
    pub fn take_workspace(&mut self, id: Uuid) -> Option<Workspace> {
        let (index, workspace) = self.workspaces.remove(id)?;
        if self.last_selected_workspace == Some(id) {
            self.last_selected_workspace = None;
        }
        if self.selected_workspace == Some(id) {
            self.selected_workspace = self.workspaces.neighbor_of_removed(index);
        }
        if self.last_selected_workspace == self.selected_workspace {
            self.last_selected_workspace = None;
        }
        Some(workspace)
    }

    pub fn select_workspace(&mut self, id: Uuid) -> bool {
        if !self.workspaces.contains(id) {
            return false;
        }
        if self.selected_workspace != Some(id) {
            self.last_selected_workspace = self.selected_workspace;
            self.selected_workspace = Some(id);
        }
        true
    }

    /// Select the neighbour of the current workspace, wrapping around
    pub fn cycle(&mut self, direction: Cycle) -> Option<Uuid> {
        let len = self.workspaces.len();
        let current = self
            .selected_workspace
            .and_then(|id| self.workspaces.position(id))?;
        let next = match direction {
            Cycle::Next => (current + 1) % len,
            Cycle::Previous => (current + len - 1) % len,
        };
        let id = self.workspaces.id_at(next)?;
        self.select_workspace(id);
        Some(id)
    }

    pub fn reorder_workspace(&mut self, id: Uuid, placement: Placement) -> Result<usize, CommandError> {
        self.workspaces.reorder(id, placement)
    }

    /// Drop workspaces left without panes
    pub fn prune_empty_workspaces(&mut self) -> Vec<Uuid> {
        let empty: Vec<Uuid> = self
            .workspaces
            .iter()
            .filter(|w| w.is_empty())
            .map(Workspace::id)
            .collect();
        for id in &empty {
            self.take_workspace(*id);
        }
        empty
    }
}

impl Default for Window {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Pane, Surface};

    fn workspace(title: &str) -> Workspace {
        Workspace::new(title, Pane::new(Surface::terminal()))
    }

    #[test]
    fn test_cycle_wraps() {
        let mut window = Window::new();
        let a = workspace("a");
        let a_id = a.id();
        let b = workspace("b");
        let b_id = b.id();
        window.add_workspace(a, None, true).unwrap();
        window.add_workspace(b, None, true).unwrap();

        assert_eq!(window.cycle(Cycle::Next), Some(a_id));
        assert_eq!(window.cycle(Cycle::Previous), Some(b_id));
        assert_eq!(window.last_selected_workspace_id(), Some(a_id));
    }

    #[test]
    fn test_push_workspace_appends_and_selects() {
        let mut window = Window::new();
        let a = workspace("a");
        let a_id = a.id();
        let b = workspace("b");
        let b_id = b.id();
        window.push_workspace(a, false);
        assert_eq!(window.selected_workspace_id(), Some(a_id));
        window.push_workspace(b, false);
        assert_eq!(window.selected_workspace_id(), Some(a_id));
        assert_eq!(window.workspace_ids(), &[a_id, b_id]);
    }

    #[test]
    fn test_exactly_one_selected_after_removal() {
        let mut window = Window::new();
        let ids: Vec<Uuid> = (0..3)
            .map(|i| {
                let ws = workspace(&format!("w{}", i));
                let id = ws.id();
                window.add_workspace(ws, None, false).unwrap();
                id
            })
            .collect();
        assert_eq!(window.selected_workspace_id(), Some(ids[0]));

        window.take_workspace(ids[0]);
        assert_eq!(window.selected_workspace_id(), Some(ids[1]));
        window.take_workspace(ids[1]);
        window.take_workspace(ids[2]);
        assert_eq!(window.selected_workspace_id(), None);
        assert_eq!(window.cycle(Cycle::Next), None);
    }
}
