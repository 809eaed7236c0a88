//! Workspaces (tabs): titled containers of panes

use uuid::Uuid;

use cmux_protocol::CommandError;

use super::ordered::{Identified, Ordered, Placement};
use super::pane::Pane;
use super::surface::Surface;

/// A titled container of panes within a window
#[derive(Debug, Clone)]
pub struct Workspace {
    id: Uuid,
    title: String,
    panes: Ordered<Pane>,
    focused_pane: Option<Uuid>,
    /// Previously focused pane, for `pane.last`
    last_focused_pane: Option<Uuid>,
}

impl Identified for Workspace {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Workspace {
    /// Create a workspace whose only pane is `pane`
    pub fn new(title: impl Into<String>, pane: Pane) -> Self {
        let pane_id = pane.id();
        let mut panes = Ordered::new();
        panes.push(pane);
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            panes,
            focused_pane: Some(pane_id),
            last_focused_pane: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn pane_count(&self) -> usize {
        self.panes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panes.is_empty()
    }

    pub fn focused_pane_id(&self) -> Option<Uuid> {
        self.focused_pane
    }

    pub fn last_focused_pane_id(&self) -> Option<Uuid> {
        self.last_focused_pane
    }

    /// Selected surface of the focused pane
    pub fn focused_surface_id(&self) -> Option<Uuid> {
        self.focused_pane
            .and_then(|id| self.panes.get(id))
            .and_then(Pane::selected_surface_id)
    }

    pub fn pane(&self, id: Uuid) -> Option<&Pane> {
        self.panes.get(id)
    }

    pub fn pane_mut(&mut self, id: Uuid) -> Option<&mut Pane> {
        self.panes.get_mut(id)
    }

    pub fn panes(&self) -> impl Iterator<Item = &Pane> {
        self.panes.iter()
    }

    pub fn panes_mut(&mut self) -> impl Iterator<Item = &mut Pane> {
        self.panes.iter_mut()
    }

    pub fn pane_ids(&self) -> &[Uuid] {
        self.panes.ids()
    }

    /// Surfaces in listing order: panes in order, then surfaces in order
    pub fn surfaces(&self) -> impl Iterator<Item = (&Pane, &Surface)> {
        self.panes
            .iter()
            .flat_map(|pane| pane.surfaces().map(move |s| (pane, s)))
    }

    pub fn pane_of_surface(&self, surface_id: Uuid) -> Option<Uuid> {
        self.panes
            .iter()
            .find(|p| p.contains_surface(surface_id))
            .map(Pane::id)
    }

    pub fn surface_mut(&mut self, surface_id: Uuid) -> Option<&mut Surface> {
        self.panes
            .iter_mut()
            .find_map(|p| p.surface_mut(surface_id))
    }

    pub fn add_pane(&mut self, pane: Pane, placement: Option<Placement>, focus: bool) -> Result<(), CommandError> {
        let id = pane.id();
        self.panes.insert(pane, placement)?;
        if focus || self.focused_pane.is_none() {
            self.focus_pane(id);
        }
        Ok(())
    }

    /// Detach a pane; focus falls to its neighbour
    pub fn take_pane(&mut self, id: Uuid) -> Option<(usize, Pane)> {
        let (index, pane) = self.panes.remove(id)?;
        if self.last_focused_pane == Some(id) {
            self.last_focused_pane = None;
        }
        if self.focused_pane == Some(id) {
            self.focused_pane = self.panes.neighbor_of_removed(index);
        }
        if self.last_focused_pane == self.focused_pane {
            self.last_focused_pane = None;
        }
        Some((index, pane))
    }

    /// Put `pane` where the pane at `index` was (used by swaps)
    pub fn put_pane_at(&mut self, pane: Pane, index: usize) -> Result<(), CommandError> {
        let id = pane.id();
        self.panes.insert(pane, Some(Placement::Index(index)))?;
        if self.focused_pane.is_none() {
            self.focused_pane = Some(id);
        }
        Ok(())
    }

    pub fn focus_pane(&mut self, id: Uuid) -> bool {
        if !self.panes.contains(id) {
            return false;
        }
        if self.focused_pane != Some(id) {
            self.last_focused_pane = self.focused_pane;
            self.focused_pane = Some(id);
        }
        true
    }

    pub fn swap_panes(&mut self, a: Uuid, b: Uuid) -> bool {
        self.panes.swap(a, b)
    }

    /// Drop panes left empty by a surface removal
    pub fn prune_empty_panes(&mut self) {
        let empty: Vec<Uuid> = self
            .panes
            .iter()
            .filter(|p| p.is_empty())
            .map(Pane::id)
            .collect();
        for id in empty {
            self.take_pane(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_focus_tracks_last() {
        let mut ws = Workspace::new("Workspace 1", Pane::new(Surface::terminal()));
        let first = ws.focused_pane_id().unwrap();

        let second = Pane::new(Surface::terminal());
        let second_id = second.id();
        ws.add_pane(second, None, true).unwrap();

        assert_eq!(ws.focused_pane_id(), Some(second_id));
        assert_eq!(ws.last_focused_pane_id(), Some(first));

        // Refocusing the same pane keeps history
        ws.focus_pane(second_id);
        assert_eq!(ws.last_focused_pane_id(), Some(first));
    }

    #[test]
    fn test_surface_listing_order() {
        let mut ws = Workspace::new("w", Pane::new(Surface::terminal()));
        let pane = Pane::new(Surface::terminal());
        ws.add_pane(pane, Some(Placement::Index(0)), false).unwrap();

        let listed: Vec<Uuid> = ws.surfaces().map(|(p, _)| p.id()).collect();
        assert_eq!(listed, ws.pane_ids().to_vec());
    }

    #[test]
    fn test_prune_empty_panes_moves_focus() {
        let mut ws = Workspace::new("w", Pane::new(Surface::terminal()));
        let first = ws.focused_pane_id().unwrap();
        let second = Pane::new(Surface::terminal());
        let second_id = second.id();
        let surface_id = second.selected_surface_id().unwrap();
        ws.add_pane(second, None, true).unwrap();

        ws.pane_mut(second_id).unwrap().take_surface(surface_id);
        ws.prune_empty_panes();

        assert_eq!(ws.pane_count(), 1);
        assert_eq!(ws.focused_pane_id(), Some(first));
        assert_eq!(ws.last_focused_pane_id(), None);
    }
}
