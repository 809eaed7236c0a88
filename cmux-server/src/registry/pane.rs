//! Panes: layout slots holding an ordered set of surfaces

use uuid::Uuid;

use cmux_protocol::CommandError;

use super::ordered::{Identified, Ordered, Placement};
use super::surface::Surface;

/// A layout slot inside a workspace
#[derive(Debug, Clone)]
pub struct Pane {
    id: Uuid,
    surfaces: Ordered<Surface>,
    /// The visible surface; always set while the pane is non-empty
    selected_surface: Option<Uuid>,
}

impl Identified for Surface {
    fn id(&self) -> Uuid {
        Surface::id(self)
    }
}

impl Identified for Pane {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Pane {
    /// Create a pane showing `surface`
    pub fn new(surface: Surface) -> Self {
        let mut pane = Self {
            id: Uuid::new_v4(),
            surfaces: Ordered::new(),
            selected_surface: None,
        };
        let surface_id = surface.id();
        pane.surfaces.push(surface);
        pane.selected_surface = Some(surface_id);
        pane
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn selected_surface_id(&self) -> Option<Uuid> {
        self.selected_surface
    }

    pub fn contains_surface(&self, id: Uuid) -> bool {
        self.surfaces.contains(id)
    }

    pub fn surface(&self, id: Uuid) -> Option<&Surface> {
        self.surfaces.get(id)
    }

    pub fn surface_mut(&mut self, id: Uuid) -> Option<&mut Surface> {
        self.surfaces.get_mut(id)
    }

    pub fn surfaces(&self) -> impl Iterator<Item = &Surface> {
        self.surfaces.iter()
    }

    pub fn surfaces_mut(&mut self) -> impl Iterator<Item = &mut Surface> {
        self.surfaces.iter_mut()
    }

    pub fn surface_position(&self, id: Uuid) -> Option<usize> {
        self.surfaces.position(id)
    }

    /// Add a surface, optionally making it the visible one
    pub fn add_surface(
        &mut self,
        surface: Surface,
        placement: Option<Placement>,
        select: bool,
    ) -> Result<(), CommandError> {
        let id = surface.id();
        self.surfaces.insert(surface, placement)?;
        if select || self.selected_surface.is_none() {
            self.selected_surface = Some(id);
        }
        Ok(())
    }

    /// Detach a surface; selection falls to its neighbour
    pub fn take_surface(&mut self, id: Uuid) -> Option<Surface> {
        let (index, surface) = self.surfaces.remove(id)?;
        if self.selected_surface == Some(id) {
            self.selected_surface = self.surfaces.neighbor_of_removed(index);
        }
        Some(surface)
    }

    pub fn select_surface(&mut self, id: Uuid) -> bool {
        if self.surfaces.contains(id) {
            self.selected_surface = Some(id);
            true
        } else {
            false
        }
    }

    pub fn reorder_surface(&mut self, id: Uuid, placement: Placement) -> Result<usize, CommandError> {
        self.surfaces.reorder(id, placement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_follows_removal() {
        let first = Surface::terminal();
        let first_id = first.id();
        let mut pane = Pane::new(first);
        assert_eq!(pane.selected_surface_id(), Some(first_id));

        let second = Surface::terminal();
        let second_id = second.id();
        pane.add_surface(second, None, true).unwrap();
        assert_eq!(pane.selected_surface_id(), Some(second_id));

        pane.take_surface(second_id).unwrap();
        assert_eq!(pane.selected_surface_id(), Some(first_id));

        pane.take_surface(first_id).unwrap();
        assert!(pane.is_empty());
        assert_eq!(pane.selected_surface_id(), None);
    }

    #[test]
    fn test_add_without_select_keeps_selection() {
        let first = Surface::terminal();
        let first_id = first.id();
        let mut pane = Pane::new(first);
        pane.add_surface(Surface::terminal(), Some(Placement::Index(0)), false)
            .unwrap();
        assert_eq!(pane.selected_surface_id(), Some(first_id));
        assert_eq!(pane.surface_position(first_id), Some(1));
    }
}
