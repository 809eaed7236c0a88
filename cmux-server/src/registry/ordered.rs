//! Ordered child collection shared by every container level

use std::collections::HashMap;

use uuid::Uuid;

use cmux_protocol::CommandError;

/// Anything stored in an [`Ordered`] collection
pub trait Identified {
    fn id(&self) -> Uuid;
}

/// Where to put an entity within its parent's order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Index(usize),
    Before(Uuid),
    After(Uuid),
}

impl Placement {
    /// Build from the three optional reorder targets; exactly one must be set
    pub fn exactly_one(
        index: Option<usize>,
        before: Option<Uuid>,
        after: Option<Uuid>,
    ) -> Result<Self, CommandError> {
        match (index, before, after) {
            (Some(i), None, None) => Ok(Placement::Index(i)),
            (None, Some(id), None) => Ok(Placement::Before(id)),
            (None, None, Some(id)) => Ok(Placement::After(id)),
            _ => Err(CommandError::invalid_params(
                "Exactly one of index, before, after is required",
            )),
        }
    }

    /// Like [`Placement::exactly_one`] but all three may be absent
    pub fn at_most_one(
        index: Option<usize>,
        before: Option<Uuid>,
        after: Option<Uuid>,
    ) -> Result<Option<Self>, CommandError> {
        if index.is_none() && before.is_none() && after.is_none() {
            return Ok(None);
        }
        Self::exactly_one(index, before, after).map(Some)
    }

    /// The sibling this placement is relative to, if any
    pub fn anchor(&self) -> Option<Uuid> {
        match self {
            Placement::Index(_) => None,
            Placement::Before(id) | Placement::After(id) => Some(*id),
        }
    }
}

/// Children keyed by id, with a separate contiguous order
///
/// Ordinals are positions in `order`, so they stay contiguous from 0 across
/// every insert, removal and move.
#[derive(Debug, Clone)]
pub struct Ordered<T> {
    items: HashMap<Uuid, T>,
    order: Vec<Uuid>,
}

impl<T> Default for Ordered<T> {
    fn default() -> Self {
        Self {
            items: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<T: Identified> Ordered<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.items.contains_key(&id)
    }

    pub fn get(&self, id: Uuid) -> Option<&T> {
        self.items.get(&id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut T> {
        self.items.get_mut(&id)
    }

    pub fn ids(&self) -> &[Uuid] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.order.iter().filter_map(|id| self.items.get(id))
    }

    /// Mutable children in order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        let rank: HashMap<Uuid, usize> = self
            .order
            .iter()
            .enumerate()
            .map(|(index, id)| (*id, index))
            .collect();
        let mut items: Vec<&mut T> = self.items.values_mut().collect();
        items.sort_by_key(|item| rank.get(&item.id()).copied());
        items.into_iter()
    }

    pub fn position(&self, id: Uuid) -> Option<usize> {
        self.order.iter().position(|x| *x == id)
    }

    pub fn id_at(&self, index: usize) -> Option<Uuid> {
        self.order.get(index).copied()
    }

    /// Append at the end, returning the new index
    pub fn push(&mut self, item: T) -> usize {
        let id = item.id();
        self.items.insert(id, item);
        self.order.push(id);
        self.order.len() - 1
    }

    /// Insert at `placement` (end when `None`), returning the final index
    pub fn insert(&mut self, item: T, placement: Option<Placement>) -> Result<usize, CommandError> {
        let Some(placement) = placement else {
            return Ok(self.push(item));
        };
        let index = self.insertion_index(placement)?;
        let id = item.id();
        self.items.insert(id, item);
        self.order.insert(index, id);
        Ok(index)
    }

    /// Remove a child, returning it with the index it held
    pub fn remove(&mut self, id: Uuid) -> Option<(usize, T)> {
        let index = self.position(id)?;
        self.order.remove(index);
        self.items.remove(&id).map(|item| (index, item))
    }

    /// Move an existing child to `placement`
    pub fn reorder(&mut self, id: Uuid, placement: Placement) -> Result<usize, CommandError> {
        if placement.anchor() == Some(id) {
            return Err(CommandError::invalid_params(
                "Cannot position an entity relative to itself",
            ));
        }
        let current = self
            .position(id)
            .ok_or_else(|| CommandError::not_found(format!("{} not found", id)))?;
        // Validate before mutating
        if let Some(anchor) = placement.anchor() {
            if !self.contains(anchor) {
                return Err(CommandError::invalid_params(format!(
                    "{} is not a sibling of {}",
                    anchor, id
                )));
            }
        }
        self.order.remove(current);
        let index = match self.insertion_index(placement) {
            Ok(index) => index,
            Err(err) => {
                self.order.insert(current, id);
                return Err(err);
            }
        };
        self.order.insert(index, id);
        Ok(index)
    }

    /// Exchange the positions of two children
    pub fn swap(&mut self, a: Uuid, b: Uuid) -> bool {
        match (self.position(a), self.position(b)) {
            (Some(i), Some(j)) => {
                self.order.swap(i, j);
                true
            }
            _ => false,
        }
    }

    /// The child that should inherit selection after removing index `index`
    pub fn neighbor_of_removed(&self, index: usize) -> Option<Uuid> {
        if self.order.is_empty() {
            None
        } else {
            self.order.get(index.min(self.order.len() - 1)).copied()
        }
    }

    fn insertion_index(&self, placement: Placement) -> Result<usize, CommandError> {
        match placement {
            Placement::Index(i) => Ok(i.min(self.order.len())),
            Placement::Before(anchor) => self.position(anchor).ok_or_else(|| not_sibling(anchor)),
            Placement::After(anchor) => self
                .position(anchor)
                .map(|i| i + 1)
                .ok_or_else(|| not_sibling(anchor)),
        }
    }
}

fn not_sibling(anchor: Uuid) -> CommandError {
    CommandError::invalid_params(format!("{} is not in the target container", anchor))
}
