//! In-memory placement state for one open room.
//!
//! `Layout` is the single owner of the placements of a room. Every mutating
//! operation either applies completely or leaves the layout untouched, and
//! bumps the revision exactly once, so observers never see half of a batch.

use crate::catalog::CatalogItem;
use crate::geometry::Rotation;
use crate::placement::{GroupId, InstanceId, PlacedItem, Placement};
use crate::room::Room;
use crate::validate::{OverlapReporting, ValidationResult, validate, validate_batch, validate_exhaustive};
use kurbo::Point;
use std::collections::BTreeSet;
use thiserror::Error;

/// Layout operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("Placement not found: {0}")]
    NotFound(InstanceId),
    #[error("A group needs at least two distinct placements, got {0}")]
    GroupTooSmall(usize),
    #[error("Placement {0} already exists in this room")]
    DuplicateInstance(InstanceId),
    #[error("No instance ids left in this room")]
    IdsExhausted,
}

/// Result type for layout operations.
pub type LayoutResult<T> = Result<T, LayoutError>;

/// New position and rotation for one placement in a bulk update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reposition {
    pub instance_id: InstanceId,
    pub position: Point,
    pub rotation: Rotation,
}

impl Reposition {
    pub fn new(instance_id: InstanceId, position: Point, rotation: Rotation) -> Self {
        Self {
            instance_id,
            position,
            rotation,
        }
    }
}

/// The placements of one room, in the order they were added.
#[derive(Debug, Clone)]
pub struct Layout {
    items: Vec<PlacedItem>,
    /// Next instance id to hand out. Never decreases; may be one past
    /// `InstanceId::MAX` once every id is used.
    next_instance_id: u64,
    revision: u64,
}

impl Default for Layout {
    fn default() -> Self {
        Self::new()
    }
}

impl Layout {
    /// Create an empty layout.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            next_instance_id: 1,
            revision: 0,
        }
    }

    /// Build a layout from existing items, rejecting duplicate instance ids.
    ///
    /// Groups are taken as stored; a group with a single member is kept but
    /// has no effect.
    pub fn from_items(items: impl IntoIterator<Item = PlacedItem>) -> LayoutResult<Self> {
        let mut layout = Self::new();
        for item in items {
            layout.insert(item)?;
        }
        layout.revision = 0;
        Ok(layout)
    }

    /// Monotonic counter bumped once per applied mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// The id the next [`Layout::add`] will assign.
    pub fn next_instance_id(&self) -> LayoutResult<InstanceId> {
        InstanceId::try_from(self.next_instance_id).map_err(|_| LayoutError::IdsExhausted)
    }

    /// Make sure newly minted ids are greater than `id`.
    pub fn reserve_instance_ids_through(&mut self, id: InstanceId) {
        self.next_instance_id = self.next_instance_id.max(u64::from(id) + 1);
    }

    pub fn items(&self) -> &[PlacedItem] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlacedItem> {
        self.items.iter()
    }

    pub fn get(&self, id: InstanceId) -> Option<&PlacedItem> {
        self.items.iter().find(|i| i.instance_id() == id)
    }

    fn get_mut(&mut self, id: InstanceId) -> LayoutResult<&mut PlacedItem> {
        self.items
            .iter_mut()
            .find(|i| i.instance_id() == id)
            .ok_or(LayoutError::NotFound(id))
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The persisted rows of every placement.
    pub fn placements(&self) -> Vec<Placement> {
        self.items.iter().map(|i| i.placement.clone()).collect()
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    // --- Mutations ---

    /// Place a new instance of `item` at `position`.
    ///
    /// The placement starts unrotated and ungrouped. No validation is done
    /// here; callers decide whether a transient invalid state is acceptable.
    /// Fails with [`LayoutError::IdsExhausted`] once `InstanceId::MAX` is taken.
    pub fn add(&mut self, item: &CatalogItem, position: Point) -> LayoutResult<Placement> {
        let instance_id = self.next_instance_id()?;
        self.next_instance_id += 1;

        let placement = Placement::new(instance_id, item.id, position);
        self.items.push(PlacedItem::from_catalog(placement.clone(), item));
        self.touch();
        Ok(placement)
    }

    /// Insert an item that already carries its instance id (paste, import).
    pub fn insert(&mut self, item: PlacedItem) -> LayoutResult<()> {
        let id = item.instance_id();
        if self.contains(id) {
            return Err(LayoutError::DuplicateInstance(id));
        }
        self.reserve_instance_ids_through(id);
        self.items.push(item);
        self.touch();
        Ok(())
    }

    /// Move a placement's top-left corner.
    pub fn move_to(&mut self, id: InstanceId, position: Point) -> LayoutResult<()> {
        self.get_mut(id)?.placement.position = position;
        self.touch();
        Ok(())
    }

    /// Set a placement's rotation, normalized to a quarter turn.
    pub fn rotate(&mut self, id: InstanceId, degrees: f64) -> LayoutResult<Rotation> {
        let rotation = Rotation::from_degrees(degrees);
        self.get_mut(id)?.placement.rotation = rotation;
        self.touch();
        Ok(rotation)
    }

    /// Replace a placement's custom name and notes.
    pub fn set_details(&mut self, id: InstanceId, custom_name: Option<String>, notes: Option<String>) -> LayoutResult<()> {
        let placement = &mut self.get_mut(id)?.placement;
        placement.custom_name = custom_name;
        placement.notes = notes;
        self.touch();
        Ok(())
    }

    /// Remove a placement. A group left with a single member is disbanded.
    pub fn remove(&mut self, id: InstanceId) -> LayoutResult<PlacedItem> {
        let index = self
            .items
            .iter()
            .position(|i| i.instance_id() == id)
            .ok_or(LayoutError::NotFound(id))?;
        let removed = self.items.remove(index);
        if let Some(group_id) = removed.group_id() {
            self.disband_if_inert(group_id);
        }
        self.touch();
        Ok(removed)
    }

    /// Remove every placement. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let count = self.items.len();
        if count > 0 {
            self.items.clear();
            self.touch();
        }
        count
    }

    /// Put the given placements into a new group.
    ///
    /// Members leave any group they were in before; groups that drop to a
    /// single member as a result are disbanded.
    pub fn group(&mut self, ids: &[InstanceId]) -> LayoutResult<GroupId> {
        let mut members: Vec<InstanceId> = Vec::with_capacity(ids.len());
        for &id in ids {
            if !self.contains(id) {
                return Err(LayoutError::NotFound(id));
            }
            if !members.contains(&id) {
                members.push(id);
            }
        }
        if members.len() < 2 {
            return Err(LayoutError::GroupTooSmall(members.len()));
        }

        let group_id = self.group_ids().last().map_or(1, |max| max + 1);
        let mut previous = BTreeSet::new();
        for item in self.items.iter_mut().filter(|i| members.contains(&i.instance_id())) {
            if let Some(old) = item.placement.group_id.replace(group_id) {
                previous.insert(old);
            }
        }
        for old in previous {
            self.disband_if_inert(old);
        }
        self.touch();
        Ok(group_id)
    }

    /// Clear `group_id` from every placement carrying it.
    ///
    /// Returns the former members; empty (and nothing changes) if no
    /// placement carries the id.
    pub fn ungroup(&mut self, group_id: GroupId) -> Vec<InstanceId> {
        let members = self.clear_group(group_id);
        if !members.is_empty() {
            self.touch();
        }
        members
    }

    /// Apply several position/rotation updates as one step.
    ///
    /// Updates naming an instance that no longer exists are skipped. Returns
    /// the ids that were updated.
    pub fn bulk_reposition(&mut self, updates: &[Reposition]) -> Vec<InstanceId> {
        let mut applied = Vec::new();
        for update in updates {
            if let Some(item) = self.items.iter_mut().find(|i| i.instance_id() == update.instance_id) {
                item.placement.position = update.position;
                item.placement.rotation = update.rotation;
                if !applied.contains(&update.instance_id) {
                    applied.push(update.instance_id);
                }
            }
        }
        if !applied.is_empty() {
            self.touch();
        }
        applied
    }

    fn clear_group(&mut self, group_id: GroupId) -> Vec<InstanceId> {
        let mut members = Vec::new();
        for item in self.items.iter_mut().filter(|i| i.group_id() == Some(group_id)) {
            item.placement.group_id = None;
            members.push(item.instance_id());
        }
        members
    }

    fn disband_if_inert(&mut self, group_id: GroupId) {
        if self.group_members(group_id).len() < 2 {
            self.clear_group(group_id);
        }
    }

    // --- Groups ---

    /// Every group id carried by at least one placement, ascending.
    pub fn group_ids(&self) -> BTreeSet<GroupId> {
        self.items.iter().filter_map(PlacedItem::group_id).collect()
    }

    /// Members of a group, in layout order.
    pub fn group_members(&self, group_id: GroupId) -> Vec<InstanceId> {
        self.items
            .iter()
            .filter(|i| i.group_id() == Some(group_id))
            .map(PlacedItem::instance_id)
            .collect()
    }

    /// The placements that move together with `id`: its whole group, or
    /// just itself when ungrouped.
    pub fn move_set(&self, id: InstanceId) -> LayoutResult<Vec<InstanceId>> {
        let item = self.get(id).ok_or(LayoutError::NotFound(id))?;
        Ok(match item.group_id() {
            Some(group_id) => self.group_members(group_id),
            None => vec![id],
        })
    }

    // --- Validation ---

    /// Validate a placement where it currently stands.
    pub fn validate_item(&self, id: InstanceId, room: &Room) -> LayoutResult<ValidationResult> {
        let item = self.get(id).ok_or(LayoutError::NotFound(id))?;
        Ok(validate(item, room, &self.items))
    }

    /// Validate a placement as if it stood at `position` with `rotation`.
    pub fn preview_move(
        &self,
        id: InstanceId,
        position: Point,
        rotation: Rotation,
        room: &Room,
    ) -> LayoutResult<ValidationResult> {
        let item = self.get(id).ok_or(LayoutError::NotFound(id))?;
        Ok(validate(&item.moved(position, rotation), room, &self.items))
    }

    /// Validate a bulk update against the scene it would produce.
    ///
    /// Unknown ids are skipped, as [`Layout::bulk_reposition`] does.
    pub fn preview_bulk_reposition(
        &self,
        updates: &[Reposition],
        room: &Room,
        reporting: OverlapReporting,
    ) -> Vec<(InstanceId, ValidationResult)> {
        let mut scene = self.items.clone();
        let mut moved = Vec::new();
        for update in updates {
            if let Some(item) = scene.iter_mut().find(|i| i.instance_id() == update.instance_id) {
                item.placement.position = update.position;
                item.placement.rotation = update.rotation;
                moved.retain(|m: &PlacedItem| m.instance_id() != update.instance_id);
                moved.push(item.clone());
            }
        }
        validate_batch(&moved, room, &scene, reporting)
    }

    /// Every placement that currently violates the room rules, with all of
    /// its conflicts.
    pub fn conflicts(&self, room: &Room) -> Vec<(InstanceId, ValidationResult)> {
        self.items
            .iter()
            .map(|item| (item.instance_id(), validate_exhaustive(item, room, &self.items)))
            .filter(|(_, result)| !result.is_valid())
            .collect()
    }
}
