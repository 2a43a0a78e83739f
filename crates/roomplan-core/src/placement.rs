//! Placed instances of catalog items.

use crate::catalog::{CatalogItem, CatalogItemId};
use crate::geometry::{BoundingBox, Footprint, Rotation, bounding_box, footprint_rect};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Identifier of a placement, unique within one room.
pub type InstanceId = u32;

/// Identifier shared by all members of a group.
pub type GroupId = u32;

/// One catalog item instance positioned in a room.
///
/// This is the persisted row shape: it references the catalog entry but does
/// not carry its dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub instance_id: InstanceId,
    pub catalog_item_id: CatalogItemId,
    /// Top-left corner in room units.
    pub position: Point,
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Placement {
    /// A fresh, ungrouped, unrotated placement.
    pub fn new(instance_id: InstanceId, catalog_item_id: CatalogItemId, position: Point) -> Self {
        Self {
            instance_id,
            catalog_item_id,
            position,
            rotation: Rotation::Deg0,
            group_id: None,
            custom_name: None,
            notes: None,
        }
    }
}

/// A placement together with the catalog data needed to lay it out.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedItem {
    pub placement: Placement,
    /// Dimensions seeded from the catalog when the item was placed or loaded.
    pub footprint: Footprint,
    /// Catalog name, used when the placement has no custom name.
    pub catalog_name: String,
}

impl PlacedItem {
    pub fn new(placement: Placement, footprint: Footprint, catalog_name: impl Into<String>) -> Self {
        Self {
            placement,
            footprint,
            catalog_name: catalog_name.into(),
        }
    }

    /// Attach a placement row to the catalog entry it references.
    pub fn from_catalog(placement: Placement, item: &CatalogItem) -> Self {
        Self::new(placement, item.footprint(), item.name.clone())
    }

    pub fn instance_id(&self) -> InstanceId {
        self.placement.instance_id
    }

    pub fn group_id(&self) -> Option<GroupId> {
        self.placement.group_id
    }

    /// Name shown to the user: the custom name if set, otherwise the catalog name.
    pub fn label(&self) -> &str {
        self.placement
            .custom_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.catalog_name)
    }

    pub fn bounding_box(&self) -> BoundingBox {
        bounding_box(self.footprint, self.placement.rotation)
    }

    /// Area covered on the floor.
    pub fn rect(&self) -> Rect {
        footprint_rect(self.placement.position, self.bounding_box())
    }

    /// A copy moved to `position` with `rotation`, for what-if checks.
    pub fn moved(&self, position: Point, rotation: Rotation) -> Self {
        let mut item = self.clone();
        item.placement.position = position;
        item.placement.rotation = rotation;
        item
    }
}
