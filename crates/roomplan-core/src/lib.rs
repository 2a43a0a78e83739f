//! RoomPlan Core Library
//!
//! Furniture placement in bounded rooms: geometry, validation, layout state
//! and its persistence.

pub mod catalog;
pub mod config;
pub mod geometry;
pub mod input;
pub mod layout;
pub mod placement;
pub mod planner;
pub mod room;
pub mod snap;
pub mod storage;
pub mod sync;
pub mod validate;

pub use catalog::{Catalog, CatalogItem, CatalogItemId, CatalogLookup, DEFAULT_POPULAR_LIMIT, FurnitureType};
pub use config::{ConfigError, PlannerConfig};
pub use geometry::{BoundingBox, Footprint, Rotation, bounding_box, footprint_rect, overlaps};
pub use input::{CommandOutcome, DragGesture, Modifiers, PlannerCommand, Shortcut, ShortcutRegistry, execute};
pub use layout::{Layout, LayoutError, LayoutResult, Reposition};
pub use placement::{GroupId, InstanceId, PlacedItem, Placement};
pub use planner::{Planner, PlannerError, PlannerResult, SharedCatalog};
pub use room::{Room, RoomError, RoomId};
pub use snap::{SnapResult, snap_point, snap_to_grid};
pub use storage::{FileStore, MemoryStore, PlacementStore, RoomSource, StorageError, StorageResult};
pub use sync::{LoadError, PlacementDelta, SyncAdapter, diff};
pub use validate::{OverlapReporting, ValidationError, ValidationResult, validate, validate_batch, validate_exhaustive, validate_with};
