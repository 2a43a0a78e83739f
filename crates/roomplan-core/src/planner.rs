//! Planner session: one open room, its layout and its persistence.
//!
//! Every edit is checked against the room rules before it is committed, so a
//! rejected edit leaves the layout exactly as it was. Saving is explicit (or
//! periodic via [`Planner::maybe_autosave`]) and a failed save never touches
//! the in-memory layout.

use crate::catalog::{CatalogItemId, CatalogLookup};
use crate::geometry::Rotation;
use crate::layout::{Layout, LayoutError, Reposition};
use crate::placement::{GroupId, InstanceId, PlacedItem, Placement};
use crate::room::{Room, RoomError, RoomId};
use crate::snap::snap_point;
use crate::storage::{PlacementStore, RoomSource, StorageError};
use crate::sync::{LoadError, PlacementDelta, SyncAdapter};
use crate::validate::{OverlapReporting, ValidationResult, validate_with};
use kurbo::Point;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

/// Default auto-save interval in seconds.
pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 30;

/// Errors from planner operations.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("Rejected: {}", .0.messages().join("; "))]
    Rejected(ValidationResult),
    #[error("Unknown catalog item: {0}")]
    UnknownCatalogItem(CatalogItemId),
    #[error("Session is for room {expected}, not room {actual}")]
    WrongRoom { expected: RoomId, actual: RoomId },
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Room(#[from] RoomError),
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Result type for planner operations.
pub type PlannerResult<T> = Result<T, PlannerError>;

/// Shared, read-only catalog handle.
pub type SharedCatalog = Arc<dyn CatalogLookup + Send + Sync>;

/// An editing session over one room.
pub struct Planner<S: PlacementStore + RoomSource> {
    session_id: Uuid,
    room: Room,
    layout: Layout,
    sync: SyncAdapter<S>,
    catalog: SharedCatalog,
    reporting: OverlapReporting,
    /// Layout revision at the last successful save.
    saved_revision: u64,
    autosave_interval: Option<Duration>,
    last_save: Instant,
}

impl<S: PlacementStore + RoomSource> Planner<S> {
    /// Load a room and its placements.
    pub async fn open(store: Arc<S>, catalog: SharedCatalog, room_id: RoomId) -> PlannerResult<Self> {
        let room = store.get_room(room_id).await?;
        let mut sync = SyncAdapter::new(store, room_id);
        let layout = sync.load(catalog.as_ref()).await?;

        let session_id = Uuid::new_v4();
        log::info!(
            "Session {} opened room {} ({}) with {} placements",
            session_id,
            room.id,
            room.name,
            layout.len()
        );

        Ok(Self {
            session_id,
            room,
            saved_revision: layout.revision(),
            layout,
            sync,
            catalog,
            reporting: OverlapReporting::default(),
            autosave_interval: Some(Duration::from_secs(DEFAULT_AUTOSAVE_INTERVAL_SECS)),
            last_save: Instant::now(),
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn overlap_reporting(&self) -> OverlapReporting {
        self.reporting
    }

    pub fn set_overlap_reporting(&mut self, reporting: OverlapReporting) {
        self.reporting = reporting;
    }

    /// Set the auto-save interval; `None` disables auto-save.
    pub fn set_autosave_interval(&mut self, interval: Option<Duration>) {
        self.autosave_interval = interval;
    }

    pub fn autosave_interval(&self) -> Option<Duration> {
        self.autosave_interval
    }

    /// Whether the layout changed since the last successful save.
    pub fn is_dirty(&self) -> bool {
        self.layout.revision() != self.saved_revision
    }

    fn check(&self, candidate: &PlacedItem) -> PlannerResult<()> {
        let result = validate_with(candidate, &self.room, self.layout.items(), self.reporting);
        if result.is_valid() {
            Ok(())
        } else {
            log::warn!(
                "Session {}: placement {} rejected: {}",
                self.session_id,
                candidate.instance_id(),
                result.messages().join("; ")
            );
            Err(PlannerError::Rejected(result))
        }
    }

    fn existing(&self, id: InstanceId) -> PlannerResult<&PlacedItem> {
        self.layout.get(id).ok_or_else(|| {
            log::warn!("Session {}: placement {} not found", self.session_id, id);
            PlannerError::Layout(LayoutError::NotFound(id))
        })
    }

    /// Place a new catalog item, snapped to the grid when the room snaps.
    ///
    /// Nothing is added if the item would be out of bounds or overlap.
    pub fn drop_item(&mut self, catalog_item_id: CatalogItemId, position: Point) -> PlannerResult<Placement> {
        let item = self
            .catalog
            .catalog_item(catalog_item_id)
            .ok_or(PlannerError::UnknownCatalogItem(catalog_item_id))?;
        let position = snap_point(position, &self.room).point;

        let preview = Placement::new(self.layout.next_instance_id()?, item.id, position);
        self.check(&PlacedItem::from_catalog(preview, &item))?;

        let placement = self.layout.add(&item, position)?;
        log::info!(
            "Session {}: placed {} as {} at ({}, {})",
            self.session_id,
            item.name,
            placement.instance_id,
            position.x,
            position.y
        );
        Ok(placement)
    }

    /// Move a placement, keeping its rotation.
    pub fn move_item(&mut self, id: InstanceId, position: Point) -> PlannerResult<()> {
        let item = self.existing(id)?;
        self.check(&item.moved(position, item.placement.rotation))?;
        self.layout.move_to(id, position)?;
        log::info!("Session {}: moved {} to ({}, {})", self.session_id, id, position.x, position.y);
        Ok(())
    }

    /// Rotate a placement to `degrees`, normalized to a quarter turn.
    pub fn rotate_item(&mut self, id: InstanceId, degrees: f64) -> PlannerResult<Rotation> {
        let item = self.existing(id)?;
        let rotation = Rotation::from_degrees(degrees);
        self.check(&item.moved(item.placement.position, rotation))?;
        self.layout.rotate(id, rotation.degrees())?;
        log::info!("Session {}: rotated {} to {}°", self.session_id, id, rotation.degrees());
        Ok(rotation)
    }

    /// Rotate a placement a further quarter turn clockwise.
    pub fn rotate_clockwise(&mut self, id: InstanceId) -> PlannerResult<Rotation> {
        let next = self.existing(id)?.placement.rotation.next();
        self.rotate_item(id, next.degrees())
    }

    /// Commit a drag of several placements as one step.
    ///
    /// Every moved item is validated against the scene the whole batch
    /// produces; if any of them is invalid nothing moves and the first
    /// failure is returned. Unknown ids are skipped.
    pub fn commit_drag(&mut self, updates: &[Reposition]) -> PlannerResult<Vec<InstanceId>> {
        let results = self.layout.preview_bulk_reposition(updates, &self.room, self.reporting);
        if let Some((id, result)) = results.into_iter().find(|(_, r)| !r.is_valid()) {
            log::warn!(
                "Session {}: drag rejected at {}: {}",
                self.session_id,
                id,
                result.messages().join("; ")
            );
            return Err(PlannerError::Rejected(result));
        }

        let applied = self.layout.bulk_reposition(updates);
        if applied.len() < updates.len() {
            log::warn!(
                "Session {}: drag skipped {} unknown placements",
                self.session_id,
                updates.len() - applied.len()
            );
        }
        log::info!("Session {}: repositioned {:?}", self.session_id, applied);
        Ok(applied)
    }

    /// Replace a placement's custom name and notes.
    pub fn set_details(&mut self, id: InstanceId, custom_name: Option<String>, notes: Option<String>) -> PlannerResult<()> {
        self.existing(id)?;
        self.layout.set_details(id, custom_name, notes)?;
        Ok(())
    }

    pub fn remove_item(&mut self, id: InstanceId) -> PlannerResult<PlacedItem> {
        self.existing(id)?;
        let removed = self.layout.remove(id)?;
        log::info!("Session {}: removed {} ({})", self.session_id, id, removed.label());
        Ok(removed)
    }

    pub fn group(&mut self, ids: &[InstanceId]) -> PlannerResult<GroupId> {
        match self.layout.group(ids) {
            Ok(group_id) => {
                log::info!("Session {}: grouped {:?} as {}", self.session_id, ids, group_id);
                Ok(group_id)
            }
            Err(e) => {
                log::warn!("Session {}: cannot group {:?}: {}", self.session_id, ids, e);
                Err(e.into())
            }
        }
    }

    /// Dissolve a group. Returns its former members; empty for an unknown id.
    pub fn ungroup(&mut self, group_id: GroupId) -> Vec<InstanceId> {
        let members = self.layout.ungroup(group_id);
        if members.is_empty() {
            log::warn!("Session {}: group {} not found", self.session_id, group_id);
        } else {
            log::info!("Session {}: ungrouped {}", self.session_id, group_id);
        }
        members
    }

    /// Remove every placement from the room. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let count = self.layout.clear();
        log::info!("Session {}: cleared {} placements", self.session_id, count);
        count
    }

    /// Placements that currently break the room rules.
    pub fn conflicts(&self) -> Vec<(InstanceId, ValidationResult)> {
        self.layout.conflicts(&self.room)
    }

    /// Change room settings and store them.
    ///
    /// Existing placements are kept even if they no longer fit; use
    /// [`Planner::conflicts`] to find them. The room id cannot change.
    pub async fn update_room(&mut self, room: Room) -> PlannerResult<()> {
        let expected = self.sync.room_id();
        if room.id != expected {
            log::warn!("Session {}: refusing settings for room {}", self.session_id, room.id);
            return Err(PlannerError::WrongRoom {
                expected,
                actual: room.id,
            });
        }
        room.validate()?;
        self.sync.store().put_room(&room).await?;
        self.room = room;
        log::info!("Session {}: room {} updated", self.session_id, self.room.id);
        Ok(())
    }

    /// Persist the changes since the last successful save.
    pub async fn save(&mut self) -> PlannerResult<PlacementDelta> {
        let revision = self.layout.revision();
        match self.sync.save(&self.layout).await {
            Ok(delta) => {
                self.saved_revision = revision;
                self.last_save = Instant::now();
                if !delta.is_empty() {
                    log::info!(
                        "Session {}: saved room {} ({} changes)",
                        self.session_id,
                        self.room.id,
                        delta.len()
                    );
                }
                Ok(delta)
            }
            Err(e) => {
                log::error!("Session {}: failed to save room {}: {}", self.session_id, self.room.id, e);
                Err(e.into())
            }
        }
    }

    /// Whether enough time has passed since the last save to save again.
    pub fn autosave_due(&self) -> bool {
        match self.autosave_interval {
            Some(interval) => self.is_dirty() && self.last_save.elapsed() >= interval,
            None => false,
        }
    }

    /// Save if auto-save is due. Returns `None` when nothing was attempted.
    pub async fn maybe_autosave(&mut self) -> PlannerResult<Option<PlacementDelta>> {
        if !self.autosave_due() {
            return Ok(None);
        }
        log::debug!("Session {}: auto-saving", self.session_id);
        self.save().await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, CatalogItem};
    use crate::storage::test_util::block_on;
    use crate::storage::{BoxFuture, MemoryStore, StorageResult};
    use crate::validate::ValidationError;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn catalog() -> SharedCatalog {
        let catalog: Catalog = [
            CatalogItem::new(1, "SO-01", "Sofa", 200.0, 90.0, 85.0),
            CatalogItem::new(2, "CH-01", "Chair", 90.0, 60.0, 90.0),
        ]
        .into_iter()
        .collect();
        Arc::new(catalog)
    }

    fn open() -> (Arc<MemoryStore>, Planner<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        block_on(store.put_room(&Room::new(1, "Living", 500.0, 400.0).unwrap())).unwrap();
        let planner = block_on(Planner::open(store.clone(), catalog(), 1)).unwrap();
        (store, planner)
    }

    #[test]
    fn test_open_unknown_room() {
        let store = Arc::new(MemoryStore::new());
        let result = block_on(Planner::open(store, catalog(), 9));
        assert!(matches!(result, Err(PlannerError::Storage(StorageError::NotFound(_)))));
    }

    #[test]
    fn test_drop_snaps_to_grid() {
        let (_, mut planner) = open();
        let placement = planner.drop_item(1, Point::new(12.0, 7.0)).unwrap();
        assert_eq!(placement.position, Point::new(10.0, 10.0));
        assert!(planner.is_dirty());
    }

    #[test]
    fn test_drop_rejected_leaves_layout_untouched() {
        let (_, mut planner) = open();
        planner.drop_item(1, Point::ZERO).unwrap();
        let revision = planner.layout().revision();

        let err = planner.drop_item(2, Point::new(50.0, 50.0)).unwrap_err();
        match err {
            PlannerError::Rejected(result) => {
                assert_eq!(
                    result.errors,
                    vec![ValidationError::Overlap {
                        instance_id: 1,
                        label: "Sofa".to_string()
                    }]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(planner.layout().len(), 1);
        assert_eq!(planner.layout().revision(), revision);

        let chair = planner.drop_item(2, Point::new(210.0, 0.0)).unwrap();
        assert_eq!(chair.instance_id, 2);
    }

    #[test]
    fn test_drop_unknown_catalog_item() {
        let (_, mut planner) = open();
        assert!(matches!(
            planner.drop_item(77, Point::ZERO),
            Err(PlannerError::UnknownCatalogItem(77))
        ));
    }

    #[test]
    fn test_move_and_rotate_validate_first() {
        let (_, mut planner) = open();
        planner.drop_item(1, Point::ZERO).unwrap();
        planner.drop_item(2, Point::new(300.0, 0.0)).unwrap();

        assert!(matches!(planner.move_item(2, Point::new(450.0, 0.0)), Err(PlannerError::Rejected(_))));
        assert_eq!(planner.layout().get(2).unwrap().placement.position, Point::new(300.0, 0.0));

        planner.move_item(2, Point::new(400.0, 330.0)).unwrap();
        // Turned 90° the chair needs 60 x 90 and no longer fits below y = 400.
        assert!(matches!(planner.rotate_item(2, 90.0), Err(PlannerError::Rejected(_))));
        assert_eq!(planner.layout().get(2).unwrap().placement.rotation, Rotation::Deg0);

        assert_eq!(planner.rotate_item(1, 178.0).unwrap(), Rotation::Deg180);
        assert_eq!(planner.rotate_clockwise(1).unwrap(), Rotation::Deg270);
        assert!(matches!(
            planner.move_item(9, Point::ZERO),
            Err(PlannerError::Layout(LayoutError::NotFound(9)))
        ));
    }

    #[test]
    fn test_commit_drag_moves_group_together() {
        let (_, mut planner) = open();
        planner.drop_item(2, Point::ZERO).unwrap();
        planner.drop_item(2, Point::new(100.0, 0.0)).unwrap();
        planner.group(&[1, 2]).unwrap();

        let applied = planner
            .commit_drag(&[
                Reposition::new(1, Point::new(0.0, 200.0), Rotation::Deg0),
                Reposition::new(2, Point::new(100.0, 200.0), Rotation::Deg0),
            ])
            .unwrap();
        assert_eq!(applied, vec![1, 2]);

        // Second member would leave the room: nothing moves.
        let before = planner.layout().placements();
        let result = planner.commit_drag(&[
            Reposition::new(1, Point::new(300.0, 200.0), Rotation::Deg0),
            Reposition::new(2, Point::new(450.0, 200.0), Rotation::Deg0),
        ]);
        match result {
            Err(PlannerError::Rejected(r)) => assert_eq!(r.errors, vec![ValidationError::OutOfBounds]),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(planner.layout().placements(), before);
    }

    #[test]
    fn test_save_round_trip_and_dirty_flag() {
        let (store, mut planner) = open();
        planner.drop_item(1, Point::ZERO).unwrap();
        planner.drop_item(2, Point::new(250.0, 0.0)).unwrap();
        planner.set_details(2, Some("Reading chair".to_string()), None).unwrap();

        let delta = block_on(planner.save()).unwrap();
        assert_eq!(delta.to_insert.len(), 2);
        assert!(!planner.is_dirty());
        assert!(block_on(planner.save()).unwrap().is_empty());

        planner.remove_item(1).unwrap();
        let delta = block_on(planner.save()).unwrap();
        assert_eq!(delta.to_delete, vec![1]);

        let reopened = block_on(Planner::open(store, catalog(), 1)).unwrap();
        assert_eq!(reopened.layout().len(), 1);
        assert_eq!(reopened.layout().get(2).unwrap().label(), "Reading chair");
        assert!(!reopened.is_dirty());
    }

    #[test]
    fn test_clear_then_save_deletes_rows() {
        let (store, mut planner) = open();
        planner.drop_item(1, Point::ZERO).unwrap();
        planner.drop_item(2, Point::new(250.0, 0.0)).unwrap();
        block_on(planner.save()).unwrap();

        assert_eq!(planner.clear(), 2);
        let delta = block_on(planner.save()).unwrap();
        assert_eq!(delta.to_delete, vec![1, 2]);
        assert!(block_on(store.load_placements(1)).unwrap().is_empty());

        // Ids keep increasing after a clear.
        assert_eq!(planner.drop_item(2, Point::ZERO).unwrap().instance_id, 3);
    }

    #[test]
    fn test_ungroup_unknown_returns_empty() {
        let (_, mut planner) = open();
        assert!(planner.ungroup(4).is_empty());
        assert!(!planner.is_dirty());
    }

    #[test]
    fn test_update_room_reports_new_conflicts() {
        let (store, mut planner) = open();
        planner.drop_item(1, Point::new(250.0, 0.0)).unwrap();
        assert!(planner.conflicts().is_empty());

        let mut smaller = planner.room().clone();
        smaller.width = 300.0;
        block_on(planner.update_room(smaller)).unwrap();
        assert_eq!(planner.conflicts().len(), 1);
        assert_eq!(block_on(store.get_room(1)).unwrap().width, 300.0);

        let mut broken = planner.room().clone();
        broken.height = -1.0;
        assert!(matches!(block_on(planner.update_room(broken)), Err(PlannerError::Room(_))));
        assert_eq!(planner.room().height, 400.0);
    }

    #[test]
    fn test_update_room_keeps_room_id() {
        let (store, mut planner) = open();
        let mut other = planner.room().clone();
        other.id = 2;
        other.width = 100.0;

        let result = block_on(planner.update_room(other));
        assert!(matches!(result, Err(PlannerError::WrongRoom { expected: 1, actual: 2 })));
        assert_eq!(planner.room().id, 1);
        assert_eq!(planner.room().width, 500.0);
        assert_eq!(block_on(store.list_rooms()).unwrap().len(), 1);
    }

    #[test]
    fn test_autosave_only_when_due() {
        let (_, mut planner) = open();
        assert!(block_on(planner.maybe_autosave()).unwrap().is_none());

        planner.drop_item(1, Point::ZERO).unwrap();
        assert!(!planner.autosave_due());

        planner.set_autosave_interval(Some(Duration::ZERO));
        let delta = block_on(planner.maybe_autosave()).unwrap();
        assert_eq!(delta.map(|d| d.to_insert.len()), Some(1));

        planner.set_autosave_interval(None);
        planner.drop_item(2, Point::new(250.0, 0.0)).unwrap();
        assert!(!planner.autosave_due());
    }

    /// Store whose placement writes can be switched off.
    #[derive(Default)]
    struct ReadOnlyStore {
        inner: MemoryStore,
        read_only: AtomicBool,
    }

    impl PlacementStore for ReadOnlyStore {
        fn load_placements(&self, room_id: RoomId) -> BoxFuture<'_, StorageResult<Vec<Placement>>> {
            self.inner.load_placements(room_id)
        }

        fn save_placements(&self, room_id: RoomId, delta: &PlacementDelta) -> BoxFuture<'_, StorageResult<()>> {
            if self.read_only.load(Ordering::SeqCst) {
                return Box::pin(async { Err(StorageError::Other("read-only".to_string())) });
            }
            self.inner.save_placements(room_id, delta)
        }

        fn clear_placements(&self, room_id: RoomId) -> BoxFuture<'_, StorageResult<usize>> {
            self.inner.clear_placements(room_id)
        }
    }

    impl RoomSource for ReadOnlyStore {
        fn get_room(&self, room_id: RoomId) -> BoxFuture<'_, StorageResult<Room>> {
            self.inner.get_room(room_id)
        }

        fn put_room(&self, room: &Room) -> BoxFuture<'_, StorageResult<()>> {
            self.inner.put_room(room)
        }

        fn delete_room(&self, room_id: RoomId) -> BoxFuture<'_, StorageResult<()>> {
            self.inner.delete_room(room_id)
        }

        fn list_rooms(&self) -> BoxFuture<'_, StorageResult<Vec<Room>>> {
            self.inner.list_rooms()
        }
    }

    #[test]
    fn test_failed_save_keeps_edits() {
        let store = Arc::new(ReadOnlyStore::default());
        block_on(store.put_room(&Room::default())).unwrap();
        let mut planner = block_on(Planner::open(store.clone(), catalog(), 0)).unwrap();
        planner.drop_item(1, Point::ZERO).unwrap();

        store.read_only.store(true, Ordering::SeqCst);
        assert!(matches!(block_on(planner.save()), Err(PlannerError::Storage(_))));
        assert!(planner.is_dirty());
        assert_eq!(planner.layout().len(), 1);

        store.read_only.store(false, Ordering::SeqCst);
        assert_eq!(block_on(planner.save()).unwrap().to_insert.len(), 1);
        assert!(!planner.is_dirty());
    }
}
