//! Reconciliation between the in-memory layout and persisted placement rows.
//!
//! The adapter remembers what the store last acknowledged and sends only the
//! difference on save, as a single batch. The snapshot moves forward only
//! after the store accepts the batch, so a failed save can simply be retried.

use crate::catalog::CatalogLookup;
use crate::layout::{Layout, LayoutError};
use crate::placement::{InstanceId, PlacedItem, Placement};
use crate::room::RoomId;
use crate::storage::{PlacementStore, StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Row changes that turn one placement set into another.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlacementDelta {
    pub to_insert: Vec<Placement>,
    pub to_update: Vec<Placement>,
    pub to_delete: Vec<InstanceId>,
}

impl PlacementDelta {
    pub fn is_empty(&self) -> bool {
        self.to_insert.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    /// Total number of row changes.
    pub fn len(&self) -> usize {
        self.to_insert.len() + self.to_update.len() + self.to_delete.len()
    }
}

/// Compute the row changes from `previous` to `current`, keyed by instance id.
///
/// Rows are inserted when only `current` has them, deleted when only
/// `previous` has them and updated when any field differs. Each list is in
/// ascending instance id order.
pub fn diff(previous: &[Placement], current: &[Placement]) -> PlacementDelta {
    let before: BTreeMap<InstanceId, &Placement> = previous.iter().map(|p| (p.instance_id, p)).collect();
    let after: BTreeMap<InstanceId, &Placement> = current.iter().map(|p| (p.instance_id, p)).collect();

    let mut delta = PlacementDelta::default();
    for (id, placement) in &after {
        match before.get(id) {
            None => delta.to_insert.push((*placement).clone()),
            Some(old) if old != placement => delta.to_update.push((*placement).clone()),
            Some(_) => {}
        }
    }
    delta.to_delete = before.keys().filter(|id| !after.contains_key(id)).copied().collect();
    delta
}

/// Errors while loading a layout from the store.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Placement {instance_id} references unknown catalog item {catalog_item_id}")]
    UnknownCatalogItem {
        instance_id: InstanceId,
        catalog_item_id: u32,
    },
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// Keeps one room's layout in step with a [`PlacementStore`].
pub struct SyncAdapter<S: PlacementStore> {
    store: Arc<S>,
    room_id: RoomId,
    /// Rows as last acknowledged by the store.
    persisted: Vec<Placement>,
}

impl<S: PlacementStore> SyncAdapter<S> {
    /// An adapter for a room that has nothing persisted yet.
    pub fn new(store: Arc<S>, room_id: RoomId) -> Self {
        Self {
            store,
            room_id,
            persisted: Vec::new(),
        }
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Rows as last acknowledged by the store.
    pub fn persisted(&self) -> &[Placement] {
        &self.persisted
    }

    /// Load the room's rows and build a layout from them.
    ///
    /// Dimensions come from the catalog. New instance ids minted by the
    /// returned layout are above every persisted id.
    pub async fn load(&mut self, catalog: &dyn CatalogLookup) -> Result<Layout, LoadError> {
        let rows = self.store.load_placements(self.room_id).await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            let item = catalog
                .catalog_item(row.catalog_item_id)
                .ok_or(LoadError::UnknownCatalogItem {
                    instance_id: row.instance_id,
                    catalog_item_id: row.catalog_item_id,
                })?;
            items.push(PlacedItem::from_catalog(row.clone(), &item));
        }
        let mut layout = Layout::from_items(items)?;
        if let Some(max) = rows.iter().map(|r| r.instance_id).max() {
            layout.reserve_instance_ids_through(max);
        }

        log::debug!("Loaded {} placements for room {}", rows.len(), self.room_id);
        self.persisted = rows;
        Ok(layout)
    }

    /// Changes that a save would send right now.
    pub fn pending(&self, layout: &Layout) -> PlacementDelta {
        diff(&self.persisted, &layout.placements())
    }

    /// Persist the layout's changes since the last successful save.
    ///
    /// Returns the delta that was sent; an empty delta means the store was not
    /// contacted. On failure the snapshot is unchanged, so calling `save`
    /// again resends the same changes.
    pub async fn save(&mut self, layout: &Layout) -> StorageResult<PlacementDelta> {
        let current = layout.placements();
        let delta = diff(&self.persisted, &current);
        if delta.is_empty() {
            return Ok(delta);
        }

        self.store.save_placements(self.room_id, &delta).await?;
        log::debug!(
            "Saved room {}: {} inserted, {} updated, {} deleted",
            self.room_id,
            delta.to_insert.len(),
            delta.to_update.len(),
            delta.to_delete.len()
        );
        self.persisted = current;
        Ok(delta)
    }

    /// Forget the snapshot so the next save writes every row as an insert.
    ///
    /// Used after the stored rows were removed out of band (room cleared).
    pub fn reset(&mut self) {
        self.persisted.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, CatalogItem};
    use crate::geometry::Rotation;
    use crate::layout::Reposition;
    use crate::room::Room;
    use crate::storage::test_util::block_on;
    use crate::storage::{BoxFuture, MemoryStore, RoomSource};
    use kurbo::Point;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn catalog() -> Catalog {
        [
            CatalogItem::new(1, "SO-01", "Sofa", 200.0, 90.0, 85.0),
            CatalogItem::new(2, "CH-01", "Chair", 90.0, 60.0, 90.0),
        ]
        .into_iter()
        .collect()
    }

    fn store_with_room() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        block_on(store.put_room(&Room::new(1, "Living", 500.0, 400.0).unwrap())).unwrap();
        store
    }

    /// Wraps a memory store and fails saves on demand.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail: AtomicBool,
        saves: AtomicUsize,
    }

    impl PlacementStore for FlakyStore {
        fn load_placements(&self, room_id: RoomId) -> BoxFuture<'_, StorageResult<Vec<Placement>>> {
            self.inner.load_placements(room_id)
        }

        fn save_placements(&self, room_id: RoomId, delta: &PlacementDelta) -> BoxFuture<'_, StorageResult<()>> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Box::pin(async { Err(StorageError::Io("disk full".to_string())) });
            }
            self.inner.save_placements(room_id, delta)
        }

        fn clear_placements(&self, room_id: RoomId) -> BoxFuture<'_, StorageResult<usize>> {
            self.inner.clear_placements(room_id)
        }
    }

    #[test]
    fn test_diff_classifies_rows() {
        let a = Placement::new(1, 1, Point::ZERO);
        let b = Placement::new(2, 1, Point::ZERO);
        let c = Placement::new(3, 2, Point::ZERO);
        let mut b_moved = b.clone();
        b_moved.position = Point::new(5.0, 0.0);

        let delta = diff(&[a.clone(), b], &[b_moved.clone(), c.clone()]);
        assert_eq!(delta.to_insert, vec![c]);
        assert_eq!(delta.to_update, vec![b_moved]);
        assert_eq!(delta.to_delete, vec![1]);
        assert_eq!(delta.len(), 3);
    }

    #[test]
    fn test_diff_detects_any_field_change() {
        let a = Placement::new(1, 1, Point::ZERO);
        let mut renamed = a.clone();
        renamed.notes = Some("by the window".to_string());
        assert_eq!(diff(&[a.clone()], &[renamed]).to_update.len(), 1);

        let mut grouped = a.clone();
        grouped.group_id = Some(1);
        assert_eq!(diff(&[a], &[grouped]).to_update.len(), 1);
    }

    #[test]
    fn test_diff_is_idempotent() {
        let rows = vec![Placement::new(1, 1, Point::ZERO), Placement::new(2, 2, Point::new(1.0, 1.0))];
        let first = diff(&[], &rows);
        assert_eq!(first.to_insert.len(), 2);
        assert!(diff(&rows, &rows).is_empty());
    }

    #[test]
    fn test_first_save_inserts_everything() {
        let store = store_with_room();
        let mut adapter = SyncAdapter::new(store.clone(), 1);
        let mut layout = Layout::new();
        let catalog = catalog();
        layout.add(catalog.get(1).unwrap(), Point::ZERO).unwrap();
        layout.add(catalog.get(2).unwrap(), Point::new(250.0, 0.0)).unwrap();

        let delta = block_on(adapter.save(&layout)).unwrap();
        assert_eq!(delta.to_insert.len(), 2);
        assert!(delta.to_update.is_empty());

        let again = block_on(adapter.save(&layout)).unwrap();
        assert!(again.is_empty());
        assert_eq!(block_on(store.load_placements(1)).unwrap().len(), 2);
    }

    #[test]
    fn test_bulk_reposition_round_trip_yields_one_update() {
        let store = store_with_room();
        let catalog = catalog();
        let mut adapter = SyncAdapter::new(store.clone(), 1);
        let mut layout = Layout::new();
        layout.add(catalog.get(1).unwrap(), Point::ZERO).unwrap();
        layout.add(catalog.get(2).unwrap(), Point::new(250.0, 0.0)).unwrap();
        block_on(adapter.save(&layout)).unwrap();

        let applied = layout.bulk_reposition(&[
            Reposition::new(2, Point::new(300.0, 100.0), Rotation::Deg90),
            Reposition::new(99, Point::ZERO, Rotation::Deg0),
        ]);
        assert_eq!(applied, vec![2]);

        let delta = block_on(adapter.save(&layout)).unwrap();
        assert_eq!(delta.to_update.len(), 1);
        assert_eq!(delta.to_update[0].instance_id, 2);
        assert!(delta.to_insert.is_empty() && delta.to_delete.is_empty());
    }

    #[test]
    fn test_load_seeds_layout_and_id_allocator() {
        let store = store_with_room();
        let rows = PlacementDelta {
            to_insert: vec![Placement::new(4, 1, Point::ZERO), Placement::new(9, 2, Point::new(250.0, 0.0))],
            ..PlacementDelta::default()
        };
        block_on(store.save_placements(1, &rows)).unwrap();

        let mut adapter = SyncAdapter::new(store.clone(), 1);
        let mut layout = block_on(adapter.load(&catalog())).unwrap();
        assert_eq!(layout.len(), 2);
        assert_eq!(layout.get(9).unwrap().catalog_name, "Chair");
        assert!(adapter.pending(&layout).is_empty());

        let added = layout.add(&catalog().catalog_item(2).unwrap(), Point::new(0.0, 200.0)).unwrap();
        assert_eq!(added.instance_id, 10);
    }

    #[test]
    fn test_loaded_max_id_stops_minting() {
        let store = store_with_room();
        let rows = PlacementDelta {
            to_insert: vec![Placement::new(InstanceId::MAX, 2, Point::ZERO)],
            ..PlacementDelta::default()
        };
        block_on(store.save_placements(1, &rows)).unwrap();

        let mut adapter = SyncAdapter::new(store, 1);
        let mut layout = block_on(adapter.load(&catalog())).unwrap();
        let result = layout.add(catalog().get(2).unwrap(), Point::new(0.0, 200.0));
        assert_eq!(result, Err(LayoutError::IdsExhausted));
        assert!(adapter.pending(&layout).is_empty());
    }

    #[test]
    fn test_load_rejects_unknown_catalog_item() {
        let store = store_with_room();
        let rows = PlacementDelta {
            to_insert: vec![Placement::new(1, 42, Point::ZERO)],
            ..PlacementDelta::default()
        };
        block_on(store.save_placements(1, &rows)).unwrap();

        let mut adapter = SyncAdapter::new(store, 1);
        let result = block_on(adapter.load(&catalog()));
        assert!(matches!(
            result,
            Err(LoadError::UnknownCatalogItem {
                instance_id: 1,
                catalog_item_id: 42
            })
        ));
    }

    #[test]
    fn test_failed_save_keeps_state_and_retries() {
        let store = Arc::new(FlakyStore::default());
        block_on(store.inner.put_room(&Room::default())).unwrap();
        let catalog = catalog();
        let mut adapter = SyncAdapter::new(store.clone(), 0);
        let mut layout = Layout::new();
        layout.add(catalog.get(1).unwrap(), Point::ZERO).unwrap();

        store.fail.store(true, Ordering::SeqCst);
        let result = block_on(adapter.save(&layout));
        assert!(matches!(result, Err(StorageError::Io(_))));
        assert_eq!(layout.len(), 1);
        assert!(adapter.persisted().is_empty());

        store.fail.store(false, Ordering::SeqCst);
        let delta = block_on(adapter.save(&layout)).unwrap();
        assert_eq!(delta.to_insert.len(), 1);
        assert_eq!(store.saves.load(Ordering::SeqCst), 2);

        // Nothing left to send: the store is not contacted again.
        block_on(adapter.save(&layout)).unwrap();
        assert_eq!(store.saves.load(Ordering::SeqCst), 2);
    }
}
