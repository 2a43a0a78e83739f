//! In-memory storage implementation.

use super::{BoxFuture, PlacementStore, RoomRecord, RoomSource, StorageError, StorageResult};
use crate::placement::Placement;
use crate::room::{Room, RoomId};
use crate::sync::PlacementDelta;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// In-memory storage for testing and ephemeral use.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<RoomId, RoomRecord>>,
}

fn lock_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Other(format!("Lock error: {}", e))
}

fn room_not_found(room_id: RoomId) -> StorageError {
    StorageError::NotFound(format!("room {}", room_id))
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlacementStore for MemoryStore {
    fn load_placements(&self, room_id: RoomId) -> BoxFuture<'_, StorageResult<Vec<Placement>>> {
        Box::pin(async move {
            let records = self.records.read().map_err(lock_error)?;
            let record = records.get(&room_id).ok_or_else(|| room_not_found(room_id))?;
            Ok(record.placements.values().cloned().collect())
        })
    }

    fn save_placements(&self, room_id: RoomId, delta: &PlacementDelta) -> BoxFuture<'_, StorageResult<()>> {
        let delta = delta.clone();
        Box::pin(async move {
            let mut records = self.records.write().map_err(lock_error)?;
            let record = records.get_mut(&room_id).ok_or_else(|| room_not_found(room_id))?;
            record.apply(&delta)
        })
    }

    fn clear_placements(&self, room_id: RoomId) -> BoxFuture<'_, StorageResult<usize>> {
        Box::pin(async move {
            let mut records = self.records.write().map_err(lock_error)?;
            let record = records.get_mut(&room_id).ok_or_else(|| room_not_found(room_id))?;
            let count = record.placements.len();
            record.placements.clear();
            Ok(count)
        })
    }
}

impl RoomSource for MemoryStore {
    fn get_room(&self, room_id: RoomId) -> BoxFuture<'_, StorageResult<Room>> {
        Box::pin(async move {
            let records = self.records.read().map_err(lock_error)?;
            records
                .get(&room_id)
                .map(|r| r.room.clone())
                .ok_or_else(|| room_not_found(room_id))
        })
    }

    fn put_room(&self, room: &Room) -> BoxFuture<'_, StorageResult<()>> {
        let room = room.clone();
        Box::pin(async move {
            room.validate()?;
            let mut records = self.records.write().map_err(lock_error)?;
            records
                .entry(room.id)
                .and_modify(|r| r.room = room.clone())
                .or_insert_with(|| RoomRecord::new(room.clone()));
            Ok(())
        })
    }

    fn delete_room(&self, room_id: RoomId) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            let mut records = self.records.write().map_err(lock_error)?;
            records.remove(&room_id).map(|_| ()).ok_or_else(|| room_not_found(room_id))
        })
    }

    fn list_rooms(&self) -> BoxFuture<'_, StorageResult<Vec<Room>>> {
        Box::pin(async move {
            let records = self.records.read().map_err(lock_error)?;
            Ok(records.values().map(|r| r.room.clone()).collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_util::block_on;
    use kurbo::Point;

    fn store_with_room() -> MemoryStore {
        let store = MemoryStore::new();
        block_on(store.put_room(&Room::new(1, "Living", 500.0, 400.0).unwrap())).unwrap();
        store
    }

    #[test]
    fn test_room_round_trip() {
        let store = store_with_room();
        let room = block_on(store.get_room(1)).unwrap();
        assert_eq!(room.name, "Living");
        assert!(matches!(block_on(store.get_room(2)), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_put_room_rejects_invalid() {
        let store = MemoryStore::new();
        let mut room = Room::default();
        room.width = 0.0;
        assert!(matches!(block_on(store.put_room(&room)), Err(StorageError::InvalidRoom(_))));
        assert!(block_on(store.list_rooms()).unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load_placements() {
        let store = store_with_room();
        let delta = PlacementDelta {
            to_insert: vec![Placement::new(2, 1, Point::ZERO), Placement::new(1, 1, Point::new(10.0, 0.0))],
            ..PlacementDelta::default()
        };
        block_on(store.save_placements(1, &delta)).unwrap();

        let rows = block_on(store.load_placements(1)).unwrap();
        assert_eq!(rows.iter().map(|p| p.instance_id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_save_to_unknown_room_fails() {
        let store = MemoryStore::new();
        let result = block_on(store.save_placements(5, &PlacementDelta::default()));
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_put_room_keeps_placements() {
        let store = store_with_room();
        let delta = PlacementDelta {
            to_insert: vec![Placement::new(1, 1, Point::ZERO)],
            ..PlacementDelta::default()
        };
        block_on(store.save_placements(1, &delta)).unwrap();

        let mut room = block_on(store.get_room(1)).unwrap();
        room.prevent_overlap = false;
        block_on(store.put_room(&room)).unwrap();

        assert!(!block_on(store.get_room(1)).unwrap().prevent_overlap);
        assert_eq!(block_on(store.load_placements(1)).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_room_cascades() {
        let store = store_with_room();
        let delta = PlacementDelta {
            to_insert: vec![Placement::new(1, 1, Point::ZERO)],
            ..PlacementDelta::default()
        };
        block_on(store.save_placements(1, &delta)).unwrap();
        block_on(store.delete_room(1)).unwrap();

        assert!(block_on(store.load_placements(1)).is_err());
        assert!(block_on(store.list_rooms()).unwrap().is_empty());
    }

    #[test]
    fn test_clear_placements() {
        let store = store_with_room();
        let delta = PlacementDelta {
            to_insert: vec![Placement::new(1, 1, Point::ZERO), Placement::new(2, 1, Point::ZERO)],
            ..PlacementDelta::default()
        };
        block_on(store.save_placements(1, &delta)).unwrap();
        assert_eq!(block_on(store.clear_placements(1)).unwrap(), 2);
        assert!(block_on(store.load_placements(1)).unwrap().is_empty());
    }
}
