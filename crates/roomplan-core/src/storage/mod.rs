//! Storage abstraction for rooms and their placements.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::placement::{InstanceId, Placement};
use crate::room::{Room, RoomError, RoomId};
use crate::sync::PlacementDelta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid room: {0}")]
    InvalidRoom(#[from] RoomError),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async storage operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Persisted placement rows, keyed by room.
///
/// Each call must be atomic: a failed `save_placements` leaves the stored
/// rows exactly as they were.
pub trait PlacementStore: Send + Sync {
    /// All placement rows of a room, ordered by instance id.
    fn load_placements(&self, room_id: RoomId) -> BoxFuture<'_, StorageResult<Vec<Placement>>>;

    /// Apply inserts, updates and deletes for one room as a single unit.
    fn save_placements(&self, room_id: RoomId, delta: &PlacementDelta) -> BoxFuture<'_, StorageResult<()>>;

    /// Delete every placement of a room. Returns how many rows were removed.
    fn clear_placements(&self, room_id: RoomId) -> BoxFuture<'_, StorageResult<usize>>;
}

/// Source of room bounds and policy flags.
pub trait RoomSource: Send + Sync {
    /// Load one room.
    fn get_room(&self, room_id: RoomId) -> BoxFuture<'_, StorageResult<Room>>;

    /// Create or update a room. Existing placements are kept.
    fn put_room(&self, room: &Room) -> BoxFuture<'_, StorageResult<()>>;

    /// Delete a room together with all of its placements.
    fn delete_room(&self, room_id: RoomId) -> BoxFuture<'_, StorageResult<()>>;

    /// All stored rooms, ordered by id.
    fn list_rooms(&self) -> BoxFuture<'_, StorageResult<Vec<Room>>>;
}

/// A room and its placement rows as stored together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomRecord {
    pub room: Room,
    #[serde(with = "placement_rows")]
    pub placements: BTreeMap<InstanceId, Placement>,
}

impl RoomRecord {
    pub fn new(room: Room) -> Self {
        Self {
            room,
            placements: BTreeMap::new(),
        }
    }

    /// Apply a delta, or nothing at all if any part of it does not fit.
    ///
    /// Inserting an existing row is a conflict and updating a missing row is
    /// an error; deleting a missing row is ignored.
    pub fn apply(&mut self, delta: &PlacementDelta) -> StorageResult<()> {
        let room_id = self.room.id;
        if let Some(p) = delta.to_insert.iter().find(|p| self.placements.contains_key(&p.instance_id)) {
            return Err(StorageError::Conflict(format!(
                "placement {} already exists in room {}",
                p.instance_id, room_id
            )));
        }
        if let Some(p) = delta.to_update.iter().find(|p| !self.placements.contains_key(&p.instance_id)) {
            return Err(StorageError::NotFound(format!(
                "placement {} in room {}",
                p.instance_id, room_id
            )));
        }

        for id in &delta.to_delete {
            self.placements.remove(id);
        }
        for placement in delta.to_insert.iter().chain(&delta.to_update) {
            self.placements.insert(placement.instance_id, placement.clone());
        }
        Ok(())
    }
}

/// Rows are stored as a list; the map key is the row's own instance id.
mod placement_rows {
    use crate::placement::{InstanceId, Placement};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(rows: &BTreeMap<InstanceId, Placement>, serializer: S) -> Result<S::Ok, S::Error> {
        let list: Vec<&Placement> = rows.values().collect();
        list.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeMap<InstanceId, Placement>, D::Error> {
        let list = Vec::<Placement>::deserialize(deserializer)?;
        Ok(list.into_iter().map(|p| (p.instance_id, p)).collect())
    }
}
