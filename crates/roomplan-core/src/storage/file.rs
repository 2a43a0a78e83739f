//! File-based storage implementation.

use super::{BoxFuture, PlacementStore, RoomRecord, RoomSource, StorageError, StorageResult};
use crate::catalog::Catalog;
use crate::placement::Placement;
use crate::room::{Room, RoomId};
use crate::sync::PlacementDelta;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const ROOM_FILE_PREFIX: &str = "room-";
const CATALOG_FILE: &str = "catalog.json";

/// File-based storage.
///
/// Each room and its placements live in one JSON file, `room-<id>.json`,
/// inside the base directory. Writes go to a temporary file that is renamed
/// over the old one, so a save is either fully visible or not at all.
pub struct FileStore {
    /// Base directory for room files.
    base_path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Create a file store in the given directory, creating it if needed.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                StorageError::Io(format!("Failed to create storage directory: {}", e))
            })?;
        }
        Ok(Self {
            base_path,
            write_lock: Mutex::new(()),
        })
    }

    /// The default storage directory.
    ///
    /// On Unix: `~/.local/share/roomplan/`
    /// On Windows: `%LOCALAPPDATA%\roomplan\`
    pub fn default_path() -> StorageResult<PathBuf> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;
        Ok(base.join("roomplan"))
    }

    /// Create file storage in the default location.
    pub fn default_location() -> StorageResult<Self> {
        Self::new(Self::default_path()?)
    }

    /// Get the base path.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn room_path(&self, room_id: RoomId) -> PathBuf {
        self.base_path.join(format!("{}{}.json", ROOM_FILE_PREFIX, room_id))
    }

    fn read_record(&self, room_id: RoomId) -> StorageResult<RoomRecord> {
        let path = self.room_path(room_id);
        if !path.exists() {
            return Err(StorageError::NotFound(format!("room {}", room_id)));
        }
        let json = fs::read_to_string(&path)
            .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&json)
            .map_err(|e| StorageError::Serialization(format!("Failed to parse {}: {}", path.display(), e)))
    }

    fn write_record(&self, record: &RoomRecord) -> StorageResult<()> {
        let path = self.room_path(record.room.id);
        let json = serde_json::to_string_pretty(record).map_err(|e| StorageError::Serialization(e.to_string()))?;
        write_atomically(&path, &json)
    }

    fn locked(&self) -> StorageResult<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))
    }

    /// Load the catalog kept next to the room files, or an empty one.
    pub fn load_catalog(&self) -> StorageResult<Catalog> {
        let path = self.base_path.join(CATALOG_FILE);
        if !path.exists() {
            return Ok(Catalog::new());
        }
        let json = fs::read_to_string(&path)
            .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&json)
            .map_err(|e| StorageError::Serialization(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Replace the stored catalog.
    pub fn save_catalog(&self, catalog: &Catalog) -> StorageResult<()> {
        let json = serde_json::to_string_pretty(catalog).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let _guard = self.locked()?;
        write_atomically(&self.base_path.join(CATALOG_FILE), &json)
    }
}

fn write_atomically(path: &Path, contents: &str) -> StorageResult<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents)
        .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", tmp.display(), e)))?;
    fs::rename(&tmp, path)
        .map_err(|e| StorageError::Io(format!("Failed to replace {}: {}", path.display(), e)))
}

fn parse_room_file_name(name: &str) -> Option<RoomId> {
    name.strip_prefix(ROOM_FILE_PREFIX)?.strip_suffix(".json")?.parse().ok()
}

impl PlacementStore for FileStore {
    fn load_placements(&self, room_id: RoomId) -> BoxFuture<'_, StorageResult<Vec<Placement>>> {
        Box::pin(async move {
            let record = self.read_record(room_id)?;
            Ok(record.placements.into_values().collect())
        })
    }

    fn save_placements(&self, room_id: RoomId, delta: &PlacementDelta) -> BoxFuture<'_, StorageResult<()>> {
        let delta = delta.clone();
        Box::pin(async move {
            let _guard = self.locked()?;
            let mut record = self.read_record(room_id)?;
            record.apply(&delta)?;
            self.write_record(&record)
        })
    }

    fn clear_placements(&self, room_id: RoomId) -> BoxFuture<'_, StorageResult<usize>> {
        Box::pin(async move {
            let _guard = self.locked()?;
            let mut record = self.read_record(room_id)?;
            let count = record.placements.len();
            if count > 0 {
                record.placements.clear();
                self.write_record(&record)?;
            }
            Ok(count)
        })
    }
}

impl RoomSource for FileStore {
    fn get_room(&self, room_id: RoomId) -> BoxFuture<'_, StorageResult<Room>> {
        Box::pin(async move { Ok(self.read_record(room_id)?.room) })
    }

    fn put_room(&self, room: &Room) -> BoxFuture<'_, StorageResult<()>> {
        let room = room.clone();
        Box::pin(async move {
            room.validate()?;
            let _guard = self.locked()?;
            let record = match self.read_record(room.id) {
                Ok(mut existing) => {
                    existing.room = room;
                    existing
                }
                Err(StorageError::NotFound(_)) => RoomRecord::new(room),
                Err(e) => return Err(e),
            };
            self.write_record(&record)
        })
    }

    fn delete_room(&self, room_id: RoomId) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.room_path(room_id);
        Box::pin(async move {
            let _guard = self.locked()?;
            if !path.exists() {
                return Err(StorageError::NotFound(format!("room {}", room_id)));
            }
            fs::remove_file(&path)
                .map_err(|e| StorageError::Io(format!("Failed to delete {}: {}", path.display(), e)))
        })
    }

    fn list_rooms(&self) -> BoxFuture<'_, StorageResult<Vec<Room>>> {
        Box::pin(async move {
            let entries = fs::read_dir(&self.base_path)
                .map_err(|e| StorageError::Io(format!("Failed to read directory: {}", e)))?;

            let mut ids: Vec<RoomId> = entries
                .flatten()
                .filter_map(|entry| entry.file_name().to_str().and_then(parse_room_file_name))
                .collect();
            ids.sort_unstable();

            ids.into_iter()
                .map(|id| self.read_record(id).map(|r| r.room))
                .collect::<StorageResult<Vec<Room>>>()
        })
    }
}
