//! Application shell: one data directory, its catalog and its rooms.

use kurbo::Point;
use roomplan_core::{
    Catalog, CatalogItem, ConfigError, FileStore, FurnitureType, InstanceId, Placement, PlacementStore, Planner,
    PlannerConfig, PlannerError, PlannerResult, Room, RoomError, RoomId, RoomSource, SharedCatalog, StorageError,
    ValidationResult,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced to the command line.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Planner(#[from] PlannerError),
    #[error(transparent)]
    Room(#[from] RoomError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("No catalog item with code {0}")]
    UnknownCode(String),
}

impl AppError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Planner(PlannerError::Rejected(_)) => 3,
            Self::Storage(StorageError::NotFound(_)) | Self::Planner(PlannerError::Storage(StorageError::NotFound(_))) => 4,
            Self::Config(_) => 78,
            _ => 1,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Catalog usage across every stored room.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageReport {
    pub by_kind: BTreeMap<FurnitureType, usize>,
    /// Most placed catalog items with their counts, most used first.
    pub popular: Vec<(CatalogItem, usize)>,
}

/// Main application struct.
pub struct App {
    config: PlannerConfig,
    store: Arc<FileStore>,
    catalog: Catalog,
}

impl App {
    /// Open the data directory named by `config`, creating it if needed.
    pub fn open(config: PlannerConfig) -> AppResult<Self> {
        let store = FileStore::new(config.resolved_data_dir()?)?;
        let catalog = store.load_catalog()?;
        log::info!(
            "Using data directory {} ({} catalog items)",
            store.base_path().display(),
            catalog.len()
        );
        Ok(Self {
            config,
            store: Arc::new(store),
            catalog,
        })
    }

    pub fn data_dir(&self) -> &Path {
        self.store.base_path()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Add or replace a catalog entry and store the catalog.
    pub fn put_catalog_item(&mut self, item: CatalogItem) -> AppResult<()> {
        if let Some(old) = self.catalog.insert(item) {
            log::info!("Replaced catalog item {} ({})", old.id, old.code);
        }
        self.store.save_catalog(&self.catalog)?;
        Ok(())
    }

    pub fn rooms(&self) -> AppResult<Vec<Room>> {
        Ok(pollster::block_on(self.store.list_rooms())?)
    }

    /// Create a room from the configured template, or rename and resize an
    /// existing one. Stored settings of an existing room are kept.
    pub fn create_room(&self, id: RoomId, name: &str, width: f64, height: f64) -> AppResult<Room> {
        let (mut room, existed) = match pollster::block_on(self.store.get_room(id)) {
            Ok(room) => (room, true),
            Err(StorageError::NotFound(_)) => {
                let mut room = self.config.default_room.clone();
                room.id = id;
                (room, false)
            }
            Err(e) => return Err(e.into()),
        };
        room.name = name.to_string();
        room.resize(width, height)?;
        pollster::block_on(self.store.put_room(&room))?;
        if existed {
            log::info!("Updated room {} ({})", room.id, room.name);
        } else {
            log::info!("Created room {} ({})", room.id, room.name);
        }
        Ok(room)
    }

    pub fn delete_room(&self, id: RoomId) -> AppResult<()> {
        pollster::block_on(self.store.delete_room(id))?;
        log::info!("Deleted room {}", id);
        Ok(())
    }

    /// Start an editing session on a room.
    pub fn session(&self, room_id: RoomId) -> AppResult<Planner<FileStore>> {
        let catalog: SharedCatalog = Arc::new(self.catalog.clone());
        let mut planner = pollster::block_on(Planner::open(self.store.clone(), catalog, room_id))?;
        planner.set_overlap_reporting(self.config.overlap_reporting);
        planner.set_autosave_interval(self.config.autosave_interval());
        Ok(planner)
    }

    /// Run one edit on a room and save it.
    pub fn edit<T>(
        &self,
        room_id: RoomId,
        f: impl FnOnce(&mut Planner<FileStore>) -> PlannerResult<T>,
    ) -> AppResult<T> {
        let mut planner = self.session(room_id)?;
        let value = f(&mut planner)?;
        pollster::block_on(planner.save())?;
        Ok(value)
    }

    /// Place the catalog item with `code` in a room.
    pub fn place(&self, room_id: RoomId, code: &str, position: Point) -> AppResult<InstanceId> {
        let item = self
            .catalog
            .by_code(code)
            .ok_or_else(|| AppError::UnknownCode(code.to_string()))?;
        let item_id = item.id;
        let placement = self.edit(room_id, |planner| planner.drop_item(item_id, position))?;
        Ok(placement.instance_id)
    }

    /// Count placements per furniture type and rank the most placed items.
    pub fn stats(&self, limit: usize) -> AppResult<UsageReport> {
        let mut placements: Vec<Placement> = Vec::new();
        for room in self.rooms()? {
            placements.extend(pollster::block_on(self.store.load_placements(room.id))?);
        }
        log::debug!("Computing usage over {} placements", placements.len());
        Ok(UsageReport {
            by_kind: self.catalog.usage_by_kind(&placements),
            popular: self
                .catalog
                .popular(&placements, limit)
                .into_iter()
                .map(|(item, count)| (item.clone(), count))
                .collect(),
        })
    }

    /// Placements of a room that break its rules.
    pub fn check(&self, room_id: RoomId) -> AppResult<Vec<(InstanceId, ValidationResult)>> {
        Ok(self.session(room_id)?.conflicts())
    }

    /// A room and its placements as pretty JSON.
    pub fn export_json(&self, room_id: RoomId) -> AppResult<String> {
        let planner = self.session(room_id)?;
        let value = serde_json::json!({
            "room": planner.room(),
            "placements": planner.layout().placements(),
        });
        Ok(serde_json::to_string_pretty(&value)?)
    }

    /// Human-readable summary of a room.
    pub fn describe(&self, room_id: RoomId) -> AppResult<String> {
        let planner = self.session(room_id)?;
        let room = planner.room();
        let mut out = format!(
            "Room {}: {} ({} x {} {}, grid {})\n",
            room.id, room.name, room.width, room.height, room.unit, room.grid_size
        );
        for item in planner.layout().iter() {
            let rect = item.rect();
            let group = item.group_id().map(|g| format!(" group {g}")).unwrap_or_default();
            out.push_str(&format!(
                "  #{:<4} {:<24} at ({}, {}) {}x{} rot {}{}\n",
                item.instance_id(),
                item.label(),
                rect.x0,
                rect.y0,
                rect.width(),
                rect.height(),
                item.placement.rotation.degrees(),
                group
            ));
        }
        Ok(out)
    }
}
