//! Room bounds and layout policy.

use kurbo::Rect;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a stored room plan.
pub type RoomId = u32;

/// Invalid room settings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoomError {
    #[error("Room width must be positive, got {0}")]
    InvalidWidth(f64),
    #[error("Room height must be positive, got {0}")]
    InvalidHeight(f64),
    #[error("Grid size must be positive, got {0}")]
    InvalidGridSize(u32),
}

/// A bounded floor area that placements are arranged in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Extent along the x axis.
    pub width: f64,
    /// Extent along the y axis.
    pub height: f64,
    /// Measurement unit for all lengths in this room.
    #[serde(default = "default_unit")]
    pub unit: String,
    /// Grid spacing in room units.
    #[serde(default = "default_grid_size")]
    pub grid_size: u32,
    #[serde(default = "default_true")]
    pub show_grid: bool,
    /// Reject placements whose footprints intersect.
    #[serde(default = "default_true")]
    pub prevent_overlap: bool,
    /// Snap dropped and dragged items to the grid.
    #[serde(default = "default_true")]
    pub enable_snapping: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

fn default_unit() -> String {
    "cm".to_string()
}

fn default_grid_size() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for Room {
    fn default() -> Self {
        Self {
            id: 0,
            name: "Untitled".to_string(),
            description: None,
            width: 500.0,
            height: 400.0,
            unit: default_unit(),
            grid_size: default_grid_size(),
            show_grid: true,
            prevent_overlap: true,
            enable_snapping: true,
            created_by: None,
        }
    }
}

impl Room {
    /// Create a room with default policy flags.
    pub fn new(id: RoomId, name: impl Into<String>, width: f64, height: f64) -> Result<Self, RoomError> {
        let room = Self {
            id,
            name: name.into(),
            width,
            height,
            ..Self::default()
        };
        room.validate()?;
        Ok(room)
    }

    /// Check the room invariants.
    pub fn validate(&self) -> Result<(), RoomError> {
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(RoomError::InvalidWidth(self.width));
        }
        if !(self.height.is_finite() && self.height > 0.0) {
            return Err(RoomError::InvalidHeight(self.height));
        }
        if self.grid_size == 0 {
            return Err(RoomError::InvalidGridSize(self.grid_size));
        }
        Ok(())
    }

    /// The floor area as a rectangle anchored at the origin.
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    /// Whether `rect` lies entirely inside the room (edges may touch the walls).
    pub fn contains(&self, rect: Rect) -> bool {
        rect.x0 >= 0.0 && rect.y0 >= 0.0 && rect.x1 <= self.width && rect.y1 <= self.height
    }

    /// Change the floor dimensions, keeping the room unchanged on error.
    pub fn resize(&mut self, width: f64, height: f64) -> Result<(), RoomError> {
        let previous = (self.width, self.height);
        self.width = width;
        self.height = height;
        if let Err(e) = self.validate() {
            (self.width, self.height) = previous;
            return Err(e);
        }
        Ok(())
    }
}
