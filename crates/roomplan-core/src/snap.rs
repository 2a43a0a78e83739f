//! Grid snapping for dropped and dragged items.

use crate::room::Room;
use kurbo::Point;

/// Result of a snap operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapResult {
    /// The snapped point.
    pub point: Point,
    /// Whether the X coordinate was snapped.
    pub snapped_x: bool,
    /// Whether the Y coordinate was snapped.
    pub snapped_y: bool,
}

impl SnapResult {
    /// Create a result with no snapping.
    pub fn none(point: Point) -> Self {
        Self {
            point,
            snapped_x: false,
            snapped_y: false,
        }
    }

    /// Check if any snapping moved the point.
    pub fn is_snapped(&self) -> bool {
        self.snapped_x || self.snapped_y
    }
}

/// Snap a value to the nearest multiple of `grid_size`.
pub fn snap_to_grid(value: f64, grid_size: f64) -> f64 {
    if grid_size <= 0.0 {
        return value;
    }
    (value / grid_size).round() * grid_size
}

/// Snap a point to the room grid when the room has snapping enabled.
pub fn snap_point(point: Point, room: &Room) -> SnapResult {
    if !room.enable_snapping || room.grid_size == 0 {
        return SnapResult::none(point);
    }
    let grid = f64::from(room.grid_size);
    let snapped = Point::new(snap_to_grid(point.x, grid), snap_to_grid(point.y, grid));
    SnapResult {
        point: snapped,
        snapped_x: (snapped.x - point.x).abs() > f64::EPSILON,
        snapped_y: (snapped.y - point.y).abs() > f64::EPSILON,
    }
}
