//! Axis-aligned footprint geometry for placed items.
//!
//! Items only ever sit at quarter-turn rotations, so every footprint is an
//! axis-aligned rectangle and overlap reduces to interval tests.

use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Serialize};

/// Quarter-turn rotation step of a placed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Normalize an arbitrary angle to the nearest quarter turn.
    ///
    /// Ties round to the even step (45° becomes 0°, 135° becomes 180°) and
    /// negative angles wrap around, so -90° is the same as 270°.
    pub fn from_degrees(degrees: f64) -> Self {
        if !degrees.is_finite() {
            return Rotation::Deg0;
        }
        let step = (degrees / 90.0).round_ties_even().rem_euclid(4.0);
        Self::from_step(step as u8)
    }

    fn from_step(step: u8) -> Self {
        match step % 4 {
            0 => Rotation::Deg0,
            1 => Rotation::Deg90,
            2 => Rotation::Deg180,
            _ => Rotation::Deg270,
        }
    }

    /// Number of quarter turns (0..=3).
    pub fn step(self) -> u8 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 1,
            Rotation::Deg180 => 2,
            Rotation::Deg270 => 3,
        }
    }

    /// Angle in degrees.
    pub fn degrees(self) -> f64 {
        f64::from(self.step()) * 90.0
    }

    /// Rotate a further quarter turn clockwise.
    pub fn next(self) -> Self {
        Self::from_step(self.step() + 1)
    }

    /// Whether width and length swap at this rotation.
    pub fn is_quarter_turn(self) -> bool {
        self.step() % 2 == 1
    }
}

impl From<f64> for Rotation {
    fn from(degrees: f64) -> Self {
        Rotation::from_degrees(degrees)
    }
}

impl From<Rotation> for f64 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

/// Nominal floor dimensions of an item at rotation 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    /// Extent along the x axis when unrotated.
    pub width: f64,
    /// Extent along the y axis when unrotated.
    pub length: f64,
}

impl Footprint {
    pub fn new(width: f64, length: f64) -> Self {
        Self { width, length }
    }
}

/// Effective axis-aligned extent of an item after rotation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub effective_width: f64,
    pub effective_height: f64,
}

impl BoundingBox {
    pub fn size(&self) -> Size {
        Size::new(self.effective_width, self.effective_height)
    }
}

/// Effective bounding box of `footprint` when turned by `rotation`.
pub fn bounding_box(footprint: Footprint, rotation: Rotation) -> BoundingBox {
    if rotation.is_quarter_turn() {
        BoundingBox {
            effective_width: footprint.length,
            effective_height: footprint.width,
        }
    } else {
        BoundingBox {
            effective_width: footprint.width,
            effective_height: footprint.length,
        }
    }
}

/// Rectangle covered by a bounding box whose top-left corner is `origin`.
pub fn footprint_rect(origin: Point, bbox: BoundingBox) -> Rect {
    Rect::from_origin_size(origin, bbox.size())
}

/// Whether two axis-aligned rectangles overlap.
///
/// Rectangles that only share an edge or a corner do not overlap.
pub fn overlaps(a: Rect, b: Rect) -> bool {
    !(a.x1 <= b.x0 || b.x1 <= a.x0 || a.y1 <= b.y0 || b.y1 <= a.y0)
}
