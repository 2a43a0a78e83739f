//! Placement validation against room bounds and neighbouring items.
//!
//! Validation is pure: it never mutates the scene, so it can run on every
//! pointer move while an item is dragged.

use crate::geometry::overlaps;
use crate::placement::{InstanceId, PlacedItem};
use crate::room::Room;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Why a placement was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Furniture is outside room boundaries")]
    OutOfBounds,
    #[error("Furniture overlaps with {label}")]
    Overlap { instance_id: InstanceId, label: String },
}

/// How many overlap conflicts to report per candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapReporting {
    /// Stop at the first conflicting neighbour.
    #[default]
    FirstConflict,
    /// Report every conflicting neighbour.
    AllConflicts,
}

/// Outcome of validating one placement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Human-readable reasons, in the order they were found.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    /// Instances the candidate collides with.
    pub fn conflicting_ids(&self) -> Vec<InstanceId> {
        self.errors
            .iter()
            .filter_map(|e| match e {
                ValidationError::Overlap { instance_id, .. } => Some(*instance_id),
                ValidationError::OutOfBounds => None,
            })
            .collect()
    }
}

/// Validate `candidate` against the room and the other placements.
///
/// `others` may contain the candidate itself; entries with the same instance
/// id are skipped. Overlap reporting stops at the first conflict.
pub fn validate(candidate: &PlacedItem, room: &Room, others: &[PlacedItem]) -> ValidationResult {
    validate_with(candidate, room, others, OverlapReporting::FirstConflict)
}

/// Like [`validate`], but reports every overlapping neighbour.
pub fn validate_exhaustive(candidate: &PlacedItem, room: &Room, others: &[PlacedItem]) -> ValidationResult {
    validate_with(candidate, room, others, OverlapReporting::AllConflicts)
}

/// Validate with an explicit overlap reporting mode.
pub fn validate_with(
    candidate: &PlacedItem,
    room: &Room,
    others: &[PlacedItem],
    reporting: OverlapReporting,
) -> ValidationResult {
    let mut result = ValidationResult::default();
    let rect = candidate.rect();

    if !room.contains(rect) {
        result.errors.push(ValidationError::OutOfBounds);
    }

    if room.prevent_overlap {
        for other in others.iter().filter(|o| o.instance_id() != candidate.instance_id()) {
            if overlaps(rect, other.rect()) {
                result.errors.push(ValidationError::Overlap {
                    instance_id: other.instance_id(),
                    label: other.label().to_string(),
                });
                if reporting == OverlapReporting::FirstConflict {
                    break;
                }
            }
        }
    }

    result
}

/// Validate a set of moved items against the scene they produce together.
///
/// `scene` is the full post-move layout (moved items included at their new
/// positions). Results are returned in the order of `moved`.
pub fn validate_batch(
    moved: &[PlacedItem],
    room: &Room,
    scene: &[PlacedItem],
    reporting: OverlapReporting,
) -> Vec<(InstanceId, ValidationResult)> {
    let mut seen = HashSet::new();
    moved
        .iter()
        .filter(|item| seen.insert(item.instance_id()))
        .map(|item| (item.instance_id(), validate_with(item, room, scene, reporting)))
        .collect()
}
