//! Keyboard commands and pointer drags over a planner session.

use crate::geometry::Rotation;
use crate::layout::{Layout, LayoutResult, Reposition};
use crate::placement::{GroupId, InstanceId};
use crate::planner::{Planner, PlannerResult};
use crate::room::Room;
use crate::snap::snap_point;
use crate::storage::{PlacementStore, RoomSource};
use crate::sync::PlacementDelta;
use crate::validate::{OverlapReporting, ValidationResult};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    /// Ctrl on most platforms, Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// Action a key press asks the planner to perform on the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlannerCommand {
    Rotate,
    Delete,
    Group,
    Ungroup,
    Save,
    Cancel,
    Undo,
    Redo,
}

impl PlannerCommand {
    /// Undo and redo are recognised but have no history to act on.
    pub fn is_supported(self) -> bool {
        !matches!(self, Self::Undo | Self::Redo)
    }
}

/// A keyboard shortcut definition.
#[derive(Debug, Clone)]
pub struct Shortcut {
    pub key: &'static str,
    pub ctrl: bool,
    pub shift: bool,
    pub command: PlannerCommand,
    pub description: &'static str,
}

impl Shortcut {
    pub const fn new(
        key: &'static str,
        ctrl: bool,
        shift: bool,
        command: PlannerCommand,
        description: &'static str,
    ) -> Self {
        Self {
            key,
            ctrl,
            shift,
            command,
            description,
        }
    }

    /// Format the shortcut for display (e.g., "Ctrl+S").
    pub fn format(&self) -> String {
        let mut parts = Vec::new();
        if self.ctrl {
            parts.push("Ctrl");
        }
        if self.shift {
            parts.push("Shift");
        }
        parts.push(self.key);
        parts.join("+")
    }

    fn matches(&self, key: &str, modifiers: Modifiers) -> bool {
        self.key.eq_ignore_ascii_case(key) && self.ctrl == modifiers.command() && self.shift == modifiers.shift
    }
}

const SHORTCUTS: &[Shortcut] = &[
    Shortcut::new("R", false, false, PlannerCommand::Rotate, "Rotate selection a quarter turn"),
    Shortcut::new("Delete", false, false, PlannerCommand::Delete, "Remove selected furniture"),
    Shortcut::new("Backspace", false, false, PlannerCommand::Delete, "Remove selected furniture"),
    Shortcut::new("G", false, false, PlannerCommand::Group, "Group selected furniture"),
    Shortcut::new("G", false, true, PlannerCommand::Ungroup, "Ungroup selected furniture"),
    Shortcut::new("S", true, false, PlannerCommand::Save, "Save room"),
    Shortcut::new("Escape", false, false, PlannerCommand::Cancel, "Cancel current drag"),
    Shortcut::new("Z", true, false, PlannerCommand::Undo, "Undo (not available)"),
    Shortcut::new("Y", true, false, PlannerCommand::Redo, "Redo (not available)"),
];

/// Registry of all keyboard shortcuts.
pub struct ShortcutRegistry;

impl ShortcutRegistry {
    /// Get all registered shortcuts.
    pub fn all() -> &'static [Shortcut] {
        SHORTCUTS
    }

    /// The command bound to a key press, if any.
    pub fn lookup(key: &str, modifiers: Modifiers) -> Option<PlannerCommand> {
        SHORTCUTS.iter().find(|s| s.matches(key, modifiers)).map(|s| s.command)
    }
}

/// What a command did.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Rotated(Vec<InstanceId>),
    Removed(Vec<InstanceId>),
    Grouped(GroupId),
    Ungrouped(Vec<InstanceId>),
    Saved(PlacementDelta),
    /// Nothing to act on, or a command without an effect here.
    Ignored,
    Unsupported(PlannerCommand),
}

/// Run a command against the selected placements.
///
/// Rotation turns every selected item a quarter turn as one step; it is
/// rejected as a whole if any item would break the room rules.
pub async fn execute<S: PlacementStore + RoomSource>(
    planner: &mut Planner<S>,
    command: PlannerCommand,
    selection: &[InstanceId],
) -> PlannerResult<CommandOutcome> {
    if !command.is_supported() {
        log::warn!("{:?} is not supported", command);
        return Ok(CommandOutcome::Unsupported(command));
    }

    let outcome = match command {
        PlannerCommand::Rotate => {
            let updates: Vec<Reposition> = selection
                .iter()
                .filter_map(|&id| planner.layout().get(id))
                .map(|item| Reposition::new(item.instance_id(), item.placement.position, item.placement.rotation.next()))
                .collect();
            if updates.is_empty() {
                CommandOutcome::Ignored
            } else {
                CommandOutcome::Rotated(planner.commit_drag(&updates)?)
            }
        }
        PlannerCommand::Delete => {
            let mut removed = Vec::new();
            for &id in selection {
                if planner.layout().contains(id) {
                    planner.remove_item(id)?;
                    removed.push(id);
                }
            }
            CommandOutcome::Removed(removed)
        }
        PlannerCommand::Group => CommandOutcome::Grouped(planner.group(selection)?),
        PlannerCommand::Ungroup => {
            let groups: BTreeSet<GroupId> = selection
                .iter()
                .filter_map(|&id| planner.layout().get(id).and_then(|item| item.group_id()))
                .collect();
            let mut members = Vec::new();
            for group_id in groups {
                members.extend(planner.ungroup(group_id));
            }
            CommandOutcome::Ungrouped(members)
        }
        PlannerCommand::Save => CommandOutcome::Saved(planner.save().await?),
        PlannerCommand::Cancel | PlannerCommand::Undo | PlannerCommand::Redo => CommandOutcome::Ignored,
    };
    Ok(outcome)
}

/// An in-progress pointer drag of one placement and everything grouped
/// with it.
///
/// The grabbed item's new position is snapped to the room grid; the other
/// members follow by the same offset so the group keeps its shape.
#[derive(Debug, Clone)]
pub struct DragGesture {
    /// Placement under the pointer when the drag started.
    anchor: InstanceId,
    /// Starting point of the drag.
    start_point: Point,
    /// Current point of the drag.
    current_point: Point,
    /// Positions and rotations before the drag, in layout order.
    originals: Vec<(InstanceId, Point, Rotation)>,
}

impl DragGesture {
    /// Start dragging `id` from `point`.
    pub fn pointer_down(layout: &Layout, id: InstanceId, point: Point) -> LayoutResult<Self> {
        let originals = layout
            .move_set(id)?
            .into_iter()
            .filter_map(|member| layout.get(member))
            .map(|item| (item.instance_id(), item.placement.position, item.placement.rotation))
            .collect();
        Ok(Self {
            anchor: id,
            start_point: point,
            current_point: point,
            originals,
        })
    }

    pub fn pointer_move(&mut self, point: Point) {
        self.current_point = point;
    }

    /// Get the drag delta.
    pub fn delta(&self) -> Vec2 {
        self.current_point - self.start_point
    }

    /// The placements being moved.
    pub fn instance_ids(&self) -> Vec<InstanceId> {
        self.originals.iter().map(|(id, _, _)| *id).collect()
    }

    /// Updates that would apply if the pointer were released now.
    pub fn repositions(&self, room: &Room) -> Vec<Reposition> {
        let anchor_origin = self
            .originals
            .iter()
            .find(|(id, _, _)| *id == self.anchor)
            .map_or(Point::ZERO, |(_, position, _)| *position);
        let snapped = snap_point(anchor_origin + self.delta(), room).point;
        let offset = snapped - anchor_origin;

        self.originals
            .iter()
            .map(|&(id, position, rotation)| Reposition::new(id, position + offset, rotation))
            .collect()
    }

    /// Validation feedback for the current pointer position.
    pub fn preview(&self, layout: &Layout, room: &Room, reporting: OverlapReporting) -> Vec<(InstanceId, ValidationResult)> {
        layout.preview_bulk_reposition(&self.repositions(room), room, reporting)
    }

    /// Finish the drag and return the updates to commit as one step.
    pub fn pointer_up(mut self, point: Point, room: &Room) -> Vec<Reposition> {
        self.current_point = point;
        self.repositions(room)
    }
}
