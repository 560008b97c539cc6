//! Position swaps that never expose two items sharing a position.
//!
//! The collaborator store writes one row per statement, so swapping two
//! positions directly would briefly leave a duplicate (and trip the unique
//! constraint). Instead the relocated item is parked on [`SENTINEL_POSITION`]
//! first, the other item takes its new position, then the relocated item takes
//! the freed one.

use super::ids::{StageId, StageTemplateId, TaskId, TaskTemplateId};
use super::workflow::Position;

/// Reserved position that no real item ever holds (real positions are >= 1).
pub const SENTINEL_POSITION: Position = -1;

/// Any row carrying a position within a parent-scoped ordered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderedItem {
    Stage(StageId),
    Task(TaskId),
    StageTemplate(StageTemplateId),
    TaskTemplate(TaskTemplateId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub item: OrderedItem,
    pub position: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionWrite {
    pub item: OrderedItem,
    pub position: Position,
}

/// The three writes that exchange the positions of `relocated` and `other`.
pub fn swap_plan(relocated: Placement, other: Placement) -> [PositionWrite; 3] {
    [
        PositionWrite {
            item: relocated.item,
            position: SENTINEL_POSITION,
        },
        PositionWrite {
            item: other.item,
            position: relocated.position,
        },
        PositionWrite {
            item: relocated.item,
            position: other.position,
        },
    ]
}

/// The item adjacent to `item` in `direction`, by position order.
///
/// `None` when `item` is not in `siblings` or is already at that end.
pub fn neighbour(
    siblings: &[Placement],
    item: OrderedItem,
    direction: Direction,
) -> Option<(Placement, Placement)> {
    let mut ordered = siblings.to_vec();
    ordered.sort_by_key(|p| p.position);
    let index = ordered.iter().position(|p| p.item == item)?;
    let target = match direction {
        Direction::Up => index.checked_sub(1)?,
        Direction::Down => index + 1,
    };
    let other = *ordered.get(target)?;
    Some((ordered[index], other))
}
