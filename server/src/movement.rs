//! Grid movement validation
//!
//! A step is either applied in full or not at all. Leaving the grid or
//! stepping onto the opponent is silently ignored.

use crate::config::ArenaConfig;
use shared::{Direction, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Moved { to: Position, corner: bool },
    Blocked,
}

pub fn in_bounds(position: Position, config: &ArenaConfig) -> bool {
    (0..config.grid_width).contains(&position.x) && (0..config.grid_height).contains(&position.y)
}

pub fn is_corner(position: Position, config: &ArenaConfig) -> bool {
    let max_x = config.grid_width - 1;
    let max_y = config.grid_height - 1;
    (position.x == 0 || position.x == max_x) && (position.y == 0 || position.y == max_y)
}

/// Computes the step from `from` in `direction` with `occupied` as the only obstacle.
pub fn step(
    from: Position,
    direction: Direction,
    occupied: Option<Position>,
    config: &ArenaConfig,
) -> StepOutcome {
    let (dx, dy) = direction.delta();
    let to = Position::new(from.x + dx, from.y + dy);

    if !in_bounds(to, config) || occupied == Some(to) {
        return StepOutcome::Blocked;
    }

    StepOutcome::Moved {
        to,
        corner: is_corner(to, config),
    }
}

/// Every cell strictly farther than one step from `away_from`.
pub fn cells_away_from(away_from: Position, config: &ArenaConfig) -> Vec<Position> {
    (0..config.grid_height)
        .flat_map(|y| (0..config.grid_width).map(move |x| Position::new(x, y)))
        .filter(|cell| cell.manhattan(&away_from) > 1)
        .collect()
}
