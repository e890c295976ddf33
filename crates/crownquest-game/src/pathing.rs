//! Board geometry: compass directions and breadth-first distances.
//!
//! Spaces are laid out row-major on a 5-wide board, so a space id alone
//! gives its row and column.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use crownquest_protocol::{GRID_WIDTH, Grid, SpaceId, SpaceType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    South,
    East,
    West,
    Northeast,
    Northwest,
    Southeast,
    Southwest,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::North => "North",
            Self::South => "South",
            Self::East => "East",
            Self::West => "West",
            Self::Northeast => "Northeast",
            Self::Northwest => "Northwest",
            Self::Southeast => "Southeast",
            Self::Southwest => "Southwest",
        })
    }
}

/// `(row, col)` of a space.
pub fn coords(id: SpaceId) -> (i64, i64) {
    (i64::from(id / GRID_WIDTH), i64::from(id % GRID_WIDTH))
}

/// Compass direction from one space to another.
///
/// Unit orthogonal steps map to the four cardinal points; anything with
/// both a row and a column change maps to the matching diagonal by sign.
/// Straight jumps longer than one space have no direction.
pub fn direction(from: SpaceId, to: SpaceId) -> Option<Direction> {
    let (r1, c1) = coords(from);
    let (r2, c2) = coords(to);
    let (dr, dc) = (r2 - r1, c2 - c1);
    match (dr, dc) {
        (-1, 0) => Some(Direction::North),
        (1, 0) => Some(Direction::South),
        (0, 1) => Some(Direction::East),
        (0, -1) => Some(Direction::West),
        _ if dr < 0 && dc < 0 => Some(Direction::Northwest),
        _ if dr < 0 && dc > 0 => Some(Direction::Northeast),
        _ if dr > 0 && dc < 0 => Some(Direction::Southwest),
        _ if dr > 0 && dc > 0 => Some(Direction::Southeast),
        _ => None,
    }
}

/// Directions of every connection leaving `from`, in connection order.
pub fn available_directions(grid: &Grid, from: SpaceId) -> Vec<Direction> {
    grid.neighbors(from)
        .iter()
        .filter_map(|to| direction(from, *to))
        .collect()
}

/// Hop counts from `start` to every reachable space.
pub fn bfs_distances(grid: &Grid, start: SpaceId) -> HashMap<SpaceId, u32> {
    let mut distances = HashMap::from([(start, 0)]);
    let mut queue = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        let next = distances[&current] + 1;
        for &neighbor in grid.neighbors(current) {
            if !distances.contains_key(&neighbor) {
                distances.insert(neighbor, next);
                queue.push_back(neighbor);
            }
        }
    }
    distances
}

/// Directions from `from` that strictly shorten the walk to the Crown.
pub fn closer_to_crown(grid: &Grid, from: SpaceId) -> Vec<Direction> {
    let Some(crown) = grid.first_of(SpaceType::Crown) else {
        return Vec::new();
    };
    let distances = bfs_distances(grid, crown);
    let Some(&here) = distances.get(&from) else {
        return Vec::new();
    };
    grid.neighbors(from)
        .iter()
        .filter(|n| distances.get(n).is_some_and(|d| *d < here))
        .filter_map(|n| direction(from, *n))
        .collect()
}
