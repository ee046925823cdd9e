// ═══════════════════════════════════════════════════════════════════════
// Hex grid geometry — offset coordinates, neighbors, distance, reach
//
// The map is a fixed width × height grid in "odd-r" offset layout: odd
// rows are shoved half a hex to the right. Rows grow downward, so the
// clockwise neighbor order below is clockwise as drawn on screen.
//
// Every function here is pure. Spawn placement and expansion tie-breaks
// depend on the neighbor order, so it must never change.
// ═══════════════════════════════════════════════════════════════════════

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

// ── Position ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub row: i32,
    pub col: i32,
}

impl Position {
    pub const fn new(row: i32, col: i32) -> Self {
        Position { row, col }
    }

    /// Cube coordinates (x, y, z) with x + y + z == 0.
    fn cube(self) -> (i32, i32, i32) {
        let x = self.col - (self.row - (self.row & 1)) / 2;
        let z = self.row;
        (x, -x - z, z)
    }

    /// The adjacent position in the given direction.
    pub fn step(self, dir: Direction) -> Position {
        let odd = self.row & 1 == 1;
        let (dr, dc) = match (dir, odd) {
            (Direction::East, _) => (0, 1),
            (Direction::West, _) => (0, -1),
            (Direction::SouthEast, false) => (1, 0),
            (Direction::SouthEast, true) => (1, 1),
            (Direction::SouthWest, false) => (1, -1),
            (Direction::SouthWest, true) => (1, 0),
            (Direction::NorthWest, false) => (-1, -1),
            (Direction::NorthWest, true) => (-1, 0),
            (Direction::NorthEast, false) => (-1, 0),
            (Direction::NorthEast, true) => (-1, 1),
        };
        Position::new(self.row + dr, self.col + dc)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

// ── Direction ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    East,
    SouthEast,
    SouthWest,
    West,
    NorthWest,
    NorthEast,
}

/// Reference direction for every clockwise neighbor walk.
pub const FIRST_NEIGHBOR: Direction = Direction::East;

/// Clockwise order starting at [`FIRST_NEIGHBOR`].
pub const NEIGHBOR_ORDER: [Direction; 6] = [
    Direction::East,
    Direction::SouthEast,
    Direction::SouthWest,
    Direction::West,
    Direction::NorthWest,
    Direction::NorthEast,
];

/// The 6 adjacent coordinates in fixed clockwise order. May include
/// positions outside the map; see [`HexGrid::neighbors_in_bounds`].
pub fn neighbors(pos: Position) -> [Position; 6] {
    NEIGHBOR_ORDER.map(|d| pos.step(d))
}

/// Hex distance between two positions.
pub fn distance(a: Position, b: Position) -> u32 {
    let (ax, ay, az) = a.cube();
    let (bx, by, bz) = b.cube();
    let d = (ax - bx).abs().max((ay - by).abs()).max((az - bz).abs());
    d as u32
}

/// True when `target` lies within `[min, max]` hexes of `origin`.
pub fn in_range(origin: Position, target: Position, min: u32, max: u32) -> bool {
    let d = distance(origin, target);
    d >= min && d <= max
}

// ── Grid bounds ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HexGrid {
    pub width: u32,
    pub height: u32,
}

impl HexGrid {
    pub fn new(width: u32, height: u32) -> Self {
        HexGrid { width, height }
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.row >= 0 && pos.col >= 0 && (pos.row as u32) < self.height && (pos.col as u32) < self.width
    }

    /// Neighbors that exist on this map, still in clockwise order.
    pub fn neighbors_in_bounds(&self, pos: Position) -> Vec<Position> {
        neighbors(pos).into_iter().filter(|p| self.in_bounds(*p)).collect()
    }

    /// All tiles reachable from `origin` spending at most `move_points`,
    /// one point per hex step. `blocked` excludes tiles (terrain,
    /// occupancy) — a blocked tile can be neither entered nor crossed.
    ///
    /// The origin itself is not part of the result. Output is ordered by
    /// (cost, row, col) so callers get a stable answer.
    pub fn reachable<F>(&self, origin: Position, move_points: u32, blocked: F) -> Vec<(Position, u32)>
    where
        F: Fn(Position) -> bool,
    {
        let mut cost: HashMap<Position, u32> = HashMap::new();
        let mut queue: VecDeque<Position> = VecDeque::new();
        cost.insert(origin, 0);
        queue.push_back(origin);

        while let Some(current) = queue.pop_front() {
            let spent = cost[&current];
            if spent >= move_points {
                continue;
            }
            for next in neighbors(current) {
                if !self.in_bounds(next) || cost.contains_key(&next) || blocked(next) {
                    continue;
                }
                cost.insert(next, spent + 1);
                queue.push_back(next);
            }
        }

        let mut out: Vec<(Position, u32)> = cost.into_iter()
            .filter(|(p, _)| *p != origin)
            .collect();
        out.sort_unstable_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbor_order_starts_east_and_runs_clockwise() {
        // even row
        let p = Position::new(2, 2);
        assert_eq!(neighbors(p), [
            Position::new(2, 3),
            Position::new(3, 2),
            Position::new(3, 1),
            Position::new(2, 1),
            Position::new(1, 1),
            Position::new(1, 2),
        ]);
        // odd row
        let q = Position::new(3, 2);
        assert_eq!(neighbors(q), [
            Position::new(3, 3),
            Position::new(4, 3),
            Position::new(4, 2),
            Position::new(3, 1),
            Position::new(2, 2),
            Position::new(2, 3),
        ]);
        assert_eq!(NEIGHBOR_ORDER[0], FIRST_NEIGHBOR);
    }

    #[test]
    fn every_neighbor_is_one_step_away() {
        for row in 0..4 {
            for col in 0..4 {
                let p = Position::new(row, col);
                for n in neighbors(p) {
                    assert_eq!(distance(p, n), 1, "{p} -> {n}");
                    assert!(neighbors(n).contains(&p), "adjacency must be symmetric");
                }
            }
        }
    }

    #[test]
    fn distance_along_rows_and_diagonals() {
        assert_eq!(distance(Position::new(0, 0), Position::new(0, 0)), 0);
        assert_eq!(distance(Position::new(0, 0), Position::new(0, 5)), 5);
        assert_eq!(distance(Position::new(0, 0), Position::new(4, 2)), 4);
        assert_eq!(distance(Position::new(1, 1), Position::new(5, 0)), 4);
        assert_eq!(distance(Position::new(5, 0), Position::new(1, 1)), 4);
    }

    #[test]
    fn in_range_respects_both_bounds() {
        let o = Position::new(4, 4);
        assert!(!in_range(o, Position::new(4, 5), 2, 3));
        assert!(in_range(o, Position::new(4, 6), 2, 3));
        assert!(in_range(o, Position::new(4, 7), 2, 3));
        assert!(!in_range(o, Position::new(4, 8), 2, 3));
    }

    #[test]
    fn neighbors_in_bounds_clips_corner() {
        let grid = HexGrid::new(5, 5);
        let n = grid.neighbors_in_bounds(Position::new(0, 0));
        assert_eq!(n, vec![Position::new(0, 1), Position::new(1, 0)]);
    }

    #[test]
    fn reachable_counts_steps_and_skips_blocked() {
        let grid = HexGrid::new(6, 6);
        let origin = Position::new(2, 2);
        let one = grid.reachable(origin, 1, |_| false);
        assert_eq!(one.len(), 6);
        assert!(one.iter().all(|(_, c)| *c == 1));

        let two = grid.reachable(origin, 2, |_| false);
        assert_eq!(two.len(), 18);

        // Wall off everything east of column 2 — nothing there is reachable.
        let walled = grid.reachable(origin, 3, |p| p.col == 3);
        assert!(walled.iter().all(|(p, _)| p.col != 3));
        assert!(!walled.iter().any(|(p, _)| *p == origin));
    }

    #[test]
    fn reachable_is_ordered_by_cost_then_position() {
        let grid = HexGrid::new(6, 6);
        let r = grid.reachable(Position::new(3, 3), 2, |_| false);
        for pair in r.windows(2) {
            assert!((pair[0].1, pair[0].0) < (pair[1].1, pair[1].0));
        }
    }
}
