use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

/// Deepest floor index. Floor 0 is the highest floor.
pub const MAX_Z: u8 = 15;
pub const FLOOR_COUNT: usize = MAX_Z as usize + 1;
pub const SEA_FLOOR: u8 = 7;
pub const UNDERGROUND_FLOOR: u8 = SEA_FLOOR + 1;
pub const AWARE_UNDERGROUND_FLOOR_RANGE: u8 = 2;

const MAX_COORD: i32 = u16::MAX as i32;

/// World tile coordinate. An unknown position is expressed as `Option<Position>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    East,
    South,
    West,
    NorthEast,
    SouthEast,
    SouthWest,
    NorthWest,
    Invalid,
}

impl Direction {
    pub const ALL: [Direction; 9] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
        Direction::NorthEast,
        Direction::SouthEast,
        Direction::SouthWest,
        Direction::NorthWest,
        Direction::Invalid,
    ];

    pub const fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
            Direction::NorthEast => 4,
            Direction::SouthEast => 5,
            Direction::SouthWest => 6,
            Direction::NorthWest => 7,
            Direction::Invalid => 8,
        }
    }

    fn from_angle_degrees(angle: f32) -> Direction {
        if !(0.0..360.0).contains(&angle) {
            return Direction::Invalid;
        }
        match angle {
            a if a >= 337.5 || a < 22.5 => Direction::East,
            a if a < 67.5 => Direction::NorthEast,
            a if a < 112.5 => Direction::North,
            a if a < 157.5 => Direction::NorthWest,
            a if a < 202.5 => Direction::West,
            a if a < 247.5 => Direction::SouthWest,
            a if a < 292.5 => Direction::South,
            _ => Direction::SouthEast,
        }
    }

    const fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
            Direction::NorthEast => (1, -1),
            Direction::SouthEast => (1, 1),
            Direction::SouthWest => (-1, 1),
            Direction::NorthWest => (-1, -1),
            Direction::Invalid => (0, 0),
        }
    }
}

impl Position {
    pub const fn new(x: i32, y: i32, z: u8) -> Self {
        Self { x, y, z }
    }

    pub fn is_valid(self) -> bool {
        (0..=MAX_COORD).contains(&self.x) && (0..=MAX_COORD).contains(&self.y) && self.z <= MAX_Z
    }

    /// Same floor offset. The result may be outside the world; callers check `is_valid`.
    pub fn translated(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z)
    }

    pub fn translated_to_direction(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        self.translated(dx, dy)
    }

    /// Moves `n` floors up (towards floor 0). Returns false and leaves `self` unchanged
    /// when the target floor is outside `[0, MAX_Z]`.
    pub fn up(&mut self, n: i32) -> bool {
        self.shift(0, -n)
    }

    pub fn down(&mut self, n: i32) -> bool {
        self.shift(0, n)
    }

    /// Projects the position `n` floors up onto the tile that visually covers it.
    /// Negative `n` projects downwards.
    pub fn covered_up(&mut self, n: i32) -> bool {
        self.shift(n, -n)
    }

    pub fn covered_down(&mut self, n: i32) -> bool {
        self.shift(-n, n)
    }

    fn shift(&mut self, dxy: i32, dz: i32) -> bool {
        let nx = self.x + dxy;
        let ny = self.y + dxy;
        let nz = i32::from(self.z) + dz;
        if !(0..=MAX_COORD).contains(&nx)
            || !(0..=MAX_COORD).contains(&ny)
            || !(0..=i32::from(MAX_Z)).contains(&nz)
        {
            return false;
        }
        self.x = nx;
        self.y = ny;
        self.z = nz as u8;
        true
    }

    /// Compass direction from `self` towards `target`, ignoring floors.
    pub fn direction_to(self, target: Position) -> Direction {
        let dx = target.x - self.x;
        let dy = target.y - self.y;
        if dx == 0 && dy == 0 {
            return Direction::Invalid;
        }
        let mut angle = (-(dy as f32)).atan2(dx as f32);
        if angle < 0.0 {
            angle += 2.0 * PI;
        }
        Direction::from_angle_degrees(angle.to_degrees())
    }

    pub fn is_in_range(
        self,
        pos: Position,
        min_x_range: i32,
        max_x_range: i32,
        min_y_range: i32,
        max_y_range: i32,
        ignore_z: bool,
    ) -> bool {
        pos.x >= self.x - min_x_range
            && pos.x <= self.x + max_x_range
            && pos.y >= self.y - min_y_range
            && pos.y <= self.y + max_y_range
            && (ignore_z || pos.z == self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covered_up_moves_diagonally_towards_higher_floor() {
        let mut pos = Position::new(100, 100, 7);
        assert!(pos.covered_up(2));
        assert_eq!(pos, Position::new(102, 102, 5));
        assert!(pos.covered_up(-2));
        assert_eq!(pos, Position::new(100, 100, 7));
    }

    #[test]
    fn floor_moves_outside_range_are_rejected_without_mutation() {
        let mut top = Position::new(10, 10, 0);
        assert!(!top.up(1));
        assert!(!top.covered_up(1));
        assert_eq!(top, Position::new(10, 10, 0));

        let mut bottom = Position::new(0, 0, MAX_Z);
        assert!(!bottom.down(1));
        assert!(!bottom.covered_down(1));
        assert_eq!(bottom, Position::new(0, 0, MAX_Z));
    }

    #[test]
    fn direction_to_matches_compass() {
        let origin = Position::new(50, 50, 7);
        assert_eq!(origin.direction_to(origin.translated(0, -1)), Direction::North);
        assert_eq!(origin.direction_to(origin.translated(1, 0)), Direction::East);
        assert_eq!(origin.direction_to(origin.translated(0, 1)), Direction::South);
        assert_eq!(origin.direction_to(origin.translated(-1, 0)), Direction::West);
        assert_eq!(origin.direction_to(origin.translated(1, -1)), Direction::NorthEast);
        assert_eq!(origin.direction_to(origin.translated(-1, 1)), Direction::SouthWest);
        assert_eq!(origin.direction_to(origin), Direction::Invalid);
    }

    #[test]
    fn translated_to_direction_round_trips_direction_to() {
        let origin = Position::new(50, 50, 7);
        for direction in Direction::ALL {
            if direction == Direction::Invalid {
                continue;
            }
            let moved = origin.translated_to_direction(direction);
            assert_eq!(origin.direction_to(moved), direction, "direction={direction:?}");
        }
    }

    #[test]
    fn range_check_honors_floor_unless_ignored() {
        let center = Position::new(100, 100, 7);
        assert!(center.is_in_range(Position::new(93, 95, 7), 7, 7, 5, 5, false));
        assert!(!center.is_in_range(Position::new(92, 95, 7), 7, 7, 5, 5, false));
        assert!(!center.is_in_range(Position::new(100, 100, 6), 7, 7, 5, 5, false));
        assert!(center.is_in_range(Position::new(100, 100, 6), 7, 7, 5, 5, true));
    }

    #[test]
    fn validity_bounds() {
        assert!(Position::new(0, 0, 0).is_valid());
        assert!(Position::new(65535, 65535, MAX_Z).is_valid());
        assert!(!Position::new(-1, 0, 0).is_valid());
        assert!(!Position::new(0, 0, MAX_Z + 1).is_valid());
    }
}
