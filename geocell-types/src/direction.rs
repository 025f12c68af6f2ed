use serde::{Deserialize, Serialize};

/// A compass move on the geocell grid.
///
/// `dx` is -1 for west and 1 for east, `dy` is -1 for south and 1 for north.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Direction {
    pub dx: i8,
    pub dy: i8,
}

impl Direction {
    pub const NORTH: Direction = Direction::new(0, 1);
    pub const NORTH_EAST: Direction = Direction::new(1, 1);
    pub const EAST: Direction = Direction::new(1, 0);
    pub const SOUTH_EAST: Direction = Direction::new(1, -1);
    pub const SOUTH: Direction = Direction::new(0, -1);
    pub const SOUTH_WEST: Direction = Direction::new(-1, -1);
    pub const WEST: Direction = Direction::new(-1, 0);
    pub const NORTH_WEST: Direction = Direction::new(-1, 1);

    /// All eight moves, clockwise starting at north-west.
    pub const ALL: [Direction; 8] = [
        Direction::NORTH_WEST,
        Direction::NORTH,
        Direction::NORTH_EAST,
        Direction::EAST,
        Direction::SOUTH_EAST,
        Direction::SOUTH,
        Direction::SOUTH_WEST,
        Direction::WEST,
    ];

    /// # Panics
    ///
    /// Panics (at compile time in const contexts) if a component is outside -1..=1.
    pub const fn new(dx: i8, dy: i8) -> Self {
        assert!(dx >= -1 && dx <= 1 && dy >= -1 && dy <= 1);
        Self { dx, dy }
    }

    pub const fn opposite(self) -> Direction {
        Direction {
            dx: -self.dx,
            dy: -self.dy,
        }
    }

    /// North, south, east or west.
    pub const fn is_cardinal(self) -> bool {
        (self.dx == 0) != (self.dy == 0)
    }

    /// Pure north/south move.
    pub const fn is_vertical(self) -> bool {
        self.dx == 0 && self.dy != 0
    }

    /// Pure east/west move.
    pub const fn is_horizontal(self) -> bool {
        self.dy == 0 && self.dx != 0
    }
}
