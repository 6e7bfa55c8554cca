//! World geometry - block positions and continuous positions.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::RulesError;

/// Integer block coordinate used as the identity of every placed marker.
///
/// Ordering is lexicographic on `(x, y, z)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionKey {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl PositionKey {
    /// Create a new position key.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Offset this key by the given deltas, wrapping at the `i32` edges.
    pub const fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(
            self.x.wrapping_add(dx),
            self.y.wrapping_add(dy),
            self.z.wrapping_add(dz),
        )
    }

    /// Offset this key, or `None` if any axis leaves the `i32` range.
    pub fn checked_offset(&self, dx: i32, dy: i32, dz: i32) -> Option<Self> {
        Some(Self::new(
            self.x.checked_add(dx)?,
            self.y.checked_add(dy)?,
            self.z.checked_add(dz)?,
        ))
    }

    /// The face-adjacent cells, in the order +x, -x, +y, -y, +z, -z.
    ///
    /// Cells outside the `i32` range do not exist, so a key on the edge of
    /// the coordinate space has fewer than six neighbours.
    pub fn face_neighbors(&self) -> impl Iterator<Item = PositionKey> {
        const FACES: [(i32, i32, i32); 6] = [
            (1, 0, 0),
            (-1, 0, 0),
            (0, 1, 0),
            (0, -1, 0),
            (0, 0, 1),
            (0, 0, -1),
        ];
        let origin = *self;
        FACES
            .into_iter()
            .filter_map(move |(dx, dy, dz)| origin.checked_offset(dx, dy, dz))
    }

    /// Centre of the block.
    pub fn center(&self) -> WorldPos {
        WorldPos::new(
            f64::from(self.x) + 0.5,
            f64::from(self.y) + 0.5,
            f64::from(self.z) + 0.5,
        )
    }

    /// Where a worker bound to this block appears: centred, one unit above the block.
    pub fn spawn_point(&self) -> WorldPos {
        WorldPos::new(
            f64::from(self.x) + 0.5,
            f64::from(self.y) + 1.0,
            f64::from(self.z) + 0.5,
        )
    }
}

impl std::fmt::Display for PositionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

impl FromStr for PositionKey {
    type Err = RulesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RulesError::InvalidPositionKey(s.to_string());

        let mut parts = s.split(',');
        let mut next = || -> Result<i32, RulesError> {
            parts
                .next()
                .ok_or_else(invalid)?
                .trim()
                .parse::<i32>()
                .map_err(|_| invalid())
        };

        let key = PositionKey::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(key)
    }
}

/// Continuous position of an actor in the world.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldPos {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl WorldPos {
    /// Create a new world position.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Squared euclidean distance. Comparisons against a radius should use this.
    pub fn distance_squared(&self, other: &WorldPos) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }
}

impl std::fmt::Display for WorldPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}
