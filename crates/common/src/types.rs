use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Maximum disagreement, in world units, between corners that should share an edge.
pub const RECT_TOLERANCE: f32 = 1e-3;

/// Errors raised while assembling a world state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StateError {
    #[error("corners {corners:?} do not form an axis-aligned rectangle")]
    NotRectangle { corners: [Vec2; 4] },
    #[error("rectangle has no area: width {width}, height {height}")]
    DegenerateRectangle { width: f32, height: f32 },
    #[error("corner coordinates must be finite")]
    NonFinite,
}

/// A static, axis-aligned rectangular obstacle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    pub center: Vec2,
    pub half_extents: Vec2,
}

impl Wall {
    /// Wall from its center and half-extents. Extents are not checked here.
    pub fn new(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            center,
            half_extents,
        }
    }

    /// Build a wall from four corner points given in any order.
    ///
    /// The points must describe an axis-aligned rectangle with non-zero area.
    /// The resulting center is the centroid and the half-extents are half the
    /// side lengths.
    pub fn from_corners(corners: [Vec2; 4]) -> Result<Self, StateError> {
        if corners.iter().any(|c| !c.is_finite()) {
            return Err(StateError::NonFinite);
        }

        // Left pair first, then right pair; each pair bottom-to-top.
        let mut pts = corners;
        pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
        pts[..2].sort_by(|a, b| a.y.total_cmp(&b.y));
        pts[2..].sort_by(|a, b| a.y.total_cmp(&b.y));
        let [bottom_left, top_left, bottom_right, top_right] = pts;

        let near = |a: f32, b: f32| (a - b).abs() <= RECT_TOLERANCE;
        let aligned = near(bottom_left.x, top_left.x)
            && near(bottom_right.x, top_right.x)
            && near(bottom_left.y, bottom_right.y)
            && near(top_left.y, top_right.y);
        if !aligned {
            return Err(StateError::NotRectangle { corners });
        }

        let min = corners.iter().fold(Vec2::splat(f32::INFINITY), |m, c| m.min(*c));
        let max = corners
            .iter()
            .fold(Vec2::splat(f32::NEG_INFINITY), |m, c| m.max(*c));
        let size = max - min;
        if size.x <= RECT_TOLERANCE || size.y <= RECT_TOLERANCE {
            return Err(StateError::DegenerateRectangle {
                width: size.x,
                height: size.y,
            });
        }

        Ok(Self::new((min + max) * 0.5, size * 0.5))
    }

    /// Corners in counter-clockwise order starting at the bottom-left.
    pub fn corners(&self) -> [Vec2; 4] {
        let (c, h) = (self.center, self.half_extents);
        [
            Vec2::new(c.x - h.x, c.y - h.y),
            Vec2::new(c.x + h.x, c.y - h.y),
            Vec2::new(c.x + h.x, c.y + h.y),
            Vec2::new(c.x - h.x, c.y + h.y),
        ]
    }
}

/// Immutable capture of every body position at one simulation tick.
///
/// Walls never move, so they are shared between successive snapshots;
/// cloning a state copies only the avatar and hazard positions.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldState {
    tick: u64,
    avatar: Vec2,
    hazards: Vec<Vec2>,
    walls: Arc<[Wall]>,
}

impl WorldState {
    /// Tick that produced this state. The initial state is tick 0.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Avatar center, in world units.
    pub fn avatar(&self) -> Vec2 {
        self.avatar
    }

    /// Hazard positions in the order the hazards were declared.
    pub fn hazards(&self) -> &[Vec2] {
        &self.hazards
    }

    /// Static walls, shared by every state of the same world.
    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    /// Corners of each wall, in wall order.
    pub fn wall_corners(&self) -> impl Iterator<Item = [Vec2; 4]> + '_ {
        self.walls.iter().map(Wall::corners)
    }

    /// A later state of the same world: new positions, same walls.
    pub fn successor(&self, tick: u64, avatar: Vec2, hazards: Vec<Vec2>) -> Self {
        debug_assert_eq!(hazards.len(), self.hazards.len());
        Self {
            tick,
            avatar,
            hazards,
            walls: Arc::clone(&self.walls),
        }
    }

    /// FNV-1a digest over the tick and the bit pattern of every coordinate.
    /// Two states hash equal only if they are bit-for-bit identical.
    pub fn state_hash(&self) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        let mut mix = |bytes: &[u8]| {
            for &b in bytes {
                h ^= b as u64;
                h = h.wrapping_mul(0x0100_0000_01b3);
            }
        };
        mix(&self.tick.to_le_bytes());
        let points = std::iter::once(self.avatar)
            .chain(self.hazards.iter().copied())
            .chain(self.walls.iter().flat_map(|w| [w.center, w.half_extents]));
        for p in points {
            mix(&p.x.to_bits().to_le_bytes());
            mix(&p.y.to_bits().to_le_bytes());
        }
        h
    }
}

/// Assembles a `WorldState` part by part.
#[derive(Debug, Clone, Default)]
pub struct StateBuilder {
    tick: u64,
    avatar: Vec2,
    hazards: Vec<Vec2>,
    walls: Vec<Wall>,
}

impl StateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tick to stamp on the built state (default 0).
    pub fn tick(mut self, tick: u64) -> Self {
        self.tick = tick;
        self
    }

    /// Avatar center (default origin).
    pub fn avatar(mut self, position: Vec2) -> Self {
        self.avatar = position;
        self
    }

    /// Add a wall by center and half-extents. Extents are checked when the
    /// physics world is built, not here.
    pub fn wall(mut self, center: Vec2, half_extents: Vec2) -> Self {
        self.walls.push(Wall::new(center, half_extents));
        self
    }

    /// Add a wall from four corner points; fails unless they form an
    /// axis-aligned rectangle.
    pub fn wall_from_corners(mut self, corners: [Vec2; 4]) -> Result<Self, StateError> {
        self.walls.push(Wall::from_corners(corners)?);
        Ok(self)
    }

    /// Append a hazard at `position`.
    pub fn hazard(mut self, position: Vec2) -> Self {
        self.hazards.push(position);
        self
    }

    pub fn build(self) -> WorldState {
        WorldState {
            tick: self.tick,
            avatar: self.avatar,
            hazards: self.hazards,
            walls: self.walls.into(),
        }
    }
}
