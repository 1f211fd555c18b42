use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer block coordinates. Also used for region sizes, which may be negative.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

pub type Vec3i = BlockPos;

impl BlockPos {
    pub const ORIGIN: BlockPos = BlockPos { x: 0, y: 0, z: 0 };

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        BlockPos { x, y, z }
    }

    pub fn abs(self) -> Self {
        BlockPos::new(self.x.abs(), self.y.abs(), self.z.abs())
    }

    pub fn offset(self, other: BlockPos) -> Self {
        BlockPos::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    /// Product of the absolute components.
    pub fn volume(self) -> u64 {
        self.x.unsigned_abs() as u64 * self.y.unsigned_abs() as u64 * self.z.unsigned_abs() as u64
    }

    /// True when every component is positive.
    pub fn is_size_valid(self) -> bool {
        self.x > 0 && self.y > 0 && self.z > 0
    }

    /// Floors a double position to the containing block.
    pub fn containing(pos: Vec3d) -> Self {
        BlockPos::new(pos.x.floor() as i32, pos.y.floor() as i32, pos.z.floor() as i32)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl From<(i32, i32, i32)> for BlockPos {
    fn from((x, y, z): (i32, i32, i32)) -> Self {
        BlockPos::new(x, y, z)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3d {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3d {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Vec3d { x, y, z }
    }
}

/// The far corner of a region whose size may point in any direction.
pub fn region_end_corner(position: BlockPos, size: BlockPos) -> BlockPos {
    let step = |s: i32| if s > 0 { s - 1 } else if s < 0 { s + 1 } else { 0 };
    BlockPos::new(
        position.x + step(size.x),
        position.y + step(size.y),
        position.z + step(size.z),
    )
}

/// Size of the box enclosing all given regions, or `None` for an empty input.
pub fn enclosing_size<I>(regions: I) -> Option<BlockPos>
where
    I: IntoIterator<Item = (BlockPos, BlockPos)>,
{
    let mut bounds: Option<(BlockPos, BlockPos)> = None;
    for (position, size) in regions {
        let end = region_end_corner(position, size);
        let lo = BlockPos::new(
            position.x.min(end.x),
            position.y.min(end.y),
            position.z.min(end.z),
        );
        let hi = BlockPos::new(
            position.x.max(end.x),
            position.y.max(end.y),
            position.z.max(end.z),
        );
        bounds = Some(match bounds {
            None => (lo, hi),
            Some((min, max)) => (
                BlockPos::new(min.x.min(lo.x), min.y.min(lo.y), min.z.min(lo.z)),
                BlockPos::new(max.x.max(hi.x), max.y.max(hi.y), max.z.max(hi.z)),
            ),
        });
    }
    bounds.map(|(min, max)| {
        BlockPos::new(max.x - min.x + 1, max.y - min.y + 1, max.z - min.z + 1)
    })
}
