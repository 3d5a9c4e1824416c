//! Cell and region addressing, plus the coordinate-key codec.
//!
//! A cell's data lives in its owning region's container under a key of the
//! form `x<lx>y<y>z<lz>`, where `lx`/`lz` are the region-local column
//! coordinates (`0..16`) and `y` is the unrestricted world height.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Width and depth of a region, in cells.
pub const REGION_SIZE: i32 = 16;

/// Bit shift converting a cell column coordinate into a region coordinate.
const REGION_SHIFT: u32 = 4;

/// Mask extracting the region-local part of a column coordinate.
const LOCAL_MASK: i32 = REGION_SIZE - 1;

/// Identifies a world known to the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorldId(pub Uuid);

impl WorldId {
    /// Creates a fresh random world id.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for WorldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Absolute cell coordinates inside a world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellPos {
    /// World X.
    pub x: i32,
    /// World Y (height).
    pub y: i32,
    /// World Z.
    pub z: i32,
}

impl CellPos {
    /// Creates a new cell position.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Returns the position offset by `(dx, dy, dz)`, wrapping at the `i32`
    /// bounds.
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x.wrapping_add(dx),
            y: self.y.wrapping_add(dy),
            z: self.z.wrapping_add(dz),
        }
    }

    /// Returns the neighbouring position one step in `direction`.
    pub fn relative(self, direction: Direction) -> Self {
        let (dx, dy, dz) = direction.offset();
        self.offset(dx, dy, dz)
    }

    /// Region column containing this position.
    pub fn region(self) -> RegionPos {
        RegionPos {
            x: self.x >> REGION_SHIFT,
            z: self.z >> REGION_SHIFT,
        }
    }
}

/// Stable identity of a single cell, independent of whether it is loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId {
    /// Owning world.
    pub world: WorldId,
    /// Position within the world.
    pub pos: CellPos,
}

impl CellId {
    /// Creates a cell identity from a world and raw coordinates.
    pub const fn new(world: WorldId, x: i32, y: i32, z: i32) -> Self {
        Self {
            world,
            pos: CellPos::new(x, y, z),
        }
    }

    /// Region owning this cell.
    pub fn region(&self) -> RegionId {
        RegionId {
            world: self.world,
            pos: self.pos.region(),
        }
    }

    /// The neighbouring cell one step in `direction`, in the same world.
    pub fn relative(&self, direction: Direction) -> Self {
        Self {
            world: self.world,
            pos: self.pos.relative(direction),
        }
    }

    /// The coordinate key of this cell inside its region.
    pub fn key(&self) -> String {
        encode_key(self.pos.x, self.pos.y, self.pos.z)
    }
}

/// Region column coordinates (cell column coordinates divided by 16).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionPos {
    /// Region-grid X.
    pub x: i32,
    /// Region-grid Z.
    pub z: i32,
}

impl RegionPos {
    /// Creates a region position from region-grid coordinates.
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Region containing the world column `(x, z)`.
    pub fn containing(x: i32, z: i32) -> Self {
        CellPos::new(x, 0, z).region()
    }
}

/// A region inside a specific world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId {
    /// Owning world.
    pub world: WorldId,
    /// Region column.
    pub pos: RegionPos,
}

impl RegionId {
    /// Creates a region id.
    pub const fn new(world: WorldId, pos: RegionPos) -> Self {
        Self { world, pos }
    }

    /// World cell at region-local `(lx, lz)` and height `y`.
    pub fn cell_at(&self, lx: i32, y: i32, lz: i32) -> CellId {
        CellId::new(
            self.world,
            self.pos.x * REGION_SIZE + lx,
            y,
            self.pos.z * REGION_SIZE + lz,
        )
    }
}

/// Valid vertical range of a world: `min_y` inclusive, `max_y` exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightRange {
    /// Lowest valid Y.
    pub min_y: i32,
    /// One past the highest valid Y.
    pub max_y: i32,
}

impl HeightRange {
    /// Creates a height range `[min_y, max_y)`.
    pub const fn new(min_y: i32, max_y: i32) -> Self {
        Self { min_y, max_y }
    }

    /// Returns `true` if `y` lies inside the range.
    pub fn contains(&self, y: i32) -> bool {
        (self.min_y..self.max_y).contains(&y)
    }
}

impl Default for HeightRange {
    fn default() -> Self {
        Self::new(-64, 320)
    }
}

/// One of the six axis-aligned directions a piston can push or pull along.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// -Z.
    North,
    /// +Z.
    South,
    /// +X.
    East,
    /// -X.
    West,
    /// +Y.
    Up,
    /// -Y.
    Down,
}

impl Direction {
    /// Unit offset `(dx, dy, dz)` for this direction.
    pub const fn offset(self) -> (i32, i32, i32) {
        match self {
            Self::North => (0, 0, -1),
            Self::South => (0, 0, 1),
            Self::East => (1, 0, 0),
            Self::West => (-1, 0, 0),
            Self::Up => (0, 1, 0),
            Self::Down => (0, -1, 0),
        }
    }

    /// The opposite direction.
    pub const fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::South => Self::North,
            Self::East => Self::West,
            Self::West => Self::East,
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Encodes a cell position as its region-local coordinate key.
pub fn encode_key(x: i32, y: i32, z: i32) -> String {
    format!("x{}y{}z{}", x & LOCAL_MASK, y, z & LOCAL_MASK)
}

/// Decodes a coordinate key back into the cell it names inside `region`.
///
/// Returns `None` for anything that is not a well-formed key with local
/// `x`/`z` in `[0, 15]` and `y` inside `height`. Region containers are shared
/// between tenants, so arbitrary strings end up here.
pub fn decode_key(key: &str, region: RegionId, height: HeightRange) -> Option<CellId> {
    let (lx, y, lz) = parse_key(key)?;
    if !(0..REGION_SIZE).contains(&lx) || !(0..REGION_SIZE).contains(&lz) {
        return None;
    }
    if !height.contains(y) {
        return None;
    }
    Some(region.cell_at(lx, y, lz))
}

fn parse_key(key: &str) -> Option<(i32, i32, i32)> {
    let rest = key.strip_prefix('x')?;
    let (lx, rest) = rest.split_once('y')?;
    let (y, lz) = rest.split_once('z')?;
    Some((lx.parse().ok()?, y.parse().ok()?, lz.parse().ok()?))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> WorldId {
        WorldId(Uuid::from_u128(7))
    }

    #[test]
    fn test_encode_uses_local_columns() {
        assert_eq!(encode_key(0, 64, 0), "x0y64z0");
        assert_eq!(encode_key(17, 5, 31), "x1y5z15");
        assert_eq!(encode_key(-1, -12, -16), "x15y-12z0");
    }

    #[test]
    fn test_roundtrip_reconstructs_cell() {
        let height = HeightRange::new(-64, 320);
        for &(x, y, z) in &[(0, 0, 0), (15, 319, 15), (-1, -64, -17), (1000, 70, -2049)] {
            let cell = CellId::new(world(), x, y, z);
            let decoded = decode_key(&cell.key(), cell.region(), height);
            assert_eq!(decoded, Some(cell), "roundtrip failed for ({x},{y},{z})");
        }
    }

    #[test]
    fn test_decode_rejects_out_of_range_columns() {
        let region = RegionId::new(world(), RegionPos::new(0, 0));
        let height = HeightRange::default();
        assert_eq!(decode_key("x16y0z0", region, height), None);
        assert_eq!(decode_key("x0y0z16", region, height), None);
        assert_eq!(decode_key("x-1y0z0", region, height), None);
        assert_eq!(decode_key("x0y0z-3", region, height), None);
    }

    #[test]
    fn test_decode_rejects_out_of_range_height() {
        let region = RegionId::new(world(), RegionPos::new(2, -3));
        let height = HeightRange::new(0, 256);
        assert_eq!(decode_key("x1y256z1", region, height), None);
        assert_eq!(decode_key("x1y-1z1", region, height), None);
        assert!(decode_key("x1y255z1", region, height).is_some());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let region = RegionId::new(world(), RegionPos::new(0, 0));
        let height = HeightRange::default();
        for key in ["", "protected", "x", "xyz", "x1y2", "y1x2z3", "x1y2z", "x1yaz3", "x1y2z3z"] {
            assert_eq!(decode_key(key, region, height), None, "accepted {key:?}");
        }
    }

    #[test]
    fn test_region_of_negative_coordinates() {
        assert_eq!(CellPos::new(-1, 0, -16).region(), RegionPos::new(-1, -1));
        assert_eq!(CellPos::new(-17, 0, 16).region(), RegionPos::new(-2, 1));
        assert_eq!(RegionPos::containing(31, 32), RegionPos::new(1, 2));
    }

    #[test]
    fn test_direction_offsets_are_opposite() {
        for dir in [
            Direction::North,
            Direction::South,
            Direction::East,
            Direction::West,
            Direction::Up,
            Direction::Down,
        ] {
            let p = CellPos::new(3, 4, 5);
            assert_eq!(p.relative(dir).relative(dir.opposite()), p);
        }
    }

    #[test]
    fn test_relative_wraps_at_coordinate_bounds() {
        let edge = CellPos::new(i32::MAX, 0, i32::MIN);
        assert_eq!(edge.relative(Direction::East).x, i32::MIN);
        assert_eq!(edge.relative(Direction::North).z, i32::MAX);
        assert_eq!(edge.relative(Direction::East).relative(Direction::West), edge);
    }
}
