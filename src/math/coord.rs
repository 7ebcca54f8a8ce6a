use std::fmt;

use crate::world::io::region::coord::RegionCoord;

/// The four horizontal neighbors of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinal {
	East,	// +X
	West,	// -X
	South,	// +Z
	North,	// -Z
}

impl Cardinal {
	pub const ALL: [Cardinal; 4] = [
		Cardinal::West,
		Cardinal::East,
		Cardinal::North,
		Cardinal::South,
	];

	#[inline(always)]
	pub fn coord(self) -> (i32, i32) {
		match self {
			Cardinal::East => (1, 0),
			Cardinal::West => (-1, 0),
			Cardinal::South => (0, 1),
			Cardinal::North => (0, -1),
		}
	}
}

/// Position of a chunk within a dimension, in chunk units.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkPos {
	pub x: i32,
	pub z: i32,
}

/// Position of a region file within a dimension, in region units (32 chunks).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionPos {
	pub x: i32,
	pub z: i32,
}

impl ChunkPos {
	#[inline(always)]
	pub const fn new(x: i32, z: i32) -> Self {
		Self { x, z }
	}

	/// The region that stores this chunk.
	#[inline(always)]
	pub const fn region(self) -> RegionPos {
		RegionPos::new(self.x >> 5, self.z >> 5)
	}

	/// The slot of this chunk inside its region file.
	#[inline(always)]
	pub fn region_coord(self) -> RegionCoord {
		RegionCoord::from((self.x, self.z))
	}

	#[inline(always)]
	pub fn neighbor(self, direction: Cardinal) -> Self {
		let (dx, dz) = direction.coord();
		Self::new(self.x + dx, self.z + dz)
	}

	/// The four axis-adjacent chunks, in [Cardinal::ALL] order.
	pub fn neighbors(self) -> [ChunkPos; 4] {
		Cardinal::ALL.map(|direction| self.neighbor(direction))
	}
}

impl RegionPos {
	#[inline(always)]
	pub const fn new(x: i32, z: i32) -> Self {
		Self { x, z }
	}

	/// The absolute chunk position of a slot in this region.
	pub fn chunk_at(self, coord: RegionCoord) -> ChunkPos {
		ChunkPos::new(
			(self.x << 5) + coord.x(),
			(self.z << 5) + coord.z(),
		)
	}

	/// Tests if the chunk is stored in this region.
	pub fn contains(self, chunk: ChunkPos) -> bool {
		chunk.region() == self
	}

	/// `r.<x>.<z>.mca`
	pub fn file_name(self) -> String {
		format!("r.{}.{}.mca", self.x, self.z)
	}

	/// Parses a region file name of the form `r.<x>.<z>.mca`.
	pub fn from_file_name(name: &str) -> Option<Self> {
		let mut parts = name.split('.');
		if parts.next()? != "r" {
			return None;
		}
		let x = parts.next()?.parse().ok()?;
		let z = parts.next()?.parse().ok()?;
		if parts.next()? != "mca" || parts.next().is_some() {
			return None;
		}
		Some(Self::new(x, z))
	}
}

impl From<(i32, i32)> for ChunkPos {
	fn from(value: (i32, i32)) -> Self {
		Self::new(value.0, value.1)
	}
}

impl From<ChunkPos> for (i32, i32) {
	fn from(value: ChunkPos) -> Self {
		(value.x, value.z)
	}
}

impl From<ChunkPos> for RegionCoord {
	fn from(value: ChunkPos) -> Self {
		value.region_coord()
	}
}

impl fmt::Display for ChunkPos {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "({}, {})", self.x, self.z)
	}
}

impl fmt::Display for RegionPos {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "r({}, {})", self.x, self.z)
	}
}
