use std::io::SeekFrom;

/// A region file contains up to 1024 chunks, which is 32x32 chunks.
/// This struct represents a chunk coordinate within a region file.
/// The coordinate can be an absolute coordinate and it will be
/// normalized to relative coordinates.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct RegionCoord(u16);

impl RegionCoord {
	/// Create a new RegionCoord.
	/// `(32, 32)` and `(-32, 0)` both become `(0, 0)`.
	pub const fn new(x: u16, z: u16) -> Self {
		Self((x & 31) | ((z & 31) << 5))
	}

	/// The slot at `index` (`x + z * 32`).
	pub const fn from_index(index: usize) -> Self {
		Self((index & 1023) as u16)
	}

	/// Every slot of a region in table order.
	pub fn all() -> impl Iterator<Item = RegionCoord> {
		(0..1024).map(RegionCoord::from_index)
	}

	pub const fn index(self) -> usize {
		self.0 as usize
	}

	pub const fn x(self) -> i32 {
		(self.0 & 31) as i32
	}

	pub const fn z(self) -> i32 {
		((self.0 >> 5) & 31) as i32
	}

	/// Where this chunk's entry is stored in the offset table.
	pub const fn sector_table_offset(self) -> SeekFrom {
		SeekFrom::Start(self.0 as u64 * 4)
	}

	/// Where this chunk's entry is stored in the timestamp table.
	pub const fn timestamp_table_offset(self) -> SeekFrom {
		SeekFrom::Start(self.0 as u64 * 4 + 4096)
	}
}

impl From<(i32, i32)> for RegionCoord {
	fn from(value: (i32, i32)) -> Self {
		Self::new(value.0 as u16, value.1 as u16)
	}
}

impl std::fmt::Display for RegionCoord {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "({}, {})", self.x(), self.z())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn slots() {
		let coord = RegionCoord::from((33, -1));
		assert_eq!((coord.x(), coord.z()), (1, 31));
		assert_eq!(coord.index(), 1 + 31 * 32);
		assert_eq!(coord.sector_table_offset(), SeekFrom::Start(coord.index() as u64 * 4));
		assert_eq!(RegionCoord::all().count(), 1024);
		assert_eq!(RegionCoord::from_index(1023), RegionCoord::new(31, 31));
	}
}
