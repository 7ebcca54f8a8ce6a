use std::ops::Range;
use std::io::{
	Read, Write,
	SeekFrom,
};

use crate::ioext::*;
use crate::McResult;

/// An entry of the offset table. Start sector and sector count are
/// packed together as `|Offset:3|Size:1|`.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct RegionSector(u32);

impl RegionSector {
	/// Provide offset and size in 4KiB sectors.
	pub const fn new(offset: u32, size: u8) -> Self {
		Self((offset << 8) | size as u32)
	}

	/// Creates a new empty RegionSector.
	pub const fn empty() -> Self {
		Self(0)
	}

	/// The 4KiB sector offset.
	pub const fn sector_offset(self) -> u32 {
		self.0 >> 8
	}

	/// The 4KiB sector that follows the last sector of this allocation.
	pub const fn sector_end_offset(self) -> u32 {
		self.sector_offset() + self.sector_count()
	}

	/// The 4KiB sector count.
	pub const fn sector_count(self) -> u32 {
		self.0 & 0xFF
	}

	/// The offset in bytes that this sector begins at in the region file.
	pub const fn offset(self) -> u64 {
		self.sector_offset() as u64 * 4096
	}

	/// The size in bytes that this sector occupies.
	pub const fn size(self) -> u64 {
		self.sector_count() as u64 * 4096
	}

	/// An offset of 0 means the chunk is absent.
	pub const fn is_empty(self) -> bool {
		self.0 == 0
	}

	/// The sector indices this allocation covers.
	pub fn range(self) -> Range<usize> {
		self.sector_offset() as usize..self.sector_end_offset() as usize
	}

	/// Tests if two sectors intersect.
	pub fn intersects(self, rhs: Self) -> bool {
		!(self.sector_end_offset() <= rhs.sector_offset()
			|| rhs.sector_end_offset() <= self.sector_offset())
	}
}

impl From<RegionSector> for u32 {
	fn from(value: RegionSector) -> Self {
		value.0
	}
}

impl From<u32> for RegionSector {
	fn from(value: u32) -> Self {
		Self(value)
	}
}

impl Readable for RegionSector {
	fn read_from<R: Read>(reader: &mut R) -> McResult<Self> {
		Ok(Self(reader.read_value()?))
	}
}

impl Writable for RegionSector {
	fn write_to<W: Write>(&self, writer: &mut W) -> McResult<usize> {
		writer.write_value(self.0)
	}
}

impl Seekable for RegionSector {
	/// A [SeekFrom] that points to the first byte of this allocation.
	fn seeker(&self) -> SeekFrom {
		SeekFrom::Start(self.offset())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn packing() {
		let sector = RegionSector::new(0x123456, 3);
		assert_eq!(u32::from(sector), 0x12345603);
		assert_eq!(sector.sector_offset(), 0x123456);
		assert_eq!(sector.sector_count(), 3);
		assert_eq!(sector.range(), 0x123456..0x123459);
		assert_eq!(sector.seeker(), SeekFrom::Start(0x123456 * 4096));
	}

	#[test]
	fn intersection() {
		let a = RegionSector::new(2, 2);
		assert!(a.intersects(RegionSector::new(3, 1)));
		assert!(!a.intersects(RegionSector::new(4, 1)));
		assert!(!RegionSector::new(4, 1).intersects(a));
	}
}
