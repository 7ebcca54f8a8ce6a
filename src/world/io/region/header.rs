use crate::{
	ioext::*,
	McResult,
};

use super::sector::*;
use super::timestamp::*;
use super::coord::*;

use std::{
	io::{
		Read, Write,
		SeekFrom,
	},
	ops::{
		Index, IndexMut,
	},
};

/// Defines where in the file the table for a type begins.
/// Implemented for [RegionSector] and [Timestamp].
pub trait RegionTableItem {
	/// The offset in the file that this type's table begins.
	const OFFSET: u64;
}

impl RegionTableItem for RegionSector {
	const OFFSET: u64 = 0;
}

impl RegionTableItem for Timestamp {
	const OFFSET: u64 = 4096;
}

/// A table of 1024 elements, one per chunk slot of a region file.
#[derive(Debug, Clone)]
pub struct RegionTable<T: RegionTableItem>(Box<[T; 1024]>);

/// Where each chunk lives in the file.
pub type SectorTable = RegionTable<RegionSector>;

/// When each chunk was last written.
pub type TimestampTable = RegionTable<Timestamp>;

/// The two sectors at the beginning of every region file.
#[derive(Debug, Clone, Default)]
pub struct RegionHeader {
	pub sectors: SectorTable,
	pub timestamps: TimestampTable,
}

impl<T: RegionTableItem> RegionTable<T> {
	/// Returns a [SeekFrom] value that will seek to the
	/// beginning of the table.
	pub const fn seeker() -> SeekFrom {
		SeekFrom::Start(T::OFFSET)
	}

	pub fn iter(&self) -> std::slice::Iter<'_, T> {
		self.0.iter()
	}
}

impl<T: Default + Copy + RegionTableItem> Default for RegionTable<T> {
	fn default() -> Self {
		Self(Box::new([T::default(); 1024]))
	}
}

impl<T: RegionTableItem> Index<RegionCoord> for RegionTable<T> {
	type Output = T;

	fn index(&self, index: RegionCoord) -> &Self::Output {
		&self.0[index.index()]
	}
}

impl<T: RegionTableItem> IndexMut<RegionCoord> for RegionTable<T> {
	fn index_mut(&mut self, index: RegionCoord) -> &mut Self::Output {
		&mut self.0[index.index()]
	}
}

impl<T: Readable + Default + Copy + RegionTableItem> Readable for RegionTable<T> {
	fn read_from<R: Read>(reader: &mut R) -> McResult<Self> {
		let mut table = Self::default();
		for item in table.0.iter_mut() {
			*item = T::read_from(reader)?;
		}
		Ok(table)
	}
}

impl<T: Writable + RegionTableItem> Writable for RegionTable<T> {
	fn write_to<W: Write>(&self, writer: &mut W) -> McResult<usize> {
		let mut write_size: usize = 0;
		for item in self.0.iter() {
			write_size += item.write_to(writer)?;
		}
		Ok(write_size)
	}
}

impl Readable for RegionHeader {
	fn read_from<R: Read>(reader: &mut R) -> McResult<Self> {
		Ok(Self {
			sectors: SectorTable::read_from(reader)?,
			timestamps: TimestampTable::read_from(reader)?,
		})
	}
}

impl Writable for RegionHeader {
	fn write_to<W: Write>(&self, writer: &mut W) -> McResult<usize> {
		Ok(
			self.sectors.write_to(writer)? + self.timestamps.write_to(writer)?
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn header_is_two_sectors() {
		let mut header = RegionHeader::default();
		let coord = RegionCoord::new(3, 4);
		header.sectors[coord] = RegionSector::new(2, 1);
		header.timestamps[coord] = Timestamp::new(99);
		let mut buffer = Vec::new();
		assert_eq!(header.write_to(&mut buffer).unwrap(), 8192);
		assert_eq!(&buffer[coord.index() * 4..coord.index() * 4 + 4], &[0, 0, 2, 1]);
		let read = RegionHeader::read_from(&mut buffer.as_slice()).unwrap();
		assert_eq!(read.sectors[coord], RegionSector::new(2, 1));
		assert_eq!(read.timestamps[coord], Timestamp::new(99));
		assert_eq!(SectorTable::seeker(), SeekFrom::Start(0));
		assert_eq!(TimestampTable::seeker(), SeekFrom::Start(4096));
	}
}
