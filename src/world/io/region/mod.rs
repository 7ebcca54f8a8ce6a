pub mod header;
pub mod sector;
pub mod timestamp;
pub mod coord;
pub mod compressionscheme;
pub mod sectormanager;
pub mod regionfile;

pub use regionfile::{
	RegionFile,
	RepairReport,
};
pub use compressionscheme::CompressionScheme;
pub use coord::RegionCoord;
pub use sector::RegionSector;
pub use timestamp::Timestamp;

/// Size in bytes of a single sector.
pub const SECTOR_SIZE: u64 = 4096;

/// Sector 0 holds the offset table, sector 1 holds the timestamp table.
pub const HEADER_SECTORS: u32 = 2;

/// The sector count of an offset entry is a single byte, so a record
/// may span at most this many sectors.
pub const MAX_RECORD_SECTORS: u32 = 255;

/// Tests if a value is a multiple of 4096.
pub const fn is_multiple_of_4096(n: u64) -> bool {
	(n & 4095) == 0
}

/// Counts the number of 4KiB sectors required to accomodate `size` bytes.
pub const fn required_sectors(size: u64) -> u64 {
	let sub = size >> 12;
	let overflow = !is_multiple_of_4096(size) as u64;
	sub + overflow
}

/// The number of bytes that must be added to `size` to make it a multiple
/// of 4096.
pub const fn pad_size(size: u64) -> u64 {
	(4096 - (size & 4095)) & 4095
}
