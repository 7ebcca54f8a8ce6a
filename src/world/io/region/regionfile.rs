use std::{
	fs::File,
	io::{
		Read, Write,
		Seek, SeekFrom,
		ErrorKind,
	},
	ops::{Deref, DerefMut},
	path::{Path, PathBuf},
};

use log::{debug, info, warn};

use crate::{
	McResult, McError,
	ioext::*,
	math::coord::{ChunkPos, RegionPos},
	world::codec::chunk_position,
	world::options::RegionOptions,
};

use super::{
	header::*,
	sector::*,
	coord::*,
	timestamp::*,
	compressionscheme::*,
	sectormanager::*,
	required_sectors,
	pad_size,
	is_multiple_of_4096,
	SECTOR_SIZE,
	MAX_RECORD_SECTORS,
};

/// Outcome of [RegionFile::repair].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
	/// Records whose slot was cleared.
	pub deleted: usize,
	/// Misplaced records that were moved into their own empty slot.
	pub recovered: usize,
}

/// Either the handle held by the [RegionFile] or one opened for a single
/// operation.
enum Handle<'a> {
	Held(&'a mut File),
	Opened(File),
}

impl Deref for Handle<'_> {
	type Target = File;

	fn deref(&self) -> &File {
		match self {
			Handle::Held(file) => file,
			Handle::Opened(file) => file,
		}
	}
}

impl DerefMut for Handle<'_> {
	fn deref_mut(&mut self) -> &mut File {
		match self {
			Handle::Held(file) => file,
			Handle::Opened(file) => file,
		}
	}
}

fn open_file(path: &Path, read_only: bool) -> McResult<File> {
	Ok(if read_only {
		File::open(path)?
	} else {
		File::options().read(true).write(true).create(true).open(path)?
	})
}

fn handle<'a>(slot: &'a mut Option<File>, path: &Path, read_only: bool) -> McResult<Handle<'a>> {
	Ok(match slot {
		Some(file) => Handle::Held(file),
		None => Handle::Opened(open_file(path, read_only)?),
	})
}

fn read_record_from(file: &mut File, pos: ChunkPos, sector: RegionSector) -> McResult<(CompressionScheme, Vec<u8>)> {
	file.seek(sector.seeker())?;
	let length: u32 = file.read_value()?;
	if length == 0 || length as u64 + 4 > sector.size() {
		return Err(McError::malformed(pos.x, pos.z, format!(
			"record length {} does not fit in {} sectors",
			length,
			sector.sector_count(),
		)));
	}
	let scheme = CompressionScheme::read_from(file)?;
	let mut payload = vec![0u8; length as usize - 1];
	file.read_exact(&mut payload)?;
	Ok((scheme, payload))
}

/// A region file: up to 1024 compressed chunk records stored in 4KiB
/// sectors behind an offset table and a timestamp table.
pub struct RegionFile {
	path: PathBuf,
	position: RegionPos,
	options: RegionOptions,
	header: RegionHeader,
	sectors: SectorManager,
	handle: Option<File>,
}

impl RegionFile {
	/// Opens (or creates) the region file at `path`.
	/// A file shorter than the header is padded to two sectors and a file
	/// whose length is not a multiple of 4096 is padded to the next
	/// sector. If any allocation points outside of the file or overlaps
	/// another, the file is repaired before it is returned.
	pub fn open<P: AsRef<Path>>(path: P, position: RegionPos, options: RegionOptions) -> McResult<Self> {
		let path = path.as_ref().to_path_buf();
		let mut file = open_file(&path, options.read_only)?;
		let mut length = file.metadata()?.len();
		if !options.read_only {
			let padding = if length < SECTOR_SIZE * 2 {
				SECTOR_SIZE * 2 - length
			} else {
				pad_size(length)
			};
			if padding != 0 {
				debug!("Padding region file {} with {} bytes", path.display(), padding);
				file.seek(SeekFrom::End(0))?;
				file.write_zeroes(padding)?;
				file.flush()?;
				length += padding;
			}
		}
		let header = if length >= SECTOR_SIZE * 2 {
			file.seek(SeekFrom::Start(0))?;
			RegionHeader::read_from(&mut (&mut file).take(SECTOR_SIZE * 2))?
		} else {
			RegionHeader::default()
		};
		debug_assert!(options.read_only || is_multiple_of_4096(length));
		let sectors = SectorManager::new(required_sectors(length) as usize);
		let mut region = Self {
			path,
			position,
			handle: if options.hold_handles { Some(file) } else { None },
			options,
			header,
			sectors,
		};
		let mut malformed = 0usize;
		for coord in RegionCoord::all() {
			let sector = region.header.sectors[coord];
			if sector.is_empty() {
				continue;
			}
			if !region.sectors.claim(sector) {
				debug!(
					"Chunk {} in {} has an invalid allocation {}..{}",
					position.chunk_at(coord),
					region.path.display(),
					sector.sector_offset(),
					sector.sector_end_offset(),
				);
				malformed += 1;
			}
		}
		if malformed != 0 {
			let error = McError::RegionMalformed(format!(
				"{} has {} invalid or overlapping allocations",
				region.path.display(),
				malformed,
			));
			warn!("{error}, repairing.");
			region.repair()?;
		}
		Ok(region)
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn position(&self) -> RegionPos {
		self.position
	}

	pub fn sector_manager(&self) -> &SectorManager {
		&self.sectors
	}

	pub fn sector<C: Into<RegionCoord>>(&self, coord: C) -> RegionSector {
		self.header.sectors[coord.into()]
	}

	pub fn timestamp<C: Into<RegionCoord>>(&self, coord: C) -> Timestamp {
		self.header.timestamps[coord.into()]
	}

	pub fn contains<C: Into<RegionCoord>>(&self, coord: C) -> bool {
		!self.sector(coord).is_empty()
	}

	/// Absolute positions of every chunk present in this region.
	pub fn chunk_positions(&self) -> Vec<ChunkPos> {
		RegionCoord::all()
			.filter(|&coord| !self.header.sectors[coord].is_empty())
			.map(|coord| self.position.chunk_at(coord))
			.collect()
	}

	pub fn chunk_count(&self) -> usize {
		self.header.sectors.iter().filter(|sector| !sector.is_empty()).count()
	}

	fn handle(&mut self) -> McResult<Handle<'_>> {
		handle(&mut self.handle, &self.path, self.options.read_only)
	}

	/// Reads the record stored at `sector` without decompressing it.
	/// Records that do not fit their allocation or end early are reported
	/// as malformed.
	fn read_record(&mut self, pos: ChunkPos, sector: RegionSector) -> McResult<(CompressionScheme, Vec<u8>)> {
		let mut file = self.handle()?;
		read_record_from(&mut file, pos, sector).map_err(|err| match err {
			McError::IoError(io) if io.kind() == ErrorKind::UnexpectedEof => {
				McError::malformed(pos.x, pos.z, "record ends past the end of the file")
			}
			McError::InvalidCompressionScheme(scheme) => {
				McError::malformed(pos.x, pos.z, format!("unknown compression scheme {scheme}"))
			}
			other => other,
		})
	}

	/// Reads the compressed record of a chunk exactly as it is stored.
	pub fn read_compressed<C: Into<RegionCoord>>(&mut self, coord: C) -> McResult<(CompressionScheme, Vec<u8>)> {
		let coord: RegionCoord = coord.into();
		let pos = self.position.chunk_at(coord);
		let sector = self.header.sectors[coord];
		if sector.is_empty() || !self.sectors.in_bounds(sector) {
			return Err(McError::ChunkNotPresent(pos.x, pos.z));
		}
		self.read_record(pos, sector)
	}

	/// Reads and decompresses the record of a chunk.
	pub fn read_chunk<C: Into<RegionCoord>>(&mut self, coord: C) -> McResult<Vec<u8>> {
		let coord: RegionCoord = coord.into();
		let pos = self.position.chunk_at(coord);
		let (scheme, payload) = self.read_compressed(coord)?;
		scheme.decompress(&payload)
			.map_err(|err| McError::malformed(pos.x, pos.z, format!("decompression failed: {err}")))
	}

	/// Compresses `data` with the configured scheme and stores it.
	pub fn write_chunk<C: Into<RegionCoord>>(&mut self, coord: C, data: &[u8]) -> McResult<RegionSector> {
		let scheme = self.options.compression;
		let payload = scheme.compress(data)?;
		self.write_compressed(coord, scheme, &payload)
	}

	/// Stores an already compressed record.
	/// The record is written in place when its current allocation is large
	/// enough. Otherwise it moves to the first run of free sectors that
	/// fits, or to the end of the file. The header entries are written
	/// after the record.
	pub fn write_compressed<C: Into<RegionCoord>>(&mut self, coord: C, scheme: CompressionScheme, payload: &[u8]) -> McResult<RegionSector> {
		if self.options.read_only {
			return Err(McError::ReadOnly);
		}
		let coord: RegionCoord = coord.into();
		let pos = self.position.chunk_at(coord);
		let total = payload.len() as u64 + 5;
		let needed = required_sectors(total);
		if needed > MAX_RECORD_SECTORS as u64 {
			return Err(McError::ChunkTooBig {
				x: pos.x,
				z: pos.z,
				sectors: needed.min(u32::MAX as u64) as u32,
			});
		}
		let old = self.header.sectors[coord];
		let sector = self.sectors.reallocate_err(old, needed as u8)?;
		let mut buffer = Vec::with_capacity(sector.size() as usize);
		buffer.write_value((payload.len() + 1) as u32)?;
		buffer.write_value(scheme)?;
		buffer.extend_from_slice(payload);
		buffer.write_zeroes(pad_size(total))?;
		let timestamp = Timestamp::utc_now();
		self.header.sectors[coord] = sector;
		self.header.timestamps[coord] = timestamp;
		let mut file = self.handle()?;
		file.seek(sector.seeker())?;
		file.write_all(&buffer)?;
		file.seek(coord.sector_table_offset())?;
		file.write_value(sector)?;
		file.seek(coord.timestamp_table_offset())?;
		file.write_value(timestamp)?;
		file.flush()?;
		Ok(sector)
	}

	/// Frees the sectors of a chunk and zeroes its offset and timestamp.
	/// Returns false if the chunk was not present.
	pub fn delete_chunk<C: Into<RegionCoord>>(&mut self, coord: C) -> McResult<bool> {
		if self.options.read_only {
			return Err(McError::ReadOnly);
		}
		let coord: RegionCoord = coord.into();
		let sector = self.header.sectors[coord];
		if sector.is_empty() {
			return Ok(false);
		}
		if self.sectors.in_bounds(sector) {
			self.sectors.free(sector);
		}
		self.header.sectors[coord] = RegionSector::empty();
		self.header.timestamps[coord] = Timestamp::default();
		let mut file = self.handle()?;
		file.seek(coord.sector_table_offset())?;
		file.write_value(RegionSector::empty())?;
		file.seek(coord.timestamp_table_offset())?;
		file.write_value(Timestamp::default())?;
		file.flush()?;
		Ok(true)
	}

	/// Checks a single record during repair. Accepted records claim their
	/// sectors in `claimed`. A record stored in the wrong slot of this
	/// region is handed back through `misplaced`.
	fn check_record(
		&mut self,
		coord: RegionCoord,
		sector: RegionSector,
		claimed: &mut SectorManager,
		misplaced: &mut Vec<(RegionCoord, CompressionScheme, Vec<u8>)>,
	) -> McResult<()> {
		let expected = self.position.chunk_at(coord);
		if !claimed.in_bounds(sector) {
			return Err(McError::RegionMalformed(format!(
				"sectors {}..{} are outside of the file",
				sector.sector_offset(),
				sector.sector_end_offset(),
			)));
		}
		let (scheme, payload) = self.read_record(expected, sector)?;
		let data = scheme.decompress(&payload)?;
		let found = chunk_position(&data)?;
		if found != expected {
			if self.position.contains(found) {
				misplaced.push((found.region_coord(), scheme, payload));
			}
			return Err(McError::RegionMalformed(format!(
				"chunk {found} was found in the slot reserved for {expected}"
			)));
		}
		if !claimed.claim(sector) {
			return Err(McError::RegionMalformed(format!(
				"sectors {}..{} overlap another chunk",
				sector.sector_offset(),
				sector.sector_end_offset(),
			)));
		}
		Ok(())
	}

	/// Validates every record: it must lie inside the file, decode, carry
	/// the coordinates of its slot, and not overlap a record accepted
	/// before it. Slots failing any check are cleared. A record found in
	/// the wrong slot is moved to its own slot when that slot is empty.
	/// Only I/O failures while rewriting the header are returned as errors.
	pub fn repair(&mut self) -> McResult<RepairReport> {
		let mut report = RepairReport::default();
		let mut claimed = SectorManager::new(self.sectors.len());
		let mut misplaced = Vec::new();
		for coord in RegionCoord::all() {
			let sector = self.header.sectors[coord];
			if sector.is_empty() {
				continue;
			}
			if let Err(err) = self.check_record(coord, sector, &mut claimed, &mut misplaced) {
				info!(
					"Unexpected chunk data at sector {} in {}: {}",
					sector.sector_offset(),
					self.path.display(),
					err,
				);
				self.header.sectors[coord] = RegionSector::empty();
				self.header.timestamps[coord] = Timestamp::default();
				report.deleted += 1;
			}
		}
		self.sectors = claimed;
		if self.options.read_only {
			if !misplaced.is_empty() {
				debug!("Not recovering {} misplaced chunks in a read-only region.", misplaced.len());
			}
			info!("Repair of {} complete. Removed {} chunks (in memory only).", self.path.display(), report.deleted);
			return Ok(report);
		}
		{
			let header = &self.header;
			let mut file = handle(&mut self.handle, &self.path, false)?;
			file.seek(SeekFrom::Start(0))?;
			let mut buffer = Vec::with_capacity(SECTOR_SIZE as usize * 2);
			header.write_to(&mut buffer)?;
			file.write_all(&buffer)?;
			file.flush()?;
		}
		for (coord, scheme, payload) in misplaced {
			if !self.header.sectors[coord].is_empty() {
				continue;
			}
			info!("Found chunk {} and its slot is empty, recovering it.", self.position.chunk_at(coord));
			self.write_compressed(coord, scheme, &payload)?;
			report.recovered += 1;
		}
		info!(
			"Repair of {} complete. Removed {} chunks, recovered {} chunks, net {}",
			self.path.display(),
			report.deleted,
			report.recovered,
			report.recovered as isize - report.deleted as isize,
		);
		Ok(report)
	}

	/// Flushes and releases the file handle.
	pub fn close(mut self) -> McResult<()> {
		if let Some(file) = self.handle.take() {
			if !self.options.read_only {
				file.sync_all()?;
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::compound;
	use crate::nbt::io::to_bytes;
	use rand::{Rng, RngCore, SeedableRng, rngs::StdRng};

	fn record(pos: ChunkPos, filler: usize) -> Vec<u8> {
		let tag = compound! {
			("Level", compound! {
				("xPos", pos.x),
				("zPos", pos.z),
				("Filler", (0..filler).map(|i| (i * 31 % 251) as i8).collect::<Vec<i8>>()),
			}),
		};
		to_bytes("", &tag).unwrap()
	}

	fn open(path: &Path) -> RegionFile {
		RegionFile::open(path, RegionPos::new(0, 0), RegionOptions::default()).unwrap()
	}

	fn assert_consistent(region: &RegionFile) {
		let manager = region.sector_manager();
		let sectors: Vec<RegionSector> = RegionCoord::all()
			.map(|coord| region.sector(coord))
			.filter(|sector| !sector.is_empty())
			.collect();
		for (i, a) in sectors.iter().enumerate() {
			for b in sectors[i + 1..].iter() {
				assert!(!a.intersects(*b), "{a:?} overlaps {b:?}");
			}
		}
		let used: usize = sectors.iter().map(|s| s.sector_count() as usize).sum();
		assert_eq!(manager.free_count() + used + 2, manager.len());
		for sector in sectors {
			assert!(sector.range().all(|index| !manager.is_free(index)));
		}
		let length = std::fs::metadata(region.path()).unwrap().len();
		assert_eq!(length, manager.len() as u64 * 4096);
	}

	#[test]
	fn write_read_reopen() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("r.0.0.mca");
		let a = record(ChunkPos::new(3, 4), 100);
		let b = record(ChunkPos::new(31, 31), 9000);
		{
			let mut region = open(&path);
			assert_eq!(std::fs::metadata(&path).unwrap().len(), 8192);
			region.write_chunk(ChunkPos::new(3, 4), &a).unwrap();
			region.write_chunk(ChunkPos::new(31, 31), &b).unwrap();
			assert_eq!(region.read_chunk(ChunkPos::new(3, 4)).unwrap(), a);
			assert!(region.timestamp(ChunkPos::new(3, 4)).seconds() > 0);
			region.close().unwrap();
		}
		let mut region = open(&path);
		assert_eq!(region.chunk_positions(), vec![ChunkPos::new(3, 4), ChunkPos::new(31, 31)]);
		assert_eq!(region.read_chunk(ChunkPos::new(31, 31)).unwrap(), b);
		assert!(matches!(
			region.read_chunk(ChunkPos::new(0, 0)),
			Err(McError::ChunkNotPresent(0, 0)),
		));
		assert_consistent(&region);
	}

	#[test]
	fn lazy_handles() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("r.-1.0.mca");
		let options = RegionOptions {
			hold_handles: false,
			compression: CompressionScheme::GZip,
			..RegionOptions::default()
		};
		let pos = ChunkPos::new(-5, 7);
		let data = record(pos, 10);
		let mut region = RegionFile::open(&path, RegionPos::new(-1, 0), options).unwrap();
		region.write_chunk(pos, &data).unwrap();
		assert_eq!(region.read_compressed(pos).unwrap().0, CompressionScheme::GZip);
		assert_eq!(region.read_chunk(pos).unwrap(), data);
	}

	#[test]
	fn too_big() {
		let dir = tempfile::tempdir().unwrap();
		let mut region = open(&dir.path().join("r.0.0.mca"));
		let mut data = vec![0u8; 1_100_000];
		StdRng::seed_from_u64(1).fill_bytes(&mut data);
		let result = region.write_chunk((1, 1), &data);
		assert!(matches!(result, Err(McError::ChunkTooBig { x: 1, z: 1, sectors }) if sectors >= 256));
		assert!(!region.contains((1, 1)));
		assert_consistent(&region);
	}

	#[test]
	fn allocator_invariant() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("r.0.0.mca");
		let mut rng = StdRng::seed_from_u64(42);
		let mut expected = std::collections::HashMap::new();
		{
			let mut region = open(&path);
			for step in 0..300 {
				let pos = ChunkPos::new(rng.gen_range(0..6), rng.gen_range(0..6));
				if step % 17 == 0 {
					region.delete_chunk(pos).unwrap();
					expected.remove(&pos);
					continue;
				}
				// random bytes do not compress, so sizes really vary
				let mut noise = vec![0u8; rng.gen_range(0..20000)];
				rng.fill_bytes(&mut noise);
				region.write_chunk(pos, &noise).unwrap();
				expected.insert(pos, noise);
				assert_consistent(&region);
			}
		}
		let mut region = open(&path);
		assert_consistent(&region);
		assert_eq!(region.chunk_count(), expected.len());
		for (pos, data) in expected {
			assert_eq!(region.read_chunk(pos).unwrap(), data);
		}
	}

	#[test]
	fn shrinking_record_stays_in_place() {
		let dir = tempfile::tempdir().unwrap();
		let mut region = open(&dir.path().join("r.0.0.mca"));
		let mut noise = vec![0u8; 3 * 4096];
		StdRng::seed_from_u64(3).fill_bytes(&mut noise);
		let big = region.write_chunk((0, 0), &noise).unwrap();
		assert!(big.sector_count() >= 3);
		let small = region.write_chunk((0, 0), b"tiny").unwrap();
		assert_eq!(small, RegionSector::new(big.sector_offset(), 1));
		assert_consistent(&region);
	}

	#[test]
	fn repair_after_corruption() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("r.0.0.mca");
		let positions: Vec<ChunkPos> = (0..12).map(|i| ChunkPos::new(i, i / 3)).collect();
		let mut region = open(&path);
		for (i, &pos) in positions.iter().enumerate() {
			region.write_chunk(pos, &record(pos, i * 2000)).unwrap();
		}
		let victim = region.sector(positions[5]);
		region.close().unwrap();
		// zero a byte range inside the data of a single chunk
		{
			let mut bytes = std::fs::read(&path).unwrap();
			let start = victim.offset() as usize;
			bytes[start..start + 64].fill(0);
			std::fs::write(&path, bytes).unwrap();
		}
		let mut region = open(&path);
		let report = region.repair().unwrap();
		assert_eq!(report, RepairReport { deleted: 1, recovered: 0 });
		assert!(!region.contains(positions[5]));
		for (i, &pos) in positions.iter().enumerate() {
			if i != 5 {
				assert_eq!(region.read_chunk(pos).unwrap(), record(pos, i * 2000));
			}
		}
		assert_consistent(&region);
		// repairing a healthy file changes nothing
		assert_eq!(region.repair().unwrap(), RepairReport::default());
	}

	#[test]
	fn repair_relocates_misplaced_chunk() {
		let dir = tempfile::tempdir().unwrap();
		let mut region = open(&dir.path().join("r.0.0.mca"));
		let data = record(ChunkPos::new(1, 1), 50);
		region.write_chunk((2, 2), &data).unwrap();
		let report = region.repair().unwrap();
		assert_eq!(report, RepairReport { deleted: 1, recovered: 1 });
		assert!(!region.contains((2, 2)));
		assert_eq!(region.read_chunk((1, 1)).unwrap(), data);
		assert_consistent(&region);
	}

	#[test]
	fn overlap_triggers_repair_at_open() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("r.0.0.mca");
		let a = ChunkPos::new(0, 0);
		let b = ChunkPos::new(1, 0);
		{
			let mut region = open(&path);
			region.write_chunk(a, &record(a, 10)).unwrap();
			region.write_chunk(b, &record(b, 10)).unwrap();
			region.close().unwrap();
		}
		// point b at a's sectors
		{
			let mut bytes = std::fs::read(&path).unwrap();
			let (ia, ib) = (a.region_coord().index() * 4, b.region_coord().index() * 4);
			let entry: Vec<u8> = bytes[ia..ia + 4].to_vec();
			bytes[ib..ib + 4].copy_from_slice(&entry);
			std::fs::write(&path, bytes).unwrap();
		}
		let mut region = open(&path);
		assert!(region.contains(a));
		assert!(!region.contains(b));
		assert_eq!(region.read_chunk(a).unwrap(), record(a, 10));
		assert_consistent(&region);
	}

	#[test]
	fn out_of_bounds_allocation_and_short_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("r.0.0.mca");
		// header entry for slot 0 pointing far past the end, file not sector aligned
		let mut bytes = vec![0u8; 8192 + 100];
		bytes[0..4].copy_from_slice(&[0, 0, 40, 1]);
		std::fs::write(&path, bytes).unwrap();
		let mut region = open(&path);
		assert!(!region.contains((0, 0)));
		assert!(matches!(region.read_chunk((0, 0)), Err(McError::ChunkNotPresent(0, 0))));
		assert_eq!(std::fs::metadata(&path).unwrap().len(), 3 * 4096);
		assert_consistent(&region);
	}

	#[test]
	fn read_only_does_not_touch_the_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("r.0.0.mca");
		{
			let mut region = open(&path);
			region.write_chunk((0, 0), &record(ChunkPos::new(0, 0), 1)).unwrap();
		}
		let before = std::fs::read(&path).unwrap();
		let options = RegionOptions {
			read_only: true,
			..RegionOptions::default()
		};
		let mut region = RegionFile::open(&path, RegionPos::new(0, 0), options).unwrap();
		assert!(region.read_chunk((0, 0)).is_ok());
		assert!(matches!(region.write_chunk((1, 0), b"x"), Err(McError::ReadOnly)));
		assert!(matches!(region.delete_chunk((0, 0)), Err(McError::ReadOnly)));
		drop(region);
		assert_eq!(std::fs::read(&path).unwrap(), before);
	}
}
