use std::{
	cell::{Ref, RefCell, RefMut},
	collections::{HashMap, HashSet},
	rc::Rc,
};

use log::{debug, info, warn};
use tempfile::TempDir;

use crate::{
	McError,
	McResult,
	math::coord::ChunkPos,
	world::{
		chunk::{ChunkData, ChunkFlags},
		codec::{decode_chunk_bytes, encode_chunk_bytes},
		io::WorldFolder,
		options::RegionOptions,
	},
};

/// A shared handle to a loaded chunk.
///
/// While a handle is alive the chunk is pinned and is never evicted from
/// the cache.
#[derive(Clone)]
pub struct ChunkHandle {
	pos: ChunkPos,
	chunk: Rc<RefCell<ChunkData>>,
}

impl ChunkHandle {
	pub fn pos(&self) -> ChunkPos {
		self.pos
	}

	/// Panics if the chunk is mutably borrowed.
	pub fn borrow(&self) -> Ref<'_, ChunkData> {
		self.chunk.borrow()
	}

	/// Panics if the chunk is borrowed.
	pub fn borrow_mut(&self) -> RefMut<'_, ChunkData> {
		self.chunk.borrow_mut()
	}

	pub fn try_borrow(&self) -> McResult<Ref<'_, ChunkData>> {
		self.chunk.try_borrow().map_err(|_| McError::ChunkBorrowed(self.pos.x, self.pos.z))
	}

	pub fn try_borrow_mut(&self) -> McResult<RefMut<'_, ChunkData>> {
		self.chunk.try_borrow_mut().map_err(|_| McError::ChunkBorrowed(self.pos.x, self.pos.z))
	}
}

impl std::fmt::Debug for ChunkHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("ChunkHandle").field(&self.pos).finish()
	}
}

struct CacheEntry {
	chunk: Rc<RefCell<ChunkData>>,
	last_used: u64,
}

impl CacheEntry {
	fn pinned(&self) -> bool {
		Rc::strong_count(&self.chunk) > 1
	}
}

/// What a commit wrote to the primary folder.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CommitReport {
	/// Resident chunks encoded and saved.
	pub saved: usize,
	/// Staged records copied from the overlay without decoding them.
	pub copied: usize,
}

/// Decoded chunks of one dimension, bounded to a chunk count.
///
/// Dirty chunks pushed out of memory are staged in an overlay folder in
/// a private temporary directory until the next [ChunkCache::commit].
pub struct ChunkCache {
	folder: WorldFolder,
	overlay: WorldFolder,
	overlay_dir: TempDir,
	entries: HashMap<ChunkPos, CacheEntry>,
	/// Staged chunks that still need lighting. The flag does not survive
	/// encoding so it is kept here.
	unlit: HashSet<ChunkPos>,
	limit: usize,
	clock: u64,
}

impl ChunkCache {
	pub fn new(folder: WorldFolder, limit: usize, options: RegionOptions) -> McResult<Self> {
		let overlay_dir = tempfile::Builder::new()
			.prefix("mcworld-overlay")
			.tempdir()?;
		let overlay = WorldFolder::open(overlay_dir.path(), RegionOptions {
			read_only: false,
			..options
		});
		Ok(Self {
			folder,
			overlay,
			overlay_dir,
			entries: HashMap::new(),
			unlit: HashSet::new(),
			limit: limit.max(1),
			clock: 0,
		})
	}

	pub fn folder(&mut self) -> &mut WorldFolder {
		&mut self.folder
	}

	pub fn limit(&self) -> usize {
		self.limit
	}

	/// Number of decoded chunks held in memory.
	pub fn resident_count(&self) -> usize {
		self.entries.len()
	}

	pub fn is_resident(&self, pos: ChunkPos) -> bool {
		self.entries.contains_key(&pos)
	}

	pub fn is_staged(&mut self, pos: ChunkPos) -> McResult<bool> {
		self.overlay.contains_chunk(pos)
	}

	fn tick(&mut self) -> u64 {
		self.clock += 1;
		self.clock
	}

	/// Tests if the chunk exists in memory, in the overlay or on disk.
	pub fn contains(&mut self, pos: ChunkPos) -> McResult<bool> {
		Ok(self.entries.contains_key(&pos)
			|| self.overlay.contains_chunk(pos)?
			|| self.folder.contains_chunk(pos)?)
	}

	/// Returns the chunk, decoding it from the overlay or the primary
	/// folder if it is not in memory. The overlay copy wins when both
	/// exist.
	pub fn get(&mut self, pos: ChunkPos) -> McResult<ChunkHandle> {
		let tick = self.tick();
		if let Some(entry) = self.entries.get_mut(&pos) {
			entry.last_used = tick;
			return Ok(ChunkHandle { pos, chunk: entry.chunk.clone() });
		}
		let chunk = if self.overlay.contains_chunk(pos)? {
			let mut chunk = decode_chunk_bytes(pos, &self.overlay.read_chunk(pos)?)?;
			chunk.mark_dirty();
			if self.unlit.remove(&pos) {
				chunk.flags.insert(ChunkFlags::NEEDS_LIGHTING);
			}
			chunk
		} else {
			let record = self.folder.read_chunk(pos)?;
			match decode_chunk_bytes(pos, &record) {
				Ok(chunk) => chunk,
				Err(err) => {
					warn!("{err}");
					return Err(err);
				}
			}
		};
		self.insert(chunk)
	}

	/// Adds a chunk that does not exist yet.
	pub fn create(&mut self, pos: ChunkPos) -> McResult<ChunkHandle> {
		if self.contains(pos)? {
			return Err(McError::ChunkAlreadyPresent(pos.x, pos.z));
		}
		self.insert(ChunkData::new(pos))
	}

	/// Replaces the contents of a chunk, creating it if needed.
	/// The new contents are marked dirty.
	pub fn replace(&mut self, mut chunk: ChunkData) -> McResult<ChunkHandle> {
		chunk.mark_dirty();
		let pos = chunk.pos();
		let tick = self.tick();
		if let Some(entry) = self.entries.get_mut(&pos) {
			entry.last_used = tick;
			let handle = ChunkHandle { pos, chunk: entry.chunk.clone() };
			*handle.try_borrow_mut()? = chunk;
			return Ok(handle);
		}
		self.unlit.remove(&pos);
		self.insert(chunk)
	}

	fn insert(&mut self, chunk: ChunkData) -> McResult<ChunkHandle> {
		self.make_room()?;
		let pos = chunk.pos();
		let chunk = Rc::new(RefCell::new(chunk));
		let last_used = self.tick();
		self.entries.insert(pos, CacheEntry {
			chunk: chunk.clone(),
			last_used,
		});
		Ok(ChunkHandle { pos, chunk })
	}

	/// Evicts until there is space for one more chunk. If every resident
	/// chunk is pinned the cache is allowed to grow past its limit.
	fn make_room(&mut self) -> McResult<()> {
		while self.entries.len() >= self.limit {
			if !self.evict_one()? {
				debug!("All {} loaded chunks are in use, exceeding the limit of {}", self.entries.len(), self.limit);
				break;
			}
		}
		Ok(())
	}

	/// Evicts until the cache is back within its limit, as far as pinned
	/// chunks allow.
	pub fn trim(&mut self) -> McResult<()> {
		while self.entries.len() > self.limit {
			if !self.evict_one()? {
				break;
			}
		}
		Ok(())
	}

	/// Drops the least recently used chunk that is not pinned, staging it
	/// in the overlay first if it is dirty. Returns false if nothing could
	/// be evicted. The chunk stays resident if staging fails.
	fn evict_one(&mut self) -> McResult<bool> {
		let victim = self.entries.iter()
			.filter(|(_, entry)| !entry.pinned())
			.min_by_key(|(_, entry)| entry.last_used)
			.map(|(&pos, _)| pos);
		let Some(pos) = victim else {
			return Ok(false);
		};
		let Some(entry) = self.entries.get(&pos) else {
			return Ok(false);
		};
		{
			let mut chunk = entry.chunk.try_borrow_mut().map_err(|_| McError::ChunkBorrowed(pos.x, pos.z))?;
			if chunk.is_dirty() {
				debug!("Staging chunk {pos} in the overlay");
				let record = encode_chunk_bytes(&mut chunk)?;
				self.overlay.save_chunk(pos, &record)?;
				if chunk.needs_lighting() {
					self.unlit.insert(pos);
				}
			}
		}
		self.entries.remove(&pos);
		Ok(true)
	}

	/// Forgets the chunk everywhere. Returns false if it did not exist.
	pub fn remove(&mut self, pos: ChunkPos) -> McResult<bool> {
		let resident = self.entries.remove(&pos).is_some();
		self.unlit.remove(&pos);
		let staged = self.overlay.delete_chunk(pos)?;
		let stored = self.folder.delete_chunk(pos)?;
		Ok(resident || staged || stored)
	}

	/// Every chunk that exists in memory, in the overlay or on disk,
	/// sorted.
	pub fn positions(&mut self) -> McResult<Vec<ChunkPos>> {
		let mut positions: Vec<ChunkPos> = self.entries.keys().copied().collect();
		positions.extend(self.overlay.list_chunks()?);
		positions.extend(self.folder.list_chunks()?);
		positions.sort();
		positions.dedup();
		Ok(positions)
	}

	/// Resident chunks flagged for lighting plus staged chunks that were
	/// flagged when they were evicted, sorted.
	pub fn needing_lighting(&self) -> Vec<ChunkPos> {
		let mut positions: Vec<ChunkPos> = self.entries.iter()
			.filter(|(_, entry)| match entry.chunk.try_borrow() {
				Ok(chunk) => chunk.needs_lighting(),
				Err(_) => false,
			})
			.map(|(&pos, _)| pos)
			.chain(self.unlit.iter().copied())
			.collect();
		positions.sort();
		positions.dedup();
		positions
	}

	/// Saves every dirty resident chunk, copies every chunk that is only
	/// staged, then empties the overlay.
	pub fn commit(&mut self) -> McResult<CommitReport> {
		let mut report = CommitReport::default();
		let mut dirty: Vec<ChunkPos> = Vec::new();
		for (&pos, entry) in self.entries.iter() {
			let chunk = entry.chunk.try_borrow().map_err(|_| McError::ChunkBorrowed(pos.x, pos.z))?;
			if chunk.is_dirty() {
				dirty.push(pos);
			}
		}
		dirty.sort();
		for pos in dirty {
			let Some(entry) = self.entries.get(&pos) else {
				continue;
			};
			let mut chunk = entry.chunk.try_borrow_mut().map_err(|_| McError::ChunkBorrowed(pos.x, pos.z))?;
			let record = encode_chunk_bytes(&mut chunk)?;
			self.folder.save_chunk(pos, &record)?;
			chunk.clear_flags(ChunkFlags::DIRTY);
			report.saved += 1;
		}
		for pos in self.overlay.list_chunks()? {
			if self.entries.contains_key(&pos) {
				continue;
			}
			self.folder.copy_chunk_from(&mut self.overlay, pos)?;
			report.copied += 1;
		}
		self.overlay.clear()?;
		self.unlit.clear();
		info!("Committed {} saved and {} staged chunks to {}", report.saved, report.copied, self.folder.root().display());
		Ok(report)
	}

	/// Closes the region files of both folders.
	pub fn close(&mut self) -> McResult<()> {
		self.overlay.close()?;
		self.folder.close()
	}

	pub fn overlay_root(&self) -> &std::path::Path {
		self.overlay_dir.path()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::world::codec::encode_chunk_bytes;

	fn cache(dir: &std::path::Path, limit: usize) -> ChunkCache {
		let folder = WorldFolder::open(dir, RegionOptions::default());
		ChunkCache::new(folder, limit, RegionOptions::default()).unwrap()
	}

	#[test]
	fn bounded_with_staging() {
		let dir = tempfile::tempdir().unwrap();
		let mut cache = cache(dir.path(), 4);
		for x in 0..10 {
			let handle = cache.create(ChunkPos::new(x, 0)).unwrap();
			handle.borrow_mut().set_block(x as usize, 64, 0, 1);
			drop(handle);
			assert!(cache.resident_count() <= 4);
		}
		assert!(cache.is_staged(ChunkPos::new(0, 0)).unwrap());
		assert!(!cache.is_resident(ChunkPos::new(0, 0)));
		assert_eq!(cache.positions().unwrap().len(), 10);
		// nothing reached the primary folder yet
		assert_eq!(cache.folder().chunk_count().unwrap(), 0);
		let chunk = cache.get(ChunkPos::new(0, 0)).unwrap();
		assert_eq!(chunk.borrow().block(0, 64, 0), 1);
		assert!(chunk.borrow().is_dirty());
		assert!(chunk.borrow().needs_lighting());
		drop(chunk);
		let report = cache.commit().unwrap();
		assert_eq!(report.saved + report.copied, 10);
		assert_eq!(cache.folder().chunk_count().unwrap(), 10);
		assert!(!cache.is_staged(ChunkPos::new(1, 0)).unwrap());
		assert!(cache.needing_lighting().iter().all(|pos| cache.is_resident(*pos)));
	}

	#[test]
	fn evicted_chunk_reloads_identically() {
		let dir = tempfile::tempdir().unwrap();
		let mut cache = cache(dir.path(), 2);
		let first = cache.create(ChunkPos::new(0, 0)).unwrap();
		first.borrow_mut().set_block(3, 100, 3, 0x123);
		first.borrow_mut().set_biome(2, 2, 7);
		let expected = encode_chunk_bytes(&mut first.borrow().clone()).unwrap();
		drop(first);
		for x in 1..4 {
			cache.create(ChunkPos::new(x, 0)).unwrap();
		}
		assert!(!cache.is_resident(ChunkPos::new(0, 0)));
		let reloaded = cache.get(ChunkPos::new(0, 0)).unwrap();
		let actual = encode_chunk_bytes(&mut reloaded.borrow().clone()).unwrap();
		assert_eq!(actual, expected);
	}

	#[test]
	fn pinned_chunks_are_kept() {
		let dir = tempfile::tempdir().unwrap();
		let mut cache = cache(dir.path(), 2);
		let handles: Vec<ChunkHandle> = (0..5)
			.map(|x| cache.create(ChunkPos::new(x, 0)).unwrap())
			.collect();
		assert_eq!(cache.resident_count(), 5);
		drop(handles);
		cache.create(ChunkPos::new(9, 9)).unwrap();
		assert!(cache.resident_count() <= 2);
	}

	#[test]
	fn borrowed_chunk_blocks_commit() {
		let dir = tempfile::tempdir().unwrap();
		let mut cache = cache(dir.path(), 4);
		let handle = cache.create(ChunkPos::new(0, 0)).unwrap();
		let guard = handle.borrow_mut();
		assert!(matches!(cache.commit(), Err(McError::ChunkBorrowed(0, 0))));
		drop(guard);
		assert_eq!(cache.commit().unwrap().saved, 1);
		assert!(!handle.borrow().is_dirty());
		assert!(matches!(cache.create(ChunkPos::new(0, 0)), Err(McError::ChunkAlreadyPresent(0, 0))));
	}

	#[test]
	fn remove_everywhere() {
		let dir = tempfile::tempdir().unwrap();
		let mut cache = cache(dir.path(), 1);
		cache.create(ChunkPos::new(0, 0)).unwrap();
		cache.commit().unwrap();
		cache.create(ChunkPos::new(1, 0)).unwrap();
		cache.create(ChunkPos::new(2, 0)).unwrap();
		assert!(cache.is_staged(ChunkPos::new(1, 0)).unwrap());
		for x in 0..3 {
			assert!(cache.remove(ChunkPos::new(x, 0)).unwrap());
		}
		assert!(!cache.remove(ChunkPos::new(0, 0)).unwrap());
		assert!(cache.positions().unwrap().is_empty());
		assert!(matches!(cache.get(ChunkPos::new(1, 0)), Err(McError::ChunkNotPresent(..))));
	}

	#[test]
	fn failed_staging_keeps_the_chunk() {
		use rand::{Rng, SeedableRng, rngs::StdRng};
		use crate::nbt::{Map, Tag};

		let dir = tempfile::tempdir().unwrap();
		let mut cache = cache(dir.path(), 1);
		let pos = ChunkPos::new(0, 0);
		let handle = cache.create(pos).unwrap();
		let mut rng = StdRng::seed_from_u64(3);
		let noise: Vec<i8> = (0..1_200_000).map(|_| rng.gen()).collect();
		let mut entity = Map::new();
		entity.insert("Noise".to_owned(), Tag::ByteArray(noise));
		handle.borrow_mut().entities_mut().push(entity);
		drop(handle);

		// too big for a region record, so it cannot be staged
		assert!(matches!(cache.create(ChunkPos::new(5, 5)), Err(McError::ChunkTooBig { .. })));
		assert!(cache.is_resident(pos));
		assert!(!cache.is_resident(ChunkPos::new(5, 5)));
		let chunk = cache.get(pos).unwrap();
		assert!(chunk.borrow().is_dirty());
		assert_eq!(chunk.borrow().entities().len(), 1);
		assert!(!cache.is_staged(pos).unwrap());
	}

	#[test]
	fn trim_returns_to_the_limit() {
		let dir = tempfile::tempdir().unwrap();
		let mut cache = cache(dir.path(), 2);
		let handles: Vec<ChunkHandle> = (0..4)
			.map(|x| cache.create(ChunkPos::new(x, 0)).unwrap())
			.collect();
		cache.trim().unwrap();
		assert_eq!(cache.resident_count(), 4);
		drop(handles);
		cache.trim().unwrap();
		assert_eq!(cache.resident_count(), 2);
		assert_eq!(cache.positions().unwrap().len(), 4);
	}
}
