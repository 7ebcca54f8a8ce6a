use std::{
	collections::{btree_map::Entry, BTreeMap},
	fs,
	path::{Path, PathBuf},
	rc::Rc,
};

use log::{info, warn};

use crate::{
	continue_if,
	McError,
	McResult,
	math::coord::ChunkPos,
};

use super::{
	block::{BlockProperties, BlockTable},
	cache::{ChunkCache, ChunkHandle, CommitReport},
	io::WorldFolder,
	lighting::LightingTask,
	lock::SessionLock,
	options::WorldOptions,
	progress::{run_to_end, CopyChunks, CreateChunks},
};

/// Dimensions without a sky. Their sky light is always zero.
pub const SKYLESS_DIMENSIONS: [i32; 2] = [-1, 1];

/// `DIM<id>`
pub fn dimension_folder_name(id: i32) -> String {
	format!("DIM{id}")
}

fn parse_dimension_folder_name(name: &str) -> Option<i32> {
	name.strip_prefix("DIM")?.parse().ok()
}

/// A world folder opened for reading and editing chunks.
///
/// The world at the root of the folder is dimension 0. Other dimensions
/// live in `DIM<id>` subfolders and are opened as their own [World]
/// through [World::dimension].
pub struct World {
	root: PathBuf,
	dimension_id: i32,
	options: WorldOptions,
	cache: ChunkCache,
	lock: Option<SessionLock>,
	blocks: Rc<dyn BlockProperties>,
	dimensions: BTreeMap<i32, World>,
}

impl World {
	/// Opens the world at `path`, taking its session lock unless the world
	/// is opened read-only.
	pub fn open<P: AsRef<Path>>(path: P, options: WorldOptions) -> McResult<Self> {
		Self::open_dimension(path.as_ref(), 0, options, Rc::new(BlockTable::default()))
	}

	fn open_dimension(root: &Path, dimension_id: i32, options: WorldOptions, blocks: Rc<dyn BlockProperties>) -> McResult<Self> {
		if !root.is_dir() {
			if !options.create || options.read_only {
				return Err(McError::WorldDirectoryNotFound(root.to_path_buf()));
			}
			fs::create_dir_all(root)?;
		}
		let lock = if options.read_only {
			None
		} else {
			Some(SessionLock::acquire(root)?)
		};
		let region = options.region_options();
		let folder = WorldFolder::open(root, region);
		let cache = ChunkCache::new(folder, options.loaded_chunk_limit, region)?;
		info!(
			"Opened dimension {dimension_id} at {}{}",
			root.display(),
			if options.read_only { " (read-only)" } else { "" },
		);
		Ok(Self {
			root: root.to_path_buf(),
			dimension_id,
			options,
			cache,
			lock,
			blocks,
			dimensions: BTreeMap::new(),
		})
	}

	pub fn path(&self) -> &Path {
		&self.root
	}

	pub fn dimension_id(&self) -> i32 {
		self.dimension_id
	}

	pub fn options(&self) -> &WorldOptions {
		&self.options
	}

	pub fn is_read_only(&self) -> bool {
		self.options.read_only
	}

	pub fn has_sky(&self) -> bool {
		!SKYLESS_DIMENSIONS.contains(&self.dimension_id)
	}

	/// Replaces the block properties used for lighting, in this dimension
	/// and every dimension opened from it.
	pub fn set_block_properties<B: BlockProperties + 'static>(&mut self, blocks: B) {
		self.share_block_properties(Rc::new(blocks));
	}

	fn share_block_properties(&mut self, blocks: Rc<dyn BlockProperties>) {
		for dimension in self.dimensions.values_mut() {
			dimension.share_block_properties(blocks.clone());
		}
		self.blocks = blocks;
	}

	fn check_writable(&self) -> McResult<()> {
		if self.options.read_only {
			Err(McError::ReadOnly)
		} else {
			Ok(())
		}
	}

	/// Ids of the dimension folders present on disk and of the dimensions
	/// opened so far, including this one.
	pub fn dimension_ids(&self) -> McResult<Vec<i32>> {
		let mut ids = vec![self.dimension_id];
		ids.extend(self.dimensions.keys().copied());
		for entry in fs::read_dir(&self.root)? {
			let entry = entry?;
			continue_if!(!entry.file_type()?.is_dir());
			if let Some(id) = entry.file_name().to_str().and_then(parse_dimension_folder_name) {
				ids.push(id);
			}
		}
		ids.sort();
		ids.dedup();
		Ok(ids)
	}

	/// The dimension with the given id. Dimensions other than this one are
	/// opened from their `DIM<id>` folder on first use, creating it unless
	/// the world is read-only.
	pub fn dimension(&mut self, id: i32) -> McResult<&mut World> {
		if id == self.dimension_id {
			return Ok(self);
		}
		match self.dimensions.entry(id) {
			Entry::Occupied(entry) => Ok(entry.into_mut()),
			Entry::Vacant(entry) => {
				let path = self.root.join(dimension_folder_name(id));
				let world = World::open_dimension(&path, id, self.options.clone(), self.blocks.clone())?;
				Ok(entry.insert(world))
			}
		}
	}

	/// Returns the chunk, loading it if needed. Missing and malformed
	/// chunks both fail, see [McError::is_missing_chunk].
	pub fn get_chunk(&mut self, pos: ChunkPos) -> McResult<ChunkHandle> {
		self.cache.get(pos)
	}

	/// Creates a blank chunk. Fails if the chunk already exists.
	pub fn create_chunk(&mut self, pos: ChunkPos) -> McResult<ChunkHandle> {
		self.check_writable()?;
		self.cache.create(pos)
	}

	pub fn create_chunks<I: IntoIterator<Item = ChunkPos>>(&mut self, positions: I) -> McResult<CreateChunks<'_>> {
		self.check_writable()?;
		Ok(CreateChunks::new(&mut self.cache, positions.into_iter().collect()))
	}

	/// Deletes a chunk from memory and disk. Returns false if the chunk did
	/// not exist.
	pub fn delete_chunk(&mut self, pos: ChunkPos) -> McResult<bool> {
		self.check_writable()?;
		self.cache.remove(pos)
	}

	pub fn contains_chunk(&mut self, pos: ChunkPos) -> McResult<bool> {
		self.cache.contains(pos)
	}

	/// Every chunk of this dimension, sorted.
	pub fn all_chunks(&mut self) -> McResult<Vec<ChunkPos>> {
		self.cache.positions()
	}

	pub fn chunk_count(&mut self) -> McResult<usize> {
		Ok(self.cache.positions()?.len())
	}

	/// Number of chunks currently decoded in memory.
	pub fn loaded_chunk_count(&self) -> usize {
		self.cache.resident_count()
	}

	pub fn chunks_needing_lighting(&self) -> Vec<ChunkPos> {
		self.cache.needing_lighting()
	}

	/// Relights every chunk flagged as needing it.
	pub fn generate_lights(&mut self) -> LightingTask<'_> {
		let has_sky = self.has_sky();
		let batch_limit = self.options.batch_limit();
		LightingTask::new(&mut self.cache, &*self.blocks, has_sky, batch_limit)
	}

	/// Copies chunks from another world. Chunks missing from `source` are
	/// skipped.
	pub fn copy_chunks_from<'a, I: IntoIterator<Item = ChunkPos>>(
		&'a mut self,
		source: &'a mut World,
		positions: I,
	) -> McResult<CopyChunks<'a>> {
		self.check_writable()?;
		Ok(CopyChunks::new(&mut source.cache, &mut self.cache, positions.into_iter().collect()))
	}

	/// Fails with [McError::SessionLockLost] if the world was opened again
	/// since this handle took the lock.
	pub fn check_session_lock(&self) -> McResult<()> {
		match &self.lock {
			Some(lock) => lock.check(),
			None => Ok(()),
		}
	}

	/// Writes every edit of this dimension and the dimensions opened from
	/// it to disk.
	pub fn commit(&mut self) -> McResult<CommitReport> {
		self.check_writable()?;
		self.check_session_lock()?;
		if self.options.light_before_commit {
			let mut task = self.generate_lights();
			run_to_end(task.by_ref())?;
			if !task.skipped().is_empty() {
				warn!("{} chunks could not be lit before commit", task.skipped().len());
			}
		}
		let mut report = self.cache.commit()?;
		for dimension in self.dimensions.values_mut() {
			let inner = dimension.commit()?;
			report.saved += inner.saved;
			report.copied += inner.copied;
		}
		Ok(report)
	}

	/// Closes every region file. Uncommitted edits are discarded.
	pub fn close(mut self) -> McResult<()> {
		for (_, dimension) in std::mem::take(&mut self.dimensions) {
			dimension.close()?;
		}
		self.cache.close()
	}
}

impl std::fmt::Debug for World {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("World")
			.field("root", &self.root)
			.field("dimension_id", &self.dimension_id)
			.field("loaded", &self.cache.resident_count())
			.field("dimensions", &self.dimensions.keys().collect::<Vec<_>>())
			.finish_non_exhaustive()
	}
}
