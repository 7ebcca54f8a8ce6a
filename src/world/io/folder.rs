use std::{
	collections::HashMap,
	fs,
	path::{Path, PathBuf},
};

use log::debug;

use crate::continue_if;

use crate::{
	McResult, McError,
	math::coord::{ChunkPos, RegionPos},
	world::options::RegionOptions,
};

use super::region::{
	RegionFile,
	CompressionScheme,
};

/// The `region/` directory of a world or dimension and the region files
/// opened from it.
pub struct WorldFolder {
	root: PathBuf,
	options: RegionOptions,
	regions: HashMap<RegionPos, RegionFile>,
}

impl WorldFolder {
	/// Opens the folder at `root`. The `region` directory is created when
	/// the first chunk is written.
	pub fn open<P: AsRef<Path>>(root: P, options: RegionOptions) -> Self {
		Self {
			root: root.as_ref().to_path_buf(),
			options,
			regions: HashMap::new(),
		}
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn region_dir(&self) -> PathBuf {
		self.root.join("region")
	}

	pub fn region_path(&self, pos: RegionPos) -> PathBuf {
		self.region_dir().join(pos.file_name())
	}

	/// Positions of every `r.<x>.<z>.mca` file in the region directory.
	pub fn region_positions(&self) -> McResult<Vec<RegionPos>> {
		let dir = self.region_dir();
		if !dir.is_dir() {
			return Ok(Vec::new());
		}
		let mut positions = Vec::new();
		for entry in fs::read_dir(dir)? {
			let entry = entry?;
			continue_if!(!entry.file_type()?.is_file());
			if let Some(pos) = entry.file_name().to_str().and_then(RegionPos::from_file_name) {
				positions.push(pos);
			}
		}
		positions.sort();
		Ok(positions)
	}

	/// The region file for `pos`. Missing files are only created when
	/// `create` is set, otherwise `None` is returned.
	fn region(&mut self, pos: RegionPos, create: bool) -> McResult<Option<&mut RegionFile>> {
		if !self.regions.contains_key(&pos) {
			let path = self.region_path(pos);
			if !path.is_file() {
				if !create {
					return Ok(None);
				}
				if self.options.read_only {
					return Err(McError::ReadOnly);
				}
				fs::create_dir_all(self.region_dir())?;
				debug!("Creating region file {}", path.display());
			}
			let region = RegionFile::open(&path, pos, self.options)?;
			self.regions.insert(pos, region);
		}
		Ok(self.regions.get_mut(&pos))
	}

	pub fn contains_chunk(&mut self, pos: ChunkPos) -> McResult<bool> {
		Ok(match self.region(pos.region(), false)? {
			Some(region) => region.contains(pos),
			None => false,
		})
	}

	/// The decompressed record of a chunk.
	pub fn read_chunk(&mut self, pos: ChunkPos) -> McResult<Vec<u8>> {
		match self.region(pos.region(), false)? {
			Some(region) => region.read_chunk(pos),
			None => Err(McError::ChunkNotPresent(pos.x, pos.z)),
		}
	}

	/// The record of a chunk as it is stored on disk.
	pub fn read_compressed(&mut self, pos: ChunkPos) -> McResult<(CompressionScheme, Vec<u8>)> {
		match self.region(pos.region(), false)? {
			Some(region) => region.read_compressed(pos),
			None => Err(McError::ChunkNotPresent(pos.x, pos.z)),
		}
	}

	pub fn save_chunk(&mut self, pos: ChunkPos, data: &[u8]) -> McResult<()> {
		if let Some(region) = self.region(pos.region(), true)? {
			region.write_chunk(pos, data)?;
		}
		Ok(())
	}

	pub fn write_compressed(&mut self, pos: ChunkPos, scheme: CompressionScheme, payload: &[u8]) -> McResult<()> {
		if let Some(region) = self.region(pos.region(), true)? {
			region.write_compressed(pos, scheme, payload)?;
		}
		Ok(())
	}

	/// Returns false if the chunk did not exist.
	pub fn delete_chunk(&mut self, pos: ChunkPos) -> McResult<bool> {
		match self.region(pos.region(), false)? {
			Some(region) => region.delete_chunk(pos),
			None => Ok(false),
		}
	}

	/// Copies the stored record of a chunk from another folder without
	/// recompressing it.
	pub fn copy_chunk_from(&mut self, other: &mut WorldFolder, pos: ChunkPos) -> McResult<()> {
		let (scheme, payload) = other.read_compressed(pos)?;
		self.write_compressed(pos, scheme, &payload)
	}

	/// Every chunk stored in this folder, region by region.
	pub fn list_chunks(&mut self) -> McResult<Vec<ChunkPos>> {
		let mut chunks = Vec::new();
		for pos in self.region_positions()? {
			if let Some(region) = self.region(pos, false)? {
				chunks.extend(region.chunk_positions());
			}
		}
		Ok(chunks)
	}

	pub fn chunk_count(&mut self) -> McResult<usize> {
		let mut count = 0;
		for pos in self.region_positions()? {
			if let Some(region) = self.region(pos, false)? {
				count += region.chunk_count();
			}
		}
		Ok(count)
	}

	/// Closes every open region file.
	pub fn close(&mut self) -> McResult<()> {
		for (_, region) in self.regions.drain() {
			region.close()?;
		}
		Ok(())
	}

	/// Closes every region file and deletes them from disk.
	pub fn clear(&mut self) -> McResult<()> {
		self.close()?;
		for pos in self.region_positions()? {
			fs::remove_file(self.region_path(pos))?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::compound;
	use crate::nbt::io::to_bytes;

	fn record(pos: ChunkPos) -> Vec<u8> {
		to_bytes("", &compound! {
			("Level", compound! { ("xPos", pos.x), ("zPos", pos.z) }),
		}).unwrap()
	}

	#[test]
	fn chunks_across_regions() {
		let dir = tempfile::tempdir().unwrap();
		let mut folder = WorldFolder::open(dir.path(), RegionOptions::default());
		assert!(folder.region_positions().unwrap().is_empty());
		let positions = [ChunkPos::new(0, 0), ChunkPos::new(-1, 40), ChunkPos::new(70, -3)];
		for pos in positions {
			folder.save_chunk(pos, &record(pos)).unwrap();
		}
		assert_eq!(folder.region_positions().unwrap(), vec![
			RegionPos::new(-1, 1),
			RegionPos::new(0, 0),
			RegionPos::new(2, -1),
		]);
		assert!(dir.path().join("region").join("r.2.-1.mca").is_file());
		assert_eq!(folder.chunk_count().unwrap(), 3);
		assert!(folder.contains_chunk(ChunkPos::new(-1, 40)).unwrap());
		assert!(!folder.contains_chunk(ChunkPos::new(500, 500)).unwrap());
		assert!(folder.delete_chunk(ChunkPos::new(0, 0)).unwrap());
		assert!(!folder.delete_chunk(ChunkPos::new(0, 0)).unwrap());
		folder.close().unwrap();
		let mut list = folder.list_chunks().unwrap();
		list.sort();
		assert_eq!(list, vec![ChunkPos::new(-1, 40), ChunkPos::new(70, -3)]);
		assert_eq!(folder.read_chunk(ChunkPos::new(70, -3)).unwrap(), record(ChunkPos::new(70, -3)));
	}

	#[test]
	fn copy_and_clear() {
		let a = tempfile::tempdir().unwrap();
		let b = tempfile::tempdir().unwrap();
		let mut source = WorldFolder::open(a.path(), RegionOptions::default());
		let mut target = WorldFolder::open(b.path(), RegionOptions::default());
		let pos = ChunkPos::new(5, 5);
		source.save_chunk(pos, &record(pos)).unwrap();
		target.copy_chunk_from(&mut source, pos).unwrap();
		assert_eq!(target.read_compressed(pos).unwrap(), source.read_compressed(pos).unwrap());
		assert!(matches!(
			target.copy_chunk_from(&mut source, ChunkPos::new(6, 6)),
			Err(McError::ChunkNotPresent(6, 6)),
		));
		target.clear().unwrap();
		assert_eq!(target.chunk_count().unwrap(), 0);
		assert!(matches!(target.read_chunk(pos), Err(McError::ChunkNotPresent(5, 5))));
	}

	#[test]
	fn read_only_folder() {
		let dir = tempfile::tempdir().unwrap();
		let options = RegionOptions {
			read_only: true,
			..RegionOptions::default()
		};
		let mut folder = WorldFolder::open(dir.path(), options);
		let pos = ChunkPos::new(1, 1);
		assert!(matches!(folder.save_chunk(pos, &record(pos)), Err(McError::ReadOnly)));
		assert!(!dir.path().join("region").exists());
	}
}
