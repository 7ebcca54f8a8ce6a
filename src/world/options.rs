use super::io::region::CompressionScheme;

/// How region files are opened and written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionOptions {
	/// Keep each region file open between operations. When false, the file
	/// is opened and closed around every read or write.
	pub hold_handles: bool,
	/// Compression used for new records.
	pub compression: CompressionScheme,
	/// Never write to the file, not even to pad or repair it.
	pub read_only: bool,
}

impl Default for RegionOptions {
	fn default() -> Self {
		Self {
			hold_handles: true,
			compression: CompressionScheme::ZLib,
			read_only: false,
		}
	}
}

/// Options for [World::open](super::World::open).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldOptions {
	/// Ceiling on the number of decoded chunks kept in memory.
	pub loaded_chunk_limit: usize,
	/// Ceiling on the number of chunks a lighting batch keeps loaded,
	/// counting the neighbors of the chunks being relit. Never more than
	/// `loaded_chunk_limit`.
	pub lighting_batch_limit: Option<usize>,
	pub region: RegionOptions,
	/// No session lock is written; every mutation fails with
	/// [McError::ReadOnly](crate::McError::ReadOnly).
	pub read_only: bool,
	/// Create the world directory if it does not exist.
	pub create: bool,
	/// Relight chunks that need it before they are committed.
	pub light_before_commit: bool,
}

impl Default for WorldOptions {
	fn default() -> Self {
		Self {
			loaded_chunk_limit: 400,
			lighting_batch_limit: None,
			region: RegionOptions::default(),
			read_only: false,
			create: true,
			light_before_commit: true,
		}
	}
}

impl WorldOptions {
	pub fn with_loaded_chunk_limit(mut self, limit: usize) -> Self {
		self.loaded_chunk_limit = limit.max(1);
		self
	}

	pub fn with_lighting_batch_limit(mut self, limit: usize) -> Self {
		self.lighting_batch_limit = Some(limit.max(1));
		self
	}

	pub fn with_compression(mut self, compression: CompressionScheme) -> Self {
		self.region.compression = compression;
		self
	}

	pub fn with_hold_handles(mut self, hold_handles: bool) -> Self {
		self.region.hold_handles = hold_handles;
		self
	}

	pub fn with_read_only(mut self, read_only: bool) -> Self {
		self.read_only = read_only;
		self
	}

	pub fn with_create(mut self, create: bool) -> Self {
		self.create = create;
		self
	}

	pub fn with_light_before_commit(mut self, light: bool) -> Self {
		self.light_before_commit = light;
		self
	}

	/// The batch ceiling the lighting engine uses.
	pub fn batch_limit(&self) -> usize {
		self.lighting_batch_limit
			.map_or(self.loaded_chunk_limit, |limit| limit.min(self.loaded_chunk_limit))
			.max(1)
	}

	/// Region options with the world's read-only flag applied.
	pub fn region_options(&self) -> RegionOptions {
		RegionOptions {
			read_only: self.read_only || self.region.read_only,
			..self.region
		}
	}
}
