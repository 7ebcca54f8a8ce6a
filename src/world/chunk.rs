use std::fmt;

use bitflags::bitflags;

use crate::math::coord::ChunkPos;
use crate::nbt::Map;

pub const CHUNK_WIDTH: usize = 16;
pub const WORLD_HEIGHT: usize = 256;
pub const SECTION_HEIGHT: usize = 16;
pub const SECTION_COUNT: usize = WORLD_HEIGHT / SECTION_HEIGHT;
/// Blocks in a 16x16x16 section.
pub const SECTION_VOLUME: usize = CHUNK_WIDTH * CHUNK_WIDTH * SECTION_HEIGHT;
/// Blocks in a full chunk column.
pub const CHUNK_VOLUME: usize = CHUNK_WIDTH * CHUNK_WIDTH * WORLD_HEIGHT;
/// Columns in a chunk (heightmap and biome entries).
pub const COLUMN_COUNT: usize = CHUNK_WIDTH * CHUNK_WIDTH;
pub const MAX_LIGHT: u8 = 15;
/// Biome value of columns that have not been assigned a biome.
pub const DEFAULT_BIOME: i8 = -1;
/// The largest block id a record can hold (12 bits).
pub const MAX_BLOCK_ID: u16 = 0xFFF;

bitflags! {
	#[derive(Default)]
	pub struct ChunkFlags: u8 {
		/// The chunk differs from what is stored on disk.
		const DIRTY = 0b01;
		/// Light values are stale.
		const NEEDS_LIGHTING = 0b10;
	}
}

/// Index into the column arrays. Y is the slowest axis, so each section
/// is a contiguous run of [SECTION_VOLUME] values.
#[inline(always)]
pub const fn block_index(x: usize, y: usize, z: usize) -> usize {
	debug_assert!(x < CHUNK_WIDTH && y < WORLD_HEIGHT && z < CHUNK_WIDTH, "block coordinate out of range");
	(y << 8) | (z << 4) | x
}

/// Index into the heightmap and biome arrays.
#[inline(always)]
pub const fn column_index(x: usize, z: usize) -> usize {
	debug_assert!(x < CHUNK_WIDTH && z < CHUNK_WIDTH, "column coordinate out of range");
	(z << 4) | x
}

/// The decoded contents of a chunk.
#[derive(Clone, PartialEq)]
pub struct ChunkData {
	pub(crate) pos: ChunkPos,
	pub(crate) blocks: Box<[u16]>,
	pub(crate) data: Box<[u8]>,
	pub(crate) block_light: Box<[u8]>,
	pub(crate) sky_light: Box<[u8]>,
	pub(crate) heightmap: Box<[i32]>,
	pub(crate) biomes: Box<[i8]>,
	pub(crate) entities: Vec<Map>,
	pub(crate) tile_entities: Vec<Map>,
	pub(crate) terrain_populated: bool,
	pub(crate) last_update: i64,
	/// Tags under `Level` that are not otherwise decoded.
	pub(crate) extra_level: Map,
	/// Tags beside `Level` in the root compound.
	pub(crate) extra_root: Map,
	pub(crate) flags: ChunkFlags,
}

impl ChunkData {
	/// A blank chunk: all air, full sky light, no biome assigned.
	/// Blank chunks are dirty but do not need lighting.
	pub fn new(pos: ChunkPos) -> Self {
		Self {
			pos,
			blocks: vec![0u16; CHUNK_VOLUME].into_boxed_slice(),
			data: vec![0u8; CHUNK_VOLUME].into_boxed_slice(),
			block_light: vec![0u8; CHUNK_VOLUME].into_boxed_slice(),
			sky_light: vec![MAX_LIGHT; CHUNK_VOLUME].into_boxed_slice(),
			heightmap: vec![0i32; COLUMN_COUNT].into_boxed_slice(),
			biomes: vec![DEFAULT_BIOME; COLUMN_COUNT].into_boxed_slice(),
			entities: Vec::new(),
			tile_entities: Vec::new(),
			terrain_populated: true,
			last_update: 0,
			extra_level: Map::new(),
			extra_root: Map::new(),
			flags: ChunkFlags::DIRTY,
		}
	}

	pub fn pos(&self) -> ChunkPos {
		self.pos
	}

	pub fn flags(&self) -> ChunkFlags {
		self.flags
	}

	pub fn is_dirty(&self) -> bool {
		self.flags.contains(ChunkFlags::DIRTY)
	}

	pub fn needs_lighting(&self) -> bool {
		self.flags.contains(ChunkFlags::NEEDS_LIGHTING)
	}

	pub fn mark_dirty(&mut self) {
		self.flags.insert(ChunkFlags::DIRTY);
	}

	/// Marks the chunk dirty and its light stale.
	pub fn mark_changed(&mut self) {
		self.flags.insert(ChunkFlags::DIRTY | ChunkFlags::NEEDS_LIGHTING);
	}

	pub(crate) fn clear_flags(&mut self, flags: ChunkFlags) {
		self.flags.remove(flags);
	}

	pub fn block(&self, x: usize, y: usize, z: usize) -> u16 {
		self.blocks[block_index(x, y, z)]
	}

	/// Ids are truncated to 12 bits.
	pub fn set_block(&mut self, x: usize, y: usize, z: usize, id: u16) {
		self.blocks[block_index(x, y, z)] = id & MAX_BLOCK_ID;
		self.mark_changed();
	}

	pub fn block_data(&self, x: usize, y: usize, z: usize) -> u8 {
		self.data[block_index(x, y, z)]
	}

	pub fn set_block_data(&mut self, x: usize, y: usize, z: usize, value: u8) {
		self.data[block_index(x, y, z)] = value & 0xF;
		self.mark_dirty();
	}

	pub fn block_light(&self, x: usize, y: usize, z: usize) -> u8 {
		self.block_light[block_index(x, y, z)]
	}

	pub fn set_block_light(&mut self, x: usize, y: usize, z: usize, value: u8) {
		self.block_light[block_index(x, y, z)] = value.min(MAX_LIGHT);
		self.mark_changed();
	}

	pub fn sky_light(&self, x: usize, y: usize, z: usize) -> u8 {
		self.sky_light[block_index(x, y, z)]
	}

	pub fn set_sky_light(&mut self, x: usize, y: usize, z: usize, value: u8) {
		self.sky_light[block_index(x, y, z)] = value.min(MAX_LIGHT);
		self.mark_changed();
	}

	pub fn biome(&self, x: usize, z: usize) -> i8 {
		self.biomes[column_index(x, z)]
	}

	pub fn set_biome(&mut self, x: usize, z: usize, biome: i8) {
		self.biomes[column_index(x, z)] = biome;
		self.mark_dirty();
	}

	pub fn height(&self, x: usize, z: usize) -> i32 {
		self.heightmap[column_index(x, z)]
	}

	pub fn blocks(&self) -> &[u16] {
		&self.blocks
	}

	/// Mutable block ids. Marks the chunk dirty and its light stale.
	/// Ids above 4095 are truncated when the chunk is saved.
	pub fn blocks_mut(&mut self) -> &mut [u16] {
		self.mark_changed();
		&mut self.blocks
	}

	pub fn data(&self) -> &[u8] {
		&self.data
	}

	pub fn data_mut(&mut self) -> &mut [u8] {
		self.mark_dirty();
		&mut self.data
	}

	pub fn block_light_array(&self) -> &[u8] {
		&self.block_light
	}

	pub fn block_light_mut(&mut self) -> &mut [u8] {
		self.mark_changed();
		&mut self.block_light
	}

	pub fn sky_light_array(&self) -> &[u8] {
		&self.sky_light
	}

	pub fn sky_light_mut(&mut self) -> &mut [u8] {
		self.mark_changed();
		&mut self.sky_light
	}

	pub fn heightmap(&self) -> &[i32] {
		&self.heightmap
	}

	pub fn biomes(&self) -> &[i8] {
		&self.biomes
	}

	pub fn biomes_mut(&mut self) -> &mut [i8] {
		self.mark_dirty();
		&mut self.biomes
	}

	pub fn entities(&self) -> &[Map] {
		&self.entities
	}

	pub fn entities_mut(&mut self) -> &mut Vec<Map> {
		self.mark_dirty();
		&mut self.entities
	}

	pub fn tile_entities(&self) -> &[Map] {
		&self.tile_entities
	}

	pub fn tile_entities_mut(&mut self) -> &mut Vec<Map> {
		self.mark_dirty();
		&mut self.tile_entities
	}

	pub fn terrain_populated(&self) -> bool {
		self.terrain_populated
	}

	pub fn set_terrain_populated(&mut self, populated: bool) {
		self.terrain_populated = populated;
		self.mark_dirty();
	}

	pub fn last_update(&self) -> i64 {
		self.last_update
	}
}

impl fmt::Debug for ChunkData {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ChunkData")
			.field("pos", &self.pos)
			.field("flags", &self.flags)
			.field("entities", &self.entities.len())
			.field("tile_entities", &self.tile_entities.len())
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn blank_chunk() {
		let chunk = ChunkData::new(ChunkPos::new(2, -2));
		assert!(chunk.blocks().iter().all(|&id| id == 0));
		assert!(chunk.sky_light_array().iter().all(|&light| light == MAX_LIGHT));
		assert!(chunk.biomes().iter().all(|&biome| biome == DEFAULT_BIOME));
		assert!(chunk.terrain_populated());
		assert_eq!(chunk.flags(), ChunkFlags::DIRTY);
	}

	#[test]
	fn writes_set_flags() {
		let mut chunk = ChunkData::new(ChunkPos::new(0, 0));
		chunk.clear_flags(ChunkFlags::all());
		chunk.set_biome(1, 1, 4);
		assert_eq!(chunk.flags(), ChunkFlags::DIRTY);
		chunk.clear_flags(ChunkFlags::all());
		chunk.set_block(1, 200, 3, 0x1FFF);
		assert_eq!(chunk.block(1, 200, 3), 0xFFF);
		assert!(chunk.needs_lighting() && chunk.is_dirty());
	}

	#[test]
	fn sections_are_contiguous() {
		assert_eq!(block_index(0, 16, 0), SECTION_VOLUME);
		assert_eq!(block_index(15, 15, 15), SECTION_VOLUME - 1);
		assert_eq!(column_index(15, 15), COLUMN_COUNT - 1);
	}

	#[test]
	#[cfg(debug_assertions)]
	#[should_panic(expected = "block coordinate out of range")]
	fn x_past_the_edge_does_not_wrap() {
		let mut chunk = ChunkData::new(ChunkPos::new(0, 0));
		chunk.set_block(CHUNK_WIDTH, 0, 0, 1);
	}

	#[test]
	#[cfg(debug_assertions)]
	#[should_panic(expected = "column coordinate out of range")]
	fn z_past_the_edge_does_not_wrap() {
		ChunkData::new(ChunkPos::new(0, 0)).biome(0, CHUNK_WIDTH);
	}
}
