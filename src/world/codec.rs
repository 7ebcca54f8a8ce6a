//! Conversion between [ChunkData] and its NBT record.
//!
//! ```text
//! "" {
//!     Level {
//!         xPos, zPos, LastUpdate, TerrainPopulated,
//!         Biomes: [256 bytes], HeightMap: [256 ints],
//!         Sections: [{ Y, Blocks, Add?, Data, BlockLight, SkyLight }],
//!         Entities, TileEntities, ...
//!     }
//! }
//! ```

use crate::{
	McError,
	McResult,
	map_decoder,
	math::coord::ChunkPos,
	math::nibble::{pack_nibbles, unpack_nibbles},
	nbt::{
		io::{from_bytes, to_bytes},
		tagtype::*,
		ListTag,
		Map,
		Tag,
	},
};

use super::block::ids;
use super::chunk::*;

const NIBBLE_VOLUME: usize = SECTION_VOLUME / 2;

type CompoundList = Vec<Compound>;

/// Reads the coordinates a record claims to hold, without decoding the
/// rest of it.
pub fn chunk_position(record: &[u8]) -> McResult<ChunkPos> {
	let (_, root) = from_bytes(record)?;
	let Tag::Compound(mut root) = root else {
		return Err(McError::NbtDecodeError);
	};
	let mut level = map_decoder!(root; "Level" -> Map);
	let x = map_decoder!(level; "xPos" -> Int);
	let z = map_decoder!(level; "zPos" -> Int);
	Ok(ChunkPos::new(x, z))
}

/// Decodes an uncompressed record. Any failure, including a record
/// that holds another chunk, is reported as [McError::ChunkMalformed].
pub fn decode_chunk_bytes(pos: ChunkPos, record: &[u8]) -> McResult<ChunkData> {
	let (_, root) = from_bytes(record)
		.map_err(|err| McError::malformed(pos.x, pos.z, err.to_string()))?;
	decode_chunk(pos, root)
}

/// Decodes the root tag of a record. Decoded chunks are clean.
pub fn decode_chunk(pos: ChunkPos, root: Tag) -> McResult<ChunkData> {
	match decode_root(pos, root) {
		Err(err @ McError::ChunkMalformed { .. }) => Err(err),
		Err(err) => Err(McError::malformed(pos.x, pos.z, err.to_string())),
		ok => ok,
	}
}

fn decode_root(pos: ChunkPos, root: Tag) -> McResult<ChunkData> {
	let Tag::Compound(mut root) = root else {
		return Err(McError::malformed(pos.x, pos.z, "root tag is not a compound"));
	};
	let mut level = map_decoder!(root; "Level" -> Map);
	let x = map_decoder!(level; "xPos" -> Int);
	let z = map_decoder!(level; "zPos" -> Int);
	if (x, z) != (pos.x, pos.z) {
		return Err(McError::malformed(pos.x, pos.z, format!("record holds chunk ({x}, {z})")));
	}
	let mut chunk = ChunkData::new(pos);
	chunk.flags = ChunkFlags::empty();
	chunk.last_update = map_decoder!(level; "LastUpdate" -> Option<Long>).unwrap_or(0);
	chunk.terrain_populated = map_decoder!(level; "TerrainPopulated" -> Option<bool>).unwrap_or(false);
	if let Some(biomes) = map_decoder!(level; "Biomes" -> Option<ByteArray>) {
		if biomes.len() != COLUMN_COUNT {
			return Err(McError::malformed(pos.x, pos.z, format!("Biomes has {} entries", biomes.len())));
		}
		chunk.biomes.copy_from_slice(&biomes);
	}
	if let Some(heightmap) = map_decoder!(level; "HeightMap" -> Option<IntArray>) {
		if heightmap.len() != COLUMN_COUNT {
			return Err(McError::malformed(pos.x, pos.z, format!("HeightMap has {} entries", heightmap.len())));
		}
		chunk.heightmap.copy_from_slice(&heightmap);
	}
	let sections = map_decoder!(level; "Sections" -> Option<CompoundList>).unwrap_or_default();
	for section in sections {
		decode_section(&mut chunk, section)?;
	}
	chunk.entities = map_decoder!(level; "Entities" -> Option<CompoundList>).unwrap_or_default();
	chunk.tile_entities = map_decoder!(level; "TileEntities" -> Option<CompoundList>).unwrap_or_default();
	chunk.extra_level = level;
	chunk.extra_root = root;
	Ok(chunk)
}

fn nibble_array(pos: ChunkPos, section: &mut Map, name: &'static str) -> McResult<Option<ByteArray>> {
	let array = match section.shift_remove(name) {
		Some(tag) => ByteArray::decode_nbt(tag)?,
		None => return Ok(None),
	};
	if array.len() < NIBBLE_VOLUME {
		return Err(McError::malformed(pos.x, pos.z, format!("{name} has {} bytes", array.len())));
	}
	Ok(Some(array))
}

/// Splices one section into the column arrays. Arrays missing from the
/// section keep the values of a blank chunk.
fn decode_section(chunk: &mut ChunkData, mut section: Map) -> McResult<()> {
	let pos = chunk.pos;
	let y = map_decoder!(section; "Y" -> Byte);
	if y < 0 || y as usize >= SECTION_COUNT {
		return Err(McError::malformed(pos.x, pos.z, format!("section Y {y} is out of range")));
	}
	let range = (y as usize * SECTION_VOLUME)..((y as usize + 1) * SECTION_VOLUME);
	let blocks = map_decoder!(section; "Blocks" -> ByteArray);
	if blocks.len() < SECTION_VOLUME {
		return Err(McError::malformed(pos.x, pos.z, format!("Blocks has {} bytes", blocks.len())));
	}
	let target = &mut chunk.blocks[range.clone()];
	for (id, &byte) in target.iter_mut().zip(blocks.iter()) {
		*id = byte as u8 as u16;
	}
	if let Some(add) = nibble_array(pos, &mut section, "Add")? {
		let mut high = vec![0u8; SECTION_VOLUME];
		unpack_nibbles(&add, &mut high);
		for (id, high) in target.iter_mut().zip(high) {
			*id |= (high as u16) << 8;
		}
	}
	if let Some(data) = nibble_array(pos, &mut section, "Data")? {
		unpack_nibbles(&data, &mut chunk.data[range.clone()]);
	}
	if let Some(light) = nibble_array(pos, &mut section, "BlockLight")? {
		unpack_nibbles(&light, &mut chunk.block_light[range.clone()]);
	}
	if let Some(light) = nibble_array(pos, &mut section, "SkyLight")? {
		unpack_nibbles(&light, &mut chunk.sky_light[range]);
	}
	Ok(())
}

/// Grass or dirt directly beneath grass or dirt becomes dirt, and a snow
/// layer directly above another snow layer is removed. Each rule looks at
/// the blocks as they were before the rule was applied.
pub fn sanitize_blocks(blocks: &mut [u16]) {
	const LAYER: usize = CHUNK_WIDTH * CHUNK_WIDTH;
	let is_soil = |id: u16| id == ids::GRASS || id == ids::DIRT;
	let below_soil: Vec<usize> = (0..blocks.len().saturating_sub(LAYER))
		.filter(|&index| is_soil(blocks[index]) && is_soil(blocks[index + LAYER]))
		.collect();
	for index in below_soil {
		blocks[index] = ids::DIRT;
	}
	let stacked_snow: Vec<usize> = (0..blocks.len().saturating_sub(LAYER))
		.filter(|&index| blocks[index] == ids::SNOW_LAYER && blocks[index + LAYER] == ids::SNOW_LAYER)
		.map(|index| index + LAYER)
		.collect();
	for index in stacked_snow {
		blocks[index] = ids::AIR;
	}
}

/// All air, no metadata, no block light and full sky light.
fn section_is_empty(chunk: &ChunkData, range: std::ops::Range<usize>) -> bool {
	chunk.blocks[range.clone()].iter().all(|&id| id & MAX_BLOCK_ID == 0)
		&& chunk.data[range.clone()].iter().all(|&value| value & 0xF == 0)
		&& chunk.block_light[range.clone()].iter().all(|&value| value & 0xF == 0)
		&& chunk.sky_light[range].iter().all(|&value| value & 0xF == MAX_LIGHT)
}

fn encode_section(chunk: &ChunkData, y: usize) -> Option<Map> {
	let range = (y * SECTION_VOLUME)..((y + 1) * SECTION_VOLUME);
	if section_is_empty(chunk, range.clone()) {
		return None;
	}
	let ids = &chunk.blocks[range.clone()];
	let mut section = Map::new();
	section.insert("Y".to_owned(), Tag::Byte(y as i8));
	section.insert(
		"Blocks".to_owned(),
		Tag::ByteArray(ids.iter().map(|&id| id as u8 as i8).collect()),
	);
	if ids.iter().any(|&id| id & MAX_BLOCK_ID > 0xFF) {
		section.insert(
			"Add".to_owned(),
			Tag::ByteArray(pack_nibbles(ids.iter().map(|&id| ((id & MAX_BLOCK_ID) >> 8) as u8))),
		);
	}
	section.insert("Data".to_owned(), Tag::ByteArray(pack_nibbles(chunk.data[range.clone()].iter().copied())));
	section.insert("BlockLight".to_owned(), Tag::ByteArray(pack_nibbles(chunk.block_light[range.clone()].iter().copied())));
	section.insert("SkyLight".to_owned(), Tag::ByteArray(pack_nibbles(chunk.sky_light[range].iter().copied())));
	Some(section)
}

/// Sanitizes the chunk's blocks and builds its record.
pub fn encode_chunk(chunk: &mut ChunkData) -> Tag {
	sanitize_blocks(&mut chunk.blocks);
	let sections: Vec<Map> = (0..SECTION_COUNT)
		.filter_map(|y| encode_section(chunk, y))
		.collect();
	let mut level = Map::new();
	level.insert("xPos".to_owned(), Tag::Int(chunk.pos.x));
	level.insert("zPos".to_owned(), Tag::Int(chunk.pos.z));
	level.insert("LastUpdate".to_owned(), Tag::Long(chunk.last_update));
	level.insert("TerrainPopulated".to_owned(), Tag::from(chunk.terrain_populated));
	level.insert("Biomes".to_owned(), Tag::ByteArray(chunk.biomes.to_vec()));
	level.insert("HeightMap".to_owned(), Tag::IntArray(chunk.heightmap.to_vec()));
	level.insert("Sections".to_owned(), Tag::List(ListTag::from(sections)));
	level.insert("Entities".to_owned(), Tag::List(ListTag::from(chunk.entities.clone())));
	level.insert("TileEntities".to_owned(), Tag::List(ListTag::from(chunk.tile_entities.clone())));
	for (name, tag) in chunk.extra_level.iter() {
		level.entry(name.clone()).or_insert_with(|| tag.clone());
	}
	let mut root = Map::new();
	root.insert("Level".to_owned(), Tag::Compound(level));
	for (name, tag) in chunk.extra_root.iter() {
		root.entry(name.clone()).or_insert_with(|| tag.clone());
	}
	Tag::Compound(root)
}

/// [encode_chunk] followed by NBT serialization.
pub fn encode_chunk_bytes(chunk: &mut ChunkData) -> McResult<Vec<u8>> {
	to_bytes("", &encode_chunk(chunk))
}
