//! Block and sky light recalculation.
//!
//! Chunks flagged for lighting are split into batches. For each batch the
//! flagged chunks and their existing axis neighbors are reseeded: block
//! light is reset to each block's emission and sky light falls straight
//! down each column from the heightmap. Light is then relaxed between
//! neighboring blocks, one block per direction per pass, until nothing
//! changes or [MAX_PASSES] is reached.

use std::collections::{HashMap, HashSet, VecDeque};

use log::{debug, warn};

use crate::{
	McResult,
	math::coord::{Cardinal, ChunkPos},
	world::{
		block::BlockProperties,
		cache::{ChunkCache, ChunkHandle},
		chunk::*,
		progress::Progress,
	},
};

/// Relaxation stops after this many passes per light channel even if
/// light is still spreading.
pub const MAX_PASSES: usize = 14;

const EDGE: usize = CHUNK_WIDTH - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
	Block,
	Sky,
}

impl Channel {
	fn light(self, chunk: &ChunkData) -> &[u8] {
		match self {
			Channel::Block => &chunk.block_light,
			Channel::Sky => &chunk.sky_light,
		}
	}

	fn light_mut(self, chunk: &mut ChunkData) -> &mut [u8] {
		match self {
			Channel::Block => &mut chunk.block_light,
			Channel::Sky => &mut chunk.sky_light,
		}
	}
}

/// Number of chunks a batch keeps loaded: its own chunks and their axis
/// neighbors.
pub fn footprint(positions: &[ChunkPos]) -> usize {
	let mut chunks: HashSet<ChunkPos> = positions.iter().copied().collect();
	for pos in positions {
		chunks.extend(pos.neighbors());
	}
	chunks.len()
}

/// Splits positions into batches whose [footprint] is at most `limit`,
/// halving by x rank, then by z rank, alternating. A single chunk is never
/// split further.
pub fn split_batches(positions: Vec<ChunkPos>, limit: usize) -> Vec<Vec<ChunkPos>> {
	let mut batches = Vec::new();
	split_into(positions, limit.max(1), true, &mut batches);
	batches
}

fn split_into(mut positions: Vec<ChunkPos>, limit: usize, by_x: bool, batches: &mut Vec<Vec<ChunkPos>>) {
	if positions.len() <= 1 || footprint(&positions) <= limit {
		if !positions.is_empty() {
			batches.push(positions);
		}
		return;
	}
	if by_x {
		positions.sort_by_key(|pos| (pos.x, pos.z));
	} else {
		positions.sort_by_key(|pos| (pos.z, pos.x));
	}
	let upper = positions.split_off(positions.len() / 2);
	split_into(positions, limit, !by_x, batches);
	split_into(upper, limit, !by_x, batches);
}

/// One above the topmost block that absorbs any light, per column.
pub fn generate_heightmap<B: BlockProperties + ?Sized>(chunk: &mut ChunkData, blocks: &B) {
	for column in 0..COLUMN_COUNT {
		let top = (0..WORLD_HEIGHT)
			.rev()
			.find(|&y| blocks.opacity(chunk.blocks[(y << 8) | column]) > 0)
			.map_or(0, |y| y + 1);
		chunk.heightmap[column] = top as i32;
	}
}

/// Resets both light channels to the values a chunk has on its own,
/// before light from neighboring blocks is considered.
pub fn seed_chunk<B: BlockProperties + ?Sized>(chunk: &mut ChunkData, blocks: &B, has_sky: bool) {
	generate_heightmap(chunk, blocks);
	for (light, &id) in chunk.block_light.iter_mut().zip(chunk.blocks.iter()) {
		*light = blocks.light_emission(id);
	}
	if !has_sky {
		chunk.sky_light.fill(0);
		return;
	}
	for column in 0..COLUMN_COUNT {
		let height = chunk.heightmap[column].max(0) as usize;
		let mut light = MAX_LIGHT;
		for y in (0..WORLD_HEIGHT).rev() {
			let index = (y << 8) | column;
			if y < height {
				light = light.saturating_sub(blocks.opacity(chunk.blocks[index]));
			}
			chunk.sky_light[index] = light;
		}
	}
}

/// Light lost entering each block. Never less than one.
fn attenuation<B: BlockProperties + ?Sized>(chunk: &ChunkData, blocks: &B) -> Box<[u8]> {
	chunk.blocks.iter()
		.map(|&id| blocks.opacity(id).max(1))
		.collect()
}

/// Indices of the block on this chunk's `side` face and the block it
/// touches in the neighbor on that side.
#[inline(always)]
fn facing(side: Cardinal, y: usize, along: usize) -> (usize, usize) {
	match side {
		Cardinal::West => (block_index(0, y, along), block_index(EDGE, y, along)),
		Cardinal::East => (block_index(EDGE, y, along), block_index(0, y, along)),
		Cardinal::North => (block_index(along, y, 0), block_index(along, y, EDGE)),
		Cardinal::South => (block_index(along, y, EDGE), block_index(along, y, 0)),
	}
}

#[inline(always)]
fn raise(light: &mut [u8], attenuation: &[u8], index: usize, source: u8) -> bool {
	let value = source.saturating_sub(attenuation[index]);
	if value > light[index] {
		light[index] = value;
		true
	} else {
		false
	}
}

fn pull(light: &mut [u8], attenuation: &[u8], neighbor: Option<&[u8]>, side: Cardinal, y: usize, along: usize) -> bool {
	let Some(neighbor) = neighbor else {
		return false;
	};
	let (inner, outer) = facing(side, y, along);
	raise(light, attenuation, inner, neighbor[outer])
}

/// Moves light one block in each of the six directions. The faces pull
/// from `neighbors`, given in [Cardinal::ALL] order. A missing neighbor
/// contributes no light.
fn relax_chunk(light: &mut [u8], attenuation: &[u8], neighbors: [Option<&[u8]>; 4]) -> bool {
	let [west, east, north, south] = neighbors;
	let mut changed = false;
	for y in 0..WORLD_HEIGHT {
		for z in 0..CHUNK_WIDTH {
			for x in (1..CHUNK_WIDTH).rev() {
				let source = light[block_index(x - 1, y, z)];
				changed |= raise(light, attenuation, block_index(x, y, z), source);
			}
			changed |= pull(light, attenuation, west, Cardinal::West, y, z);
			for x in 0..EDGE {
				let source = light[block_index(x + 1, y, z)];
				changed |= raise(light, attenuation, block_index(x, y, z), source);
			}
			changed |= pull(light, attenuation, east, Cardinal::East, y, z);
		}
	}
	for y in 0..WORLD_HEIGHT {
		for x in 0..CHUNK_WIDTH {
			for z in (1..CHUNK_WIDTH).rev() {
				let source = light[block_index(x, y, z - 1)];
				changed |= raise(light, attenuation, block_index(x, y, z), source);
			}
			changed |= pull(light, attenuation, north, Cardinal::North, y, x);
			for z in 0..EDGE {
				let source = light[block_index(x, y, z + 1)];
				changed |= raise(light, attenuation, block_index(x, y, z), source);
			}
			changed |= pull(light, attenuation, south, Cardinal::South, y, x);
		}
	}
	const LAYER: usize = CHUNK_WIDTH * CHUNK_WIDTH;
	for column in 0..COLUMN_COUNT {
		for y in (1..WORLD_HEIGHT).rev() {
			let index = (y << 8) | column;
			let source = light[index - LAYER];
			changed |= raise(light, attenuation, index, source);
		}
		for y in 0..(WORLD_HEIGHT - 1) {
			let index = (y << 8) | column;
			let source = light[index + LAYER];
			changed |= raise(light, attenuation, index, source);
		}
	}
	changed
}

/// Moves light one block from this chunk's `side` face into the neighbor
/// on that side.
fn push(light: &[u8], side: Cardinal, neighbor: &mut [u8], neighbor_attenuation: &[u8]) -> bool {
	let mut changed = false;
	for y in 0..WORLD_HEIGHT {
		for along in 0..CHUNK_WIDTH {
			let (inner, outer) = facing(side, y, along);
			changed |= raise(neighbor, neighbor_attenuation, outer, light[inner]);
		}
	}
	changed
}

/// The chunks of the batch being relit.
struct Batch {
	size: usize,
	/// Flagged chunks and their neighbors, reseeded before relaxing.
	seeded: Vec<ChunkPos>,
	/// Handles to the seeded chunks, held until the batch finishes.
	/// `None` for chunks that do not exist.
	loaded: HashMap<ChunkPos, Option<ChunkHandle>>,
	attenuation: HashMap<ChunkPos, Box<[u8]>>,
	channel: Channel,
	pass: usize,
	working: Vec<ChunkPos>,
}

/// Relights every chunk flagged as needing it. Created by
/// [World::generate_lights](crate::World::generate_lights).
pub struct LightingTask<'a> {
	cache: &'a mut ChunkCache,
	blocks: &'a dyn BlockProperties,
	has_sky: bool,
	batches: VecDeque<Vec<ChunkPos>>,
	batch_count: usize,
	current: Option<Batch>,
	done: usize,
	total: usize,
	skipped: Vec<ChunkPos>,
	failed: bool,
}

impl<'a> LightingTask<'a> {
	pub(crate) fn new(
		cache: &'a mut ChunkCache,
		blocks: &'a dyn BlockProperties,
		has_sky: bool,
		batch_limit: usize,
	) -> Self {
		let positions = cache.needing_lighting();
		let total = positions.len();
		let batches: VecDeque<Vec<ChunkPos>> = split_batches(positions, batch_limit).into();
		debug!("Lighting {total} chunks in {} batches", batches.len());
		Self {
			cache,
			blocks,
			has_sky,
			batch_count: batches.len(),
			batches,
			current: None,
			done: 0,
			total,
			skipped: Vec::new(),
			failed: false,
		}
	}

	/// Chunks that could not be relit because they were missing, malformed
	/// or borrowed.
	pub fn skipped(&self) -> &[ChunkPos] {
		&self.skipped
	}

	fn batch_number(&self) -> usize {
		self.batch_count - self.batches.len()
	}

	/// Returns the chunk, or `None` if it does not exist.
	fn load(
		cache: &mut ChunkCache,
		loaded: &mut HashMap<ChunkPos, Option<ChunkHandle>>,
		pos: ChunkPos,
	) -> McResult<Option<ChunkHandle>> {
		if let Some(handle) = loaded.get(&pos) {
			return Ok(handle.clone());
		}
		let handle = match cache.get(pos) {
			Ok(handle) => Some(handle),
			Err(err) if err.is_missing_chunk() => None,
			Err(err) => return Err(err),
		};
		loaded.insert(pos, handle.clone());
		Ok(handle)
	}

	/// Like [Self::load], but chunks outside `loaded` are only held by the
	/// caller. Missing chunks are remembered.
	fn fetch(
		cache: &mut ChunkCache,
		loaded: &mut HashMap<ChunkPos, Option<ChunkHandle>>,
		pos: ChunkPos,
	) -> McResult<Option<ChunkHandle>> {
		if let Some(handle) = loaded.get(&pos) {
			return Ok(handle.clone());
		}
		match cache.get(pos) {
			Ok(handle) => Ok(Some(handle)),
			Err(err) if err.is_missing_chunk() => {
				loaded.insert(pos, None);
				Ok(None)
			}
			Err(err) => Err(err),
		}
	}

	fn start_batch(&mut self, positions: Vec<ChunkPos>) -> McResult<Batch> {
		let mut loaded = HashMap::new();
		let mut seeded = Vec::new();
		let mut queued = HashSet::new();
		for &pos in positions.iter() {
			if Self::load(self.cache, &mut loaded, pos)?.is_none() {
				warn!("Chunk {pos} vanished before it could be lit");
				self.skipped.push(pos);
				continue;
			}
			for candidate in std::iter::once(pos).chain(pos.neighbors()) {
				if queued.insert(candidate) && Self::load(self.cache, &mut loaded, candidate)?.is_some() {
					seeded.push(candidate);
				}
			}
		}
		let flagged: HashSet<ChunkPos> = positions.iter().copied().collect();
		seeded.retain(|pos| {
			let Some(Some(handle)) = loaded.get(pos) else {
				return false;
			};
			match handle.try_borrow_mut() {
				Ok(mut chunk) => {
					seed_chunk(&mut chunk, self.blocks, self.has_sky);
					chunk.mark_dirty();
					true
				}
				Err(_) => {
					if flagged.contains(pos) {
						self.skipped.push(*pos);
					}
					false
				}
			}
		});
		debug!("Batch {}/{}: seeded {} chunks", self.batch_number(), self.batch_count, seeded.len());
		Ok(Batch {
			size: positions.len(),
			working: seeded.clone(),
			seeded,
			loaded,
			attenuation: HashMap::new(),
			channel: Channel::Block,
			pass: 0,
		})
	}

	/// Relaxes every chunk in the working set once. Returns the working
	/// set of the next pass.
	///
	/// Chunks outside the seeded set are held only while their neighbor is
	/// relaxed, so the cache may evict them between chunks.
	fn relax_pass(&mut self, batch: &mut Batch) -> McResult<Vec<ChunkPos>> {
		let channel = batch.channel;
		let mut next: Vec<ChunkPos> = Vec::new();
		let mut queued: HashSet<ChunkPos> = HashSet::new();
		for &pos in batch.working.iter() {
			let Some(center) = Self::fetch(self.cache, &mut batch.loaded, pos)? else {
				continue;
			};
			let mut sides: Vec<Option<ChunkHandle>> = Vec::with_capacity(4);
			for neighbor in pos.neighbors() {
				sides.push(Self::fetch(self.cache, &mut batch.loaded, neighbor)?);
			}
			for handle in std::iter::once(&center).chain(sides.iter().flatten()) {
				if batch.attenuation.contains_key(&handle.pos()) {
					continue;
				}
				if let Ok(chunk) = handle.try_borrow() {
					batch.attenuation.insert(handle.pos(), attenuation(&chunk, self.blocks));
				}
			}
			let Ok(mut chunk) = center.try_borrow_mut() else {
				continue;
			};
			let Some(center_attenuation) = batch.attenuation.get(&pos) else {
				continue;
			};
			let mut neighbors: Vec<_> = sides.iter()
				.map(|side| side.as_ref().and_then(|handle| handle.try_borrow_mut().ok()))
				.collect();
			let edge = |i: usize| neighbors[i].as_deref().map(|neighbor| channel.light(neighbor));
			let edges = [edge(0), edge(1), edge(2), edge(3)];
			let changed = relax_chunk(channel.light_mut(&mut chunk), center_attenuation, edges);
			for (side, neighbor) in Cardinal::ALL.into_iter().zip(neighbors.iter_mut()) {
				let Some(neighbor) = neighbor else {
					continue;
				};
				let target = neighbor.pos();
				let Some(target_attenuation) = batch.attenuation.get(&target) else {
					continue;
				};
				if push(channel.light(&chunk), side, channel.light_mut(neighbor), target_attenuation) {
					neighbor.mark_dirty();
					if queued.insert(target) {
						next.push(target);
					}
				}
			}
			if changed {
				chunk.mark_dirty();
				if queued.insert(pos) {
					next.push(pos);
				}
			}
		}
		Ok(next)
	}

	/// Clears the lighting flag on the seeded chunks, releases them and
	/// lets the cache shrink back to its limit.
	fn finish_batch(&mut self, batch: Batch) -> McResult<()> {
		for pos in batch.seeded.iter() {
			let Some(Some(handle)) = batch.loaded.get(pos) else {
				continue;
			};
			if let Ok(mut chunk) = handle.try_borrow_mut() {
				chunk.clear_flags(ChunkFlags::NEEDS_LIGHTING);
			}
		}
		self.done += batch.size;
		drop(batch);
		self.cache.trim()
	}

	fn step(&mut self) -> McResult<Option<Progress>> {
		let Some(mut batch) = self.current.take() else {
			let Some(positions) = self.batches.pop_front() else {
				return Ok(None);
			};
			let batch = self.start_batch(positions)?;
			let message = format!("Batch {}/{}: seeded {} chunks", self.batch_number(), self.batch_count, batch.seeded.len());
			self.current = Some(batch);
			return Ok(Some(Progress::new(self.done, self.total).with_message(message)));
		};
		batch.working = self.relax_pass(&mut batch)?;
		batch.pass += 1;
		let message = format!(
			"Batch {}/{}: {} light pass {}",
			self.batch_number(),
			self.batch_count,
			match batch.channel { Channel::Block => "block", Channel::Sky => "sky" },
			batch.pass,
		);
		if batch.working.is_empty() || batch.pass >= MAX_PASSES {
			debug!("{message}, {} chunks still changing", batch.working.len());
			if batch.channel == Channel::Block && self.has_sky {
				batch.channel = Channel::Sky;
				batch.pass = 0;
				batch.working = batch.seeded.clone();
			} else {
				self.finish_batch(batch)?;
				return Ok(Some(Progress::new(self.done, self.total).with_message(message)));
			}
		}
		self.current = Some(batch);
		Ok(Some(Progress::new(self.done, self.total).with_message(message)))
	}
}

impl<'a> Iterator for LightingTask<'a> {
	type Item = McResult<Progress>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.failed {
			return None;
		}
		match self.step() {
			Ok(progress) => progress.map(Ok),
			Err(err) => {
				self.failed = true;
				Some(Err(err))
			}
		}
	}
}
