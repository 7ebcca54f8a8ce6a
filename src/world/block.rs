//! Static per-block properties used by the lighting engine and the codec.

/// Block ids the storage engine treats specially.
pub mod ids {
	pub const AIR: u16 = 0;
	pub const STONE: u16 = 1;
	pub const GRASS: u16 = 2;
	pub const DIRT: u16 = 3;
	pub const FLOWING_WATER: u16 = 8;
	pub const WATER: u16 = 9;
	pub const FLOWING_LAVA: u16 = 10;
	pub const LAVA: u16 = 11;
	pub const LEAVES: u16 = 18;
	pub const GLASS: u16 = 20;
	pub const TORCH: u16 = 50;
	pub const FIRE: u16 = 51;
	pub const REDSTONE_TORCH: u16 = 76;
	pub const SNOW_LAYER: u16 = 78;
	pub const ICE: u16 = 79;
	pub const GLOWSTONE: u16 = 89;
	pub const PORTAL: u16 = 90;
	pub const JACK_O_LANTERN: u16 = 91;
}

/// Light properties of a block id. Both values are in `0..=15`.
pub trait BlockProperties {
	/// How much light is lost when passing through the block.
	fn opacity(&self, id: u16) -> u8;
	/// The block light level the block emits.
	fn light_emission(&self, id: u16) -> u8;
}

/// A lookup table for all 4096 block ids.
/// Ids without an entry are fully opaque and emit no light.
#[derive(Clone)]
pub struct BlockTable {
	opacity: Box<[u8]>,
	emission: Box<[u8]>,
}

/// `(id, opacity, emission)` for the classic blocks that are not simply
/// opaque and dark.
const CLASSIC_BLOCKS: &[(u16, u8, u8)] = &[
	(ids::AIR, 0, 0),
	(6, 0, 0),		// sapling
	(ids::FLOWING_WATER, 3, 0),
	(ids::WATER, 3, 0),
	(ids::FLOWING_LAVA, 15, 15),
	(ids::LAVA, 15, 15),
	(ids::LEAVES, 1, 0),
	(ids::GLASS, 0, 0),
	(27, 0, 0),		// powered rail
	(28, 0, 0),		// detector rail
	(30, 1, 0),		// cobweb
	(31, 0, 0),		// tall grass
	(32, 0, 0),		// dead bush
	(37, 0, 0),		// dandelion
	(38, 0, 0),		// rose
	(39, 0, 1),		// brown mushroom
	(40, 0, 0),		// red mushroom
	(ids::TORCH, 0, 14),
	(ids::FIRE, 0, 15),
	(52, 0, 0),		// spawner
	(55, 0, 0),		// redstone wire
	(59, 0, 0),		// wheat
	(63, 0, 0),		// sign
	(64, 0, 0),		// wooden door
	(65, 0, 0),		// ladder
	(66, 0, 0),		// rail
	(68, 0, 0),		// wall sign
	(69, 0, 0),		// lever
	(70, 0, 0),		// stone pressure plate
	(71, 0, 0),		// iron door
	(72, 0, 0),		// wooden pressure plate
	(74, 15, 9),	// lit redstone ore
	(75, 0, 0),		// unlit redstone torch
	(ids::REDSTONE_TORCH, 0, 7),
	(77, 0, 0),		// button
	(ids::SNOW_LAYER, 0, 0),
	(ids::ICE, 3, 0),
	(83, 0, 0),		// sugar cane
	(85, 0, 0),		// fence
	(ids::GLOWSTONE, 15, 15),
	(ids::PORTAL, 0, 11),
	(ids::JACK_O_LANTERN, 15, 15),
	(92, 0, 0),		// cake
	(93, 0, 0),		// repeater
	(94, 0, 9),		// powered repeater
	(96, 0, 0),		// trapdoor
	(101, 0, 0),	// iron bars
	(102, 0, 0),	// glass pane
	(106, 0, 0),	// vines
	(111, 0, 0),	// lily pad
	(119, 0, 15),	// end portal
	(122, 0, 1),	// dragon egg
	(124, 15, 15),	// lit redstone lamp
	(138, 0, 15),	// beacon
];

impl BlockTable {
	/// A table where every id is opaque and dark, except air.
	pub fn opaque() -> Self {
		let mut table = Self {
			opacity: vec![15u8; 4096].into_boxed_slice(),
			emission: vec![0u8; 4096].into_boxed_slice(),
		};
		table.set(ids::AIR, 0, 0);
		table
	}

	/// The classic block set.
	pub fn classic() -> Self {
		let mut table = Self::opaque();
		for &(id, opacity, emission) in CLASSIC_BLOCKS {
			table.set(id, opacity, emission);
		}
		table
	}

	/// Overrides the properties of one id. Values are clamped to 15.
	pub fn set(&mut self, id: u16, opacity: u8, emission: u8) -> &mut Self {
		let index = (id & 0xFFF) as usize;
		self.opacity[index] = opacity.min(15);
		self.emission[index] = emission.min(15);
		self
	}
}

impl Default for BlockTable {
	fn default() -> Self {
		Self::classic()
	}
}

impl BlockProperties for BlockTable {
	#[inline(always)]
	fn opacity(&self, id: u16) -> u8 {
		self.opacity[(id & 0xFFF) as usize]
	}

	#[inline(always)]
	fn light_emission(&self, id: u16) -> u8 {
		self.emission[(id & 0xFFF) as usize]
	}
}

impl<T: BlockProperties + ?Sized> BlockProperties for &T {
	fn opacity(&self, id: u16) -> u8 {
		(**self).opacity(id)
	}

	fn light_emission(&self, id: u16) -> u8 {
		(**self).light_emission(id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn classic_values() {
		let table = BlockTable::default();
		assert_eq!(table.opacity(ids::AIR), 0);
		assert_eq!(table.opacity(ids::STONE), 15);
		assert_eq!(table.opacity(ids::WATER), 3);
		assert_eq!(table.light_emission(ids::TORCH), 14);
		assert_eq!(table.light_emission(ids::GLOWSTONE), 15);
		// unknown ids are opaque
		assert_eq!(table.opacity(4000), 15);
		assert_eq!(table.opacity(4096 + ids::AIR), 0);
	}

	#[test]
	fn overrides() {
		let mut table = BlockTable::opaque();
		table.set(300, 2, 99).set(301, 0, 4);
		assert_eq!(table.opacity(300), 2);
		assert_eq!(table.light_emission(300), 15);
		assert_eq!(table.light_emission(301), 4);
		assert_eq!(table.light_emission(ids::TORCH), 0);
	}
}
