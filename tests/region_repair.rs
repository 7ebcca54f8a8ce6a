use std::ops::Range;

use mcworld::{
	compound,
	ChunkPos,
	RegionPos,
	nbt::io::to_bytes,
	world::{
		io::region::{RegionCoord, RegionFile},
		RegionOptions,
	},
};
use rand::{Rng, RngCore, SeedableRng, rngs::StdRng};

fn record(pos: ChunkPos, noise: &[u8]) -> Vec<u8> {
	let noise: Vec<i8> = noise.iter().map(|&byte| byte as i8).collect();
	to_bytes("", &compound! {
		("Level", compound! {
			("xPos", pos.x),
			("zPos", pos.z),
			("Noise", noise),
		}),
	}).unwrap()
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
	a.start < b.end && b.start < a.end
}

#[test]
fn zeroed_ranges_never_break_repair() {
	let mut rng = StdRng::seed_from_u64(0x5EC7);
	for trial in 0..20 {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("r.0.0.mca");
		let mut expected = Vec::new();
		{
			let mut region = RegionFile::open(&path, RegionPos::new(0, 0), RegionOptions::default()).unwrap();
			for _ in 0..rng.gen_range(5..30) {
				let pos = ChunkPos::new(rng.gen_range(0..32), rng.gen_range(0..32));
				let mut noise = vec![0u8; rng.gen_range(0..12000)];
				rng.fill_bytes(&mut noise);
				region.write_chunk(pos, &record(pos, &noise)).unwrap();
				expected.retain(|(other, _, _)| *other != pos);
				expected.push((pos, noise, region.sector(pos)));
			}
			region.close().unwrap();
		}
		let mut bytes = std::fs::read(&path).unwrap();
		let start = rng.gen_range(0..bytes.len());
		let end = (start + rng.gen_range(1..20000)).min(bytes.len());
		let corrupted = start..end;
		bytes[corrupted.clone()].fill(0);
		std::fs::write(&path, bytes).unwrap();

		let mut region = RegionFile::open(&path, RegionPos::new(0, 0), RegionOptions::default()).unwrap();
		region.repair().unwrap();
		for (pos, noise, sector) in expected {
			let entry = RegionCoord::from(pos).index() * 4;
			let data = sector.offset() as usize..(sector.offset() + sector.size()) as usize;
			if overlaps(&corrupted, &(entry..entry + 4)) || overlaps(&corrupted, &data) {
				continue;
			}
			assert_eq!(
				region.read_chunk(pos).unwrap(),
				record(pos, &noise),
				"trial {trial}: chunk {pos} was untouched by {corrupted:?}",
			);
		}
		// the repaired file is consistent, so a second pass removes nothing
		assert_eq!(region.repair().unwrap().deleted, 0);
	}
}
