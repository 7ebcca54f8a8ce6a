use crate::{
	McResult, McError,
};

use super::{
	sector::RegionSector,
	HEADER_SECTORS,
};

/// The start sector of an offset entry is 24 bits wide.
const MAX_SECTOR_OFFSET: usize = 0xFFFFFF;

pub trait SectorAllocator {
	fn free(&mut self, sector: RegionSector);
	#[must_use]
	fn allocate(&mut self, size: u8) -> Option<RegionSector>;
	#[must_use]
	fn reallocate(&mut self, free: RegionSector, new_size: u8) -> Option<RegionSector>;

	#[inline(always)]
	fn reallocate_err(&mut self, free: RegionSector, new_size: u8) -> McResult<RegionSector> {
		self.reallocate(free, new_size).ok_or(McError::RegionAllocationFailure)
	}
}

/// Tracks which sectors of a region file are free.
/// There is one entry per sector of the file; `true` means free.
/// The two header sectors are never free.
#[derive(Debug, Clone)]
pub struct SectorManager {
	free_sectors: Vec<bool>,
}

impl SectorManager {
	/// A manager for a file that is `sector_count` sectors long with no
	/// chunks in it.
	pub fn new(sector_count: usize) -> Self {
		let sector_count = sector_count.max(HEADER_SECTORS as usize);
		let mut free_sectors = vec![true; sector_count];
		free_sectors[..HEADER_SECTORS as usize].fill(false);
		Self {
			free_sectors,
		}
	}

	/// The number of sectors in the file.
	pub fn len(&self) -> usize {
		self.free_sectors.len()
	}

	pub fn is_free(&self, index: usize) -> bool {
		self.free_sectors.get(index).copied().unwrap_or(false)
	}

	pub fn free_count(&self) -> usize {
		self.free_sectors.iter().filter(|&&free| free).count()
	}

	/// Tests if the allocation lies inside the file past the header.
	pub fn in_bounds(&self, sector: RegionSector) -> bool {
		sector.sector_count() != 0
			&& sector.sector_offset() >= HEADER_SECTORS
			&& sector.sector_end_offset() as usize <= self.free_sectors.len()
	}

	/// Marks an existing allocation as used. Fails without changing anything
	/// if the allocation is out of bounds or overlaps a used sector.
	pub fn claim(&mut self, sector: RegionSector) -> bool {
		if !self.in_bounds(sector) {
			return false;
		}
		let range = sector.range();
		if !self.free_sectors[range.clone()].iter().all(|&free| free) {
			return false;
		}
		self.free_sectors[range].fill(false);
		true
	}

	/// First run of `size` free sectors, scanning from the start of the file.
	fn find_run(&self, size: usize) -> Option<usize> {
		let mut run_start = 0;
		let mut run_length = 0;
		for (index, &free) in self.free_sectors.iter().enumerate() {
			if !free {
				run_length = 0;
				continue;
			}
			if run_length == 0 {
				run_start = index;
			}
			run_length += 1;
			if run_length >= size {
				return Some(run_start);
			}
		}
		None
	}
}

impl SectorAllocator for SectorManager {
	/// Frees the sectors of an allocation. Sectors outside of the file are
	/// ignored.
	fn free(&mut self, sector: RegionSector) {
		let start = (sector.sector_offset() as usize).max(HEADER_SECTORS as usize);
		let end = (sector.sector_end_offset() as usize).min(self.free_sectors.len());
		if start < end {
			self.free_sectors[start..end].fill(true);
		}
	}

	/// Allocate `size` sectors: the first free run that fits, otherwise new
	/// sectors appended to the end of the file.
	fn allocate(&mut self, size: u8) -> Option<RegionSector> {
		if size == 0 {
			return None;
		}
		let count = size as usize;
		let start = match self.find_run(count) {
			Some(start) => start,
			None => {
				let start = self.free_sectors.len();
				if start > MAX_SECTOR_OFFSET {
					return None;
				}
				self.free_sectors.resize(start + count, true);
				start
			}
		};
		self.free_sectors[start..start + count].fill(false);
		Some(RegionSector::new(start as u32, size))
	}

	/// Keeps the allocation in place when it is large enough, releasing
	/// the unneeded tail. Otherwise the old allocation is freed before
	/// a new one is made, so it may be reused.
	fn reallocate(&mut self, free: RegionSector, new_size: u8) -> Option<RegionSector> {
		if new_size == 0 {
			return None;
		}
		if self.in_bounds(free) && free.sector_count() >= new_size as u32 {
			let kept = RegionSector::new(free.sector_offset(), new_size);
			let tail = free.sector_count() - new_size as u32;
			if tail != 0 {
				self.free(RegionSector::new(kept.sector_end_offset(), tail as u8));
			}
			return Some(kept);
		}
		if self.in_bounds(free) {
			self.free(free);
		}
		self.allocate(new_size)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::{Rng, SeedableRng, rngs::StdRng};

	#[test]
	fn header_is_reserved() {
		let mut manager = SectorManager::new(2);
		assert!(!manager.is_free(0));
		assert!(!manager.is_free(1));
		assert!(!manager.claim(RegionSector::new(1, 1)));
		assert_eq!(manager.allocate(1), Some(RegionSector::new(2, 1)));
		manager.free(RegionSector::new(0, 3));
		assert!(!manager.is_free(0));
		assert!(manager.is_free(2));
	}

	#[test]
	fn first_fit_reuses_holes() {
		let mut manager = SectorManager::new(2);
		let a = manager.allocate(2).unwrap();
		let b = manager.allocate(1).unwrap();
		assert_eq!(b, RegionSector::new(4, 1));
		manager.free(a);
		// too big for the hole, appended
		assert_eq!(manager.allocate(3), Some(RegionSector::new(5, 3)));
		// fits the hole
		assert_eq!(manager.allocate(1), Some(RegionSector::new(2, 1)));
		assert_eq!(manager.len(), 8);
		assert_eq!(manager.free_count(), 1);
	}

	#[test]
	fn reallocate_in_place_and_move() {
		let mut manager = SectorManager::new(2);
		let a = manager.allocate(3).unwrap();
		let shrunk = manager.reallocate(a, 1).unwrap();
		assert_eq!(shrunk, RegionSector::new(2, 1));
		assert!(manager.is_free(3) && manager.is_free(4));
		let grown = manager.reallocate(shrunk, 3).unwrap();
		// the freed sector joins the hole behind it
		assert_eq!(grown, RegionSector::new(2, 3));
		assert!(!manager.claim(RegionSector::new(3, 1)));
	}

	#[test]
	fn random_allocations_never_overlap() {
		let mut rng = StdRng::seed_from_u64(7);
		let mut manager = SectorManager::new(2);
		let mut live: Vec<RegionSector> = vec![RegionSector::empty(); 64];
		for _ in 0..2000 {
			let slot = rng.gen_range(0..live.len());
			if rng.gen_bool(0.2) {
				manager.free(live[slot]);
				live[slot] = RegionSector::empty();
			} else {
				let size = rng.gen_range(1..=8u8);
				live[slot] = manager.reallocate(live[slot], size).unwrap();
			}
			for (i, a) in live.iter().enumerate() {
				for b in live[i + 1..].iter() {
					if !a.is_empty() && !b.is_empty() {
						assert!(!a.intersects(*b));
					}
				}
			}
		}
		let used: usize = live.iter().map(|s| s.sector_count() as usize).sum();
		assert_eq!(manager.free_count() + used + 2, manager.len());
		for sector in live.iter().filter(|s| !s.is_empty()) {
			assert!(sector.range().all(|index| !manager.is_free(index)));
		}
	}
}
