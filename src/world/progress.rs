//! Long running world operations are exposed as iterators of [Progress]
//! snapshots. Every call to `next` does one unit of work, so dropping the
//! iterator early cancels whatever is left. Work that already happened is
//! kept in memory and written by the next commit.

use std::fmt;

use log::{debug, warn};

use crate::{
	McError,
	McResult,
	math::coord::ChunkPos,
	world::cache::ChunkCache,
};

/// A snapshot of a running operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
	pub done: usize,
	pub total: usize,
	pub message: Option<String>,
}

impl Progress {
	pub fn new(done: usize, total: usize) -> Self {
		Self {
			done,
			total,
			message: None,
		}
	}

	pub fn with_message<S: Into<String>>(mut self, message: S) -> Self {
		self.message = Some(message.into());
		self
	}

	pub fn is_complete(&self) -> bool {
		self.done >= self.total
	}
}

impl fmt::Display for Progress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.done, self.total)?;
		if let Some(message) = &self.message {
			write!(f, " {message}")?;
		}
		Ok(())
	}
}

/// Drives a task to completion and returns its last snapshot.
pub fn run_to_end<I: Iterator<Item = McResult<Progress>>>(task: I) -> McResult<Option<Progress>> {
	let mut last = None;
	for progress in task {
		last = Some(progress?);
	}
	Ok(last)
}

/// Creates blank chunks. Chunks that already exist are skipped.
pub struct CreateChunks<'a> {
	cache: &'a mut ChunkCache,
	positions: Vec<ChunkPos>,
	next: usize,
	skipped: Vec<ChunkPos>,
	failed: bool,
}

impl<'a> CreateChunks<'a> {
	pub(crate) fn new(cache: &'a mut ChunkCache, positions: Vec<ChunkPos>) -> Self {
		Self {
			cache,
			positions,
			next: 0,
			skipped: Vec::new(),
			failed: false,
		}
	}

	/// Chunks that were not created because they already existed.
	pub fn skipped(&self) -> &[ChunkPos] {
		&self.skipped
	}
}

impl<'a> Iterator for CreateChunks<'a> {
	type Item = McResult<Progress>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.failed || self.next >= self.positions.len() {
			return None;
		}
		let pos = self.positions[self.next];
		self.next += 1;
		match self.cache.create(pos) {
			Ok(_) => {}
			Err(McError::ChunkAlreadyPresent(..)) => {
				debug!("Chunk {pos} already exists");
				self.skipped.push(pos);
			}
			Err(err) => {
				self.failed = true;
				return Some(Err(err));
			}
		}
		Some(Ok(Progress::new(self.next, self.positions.len())))
	}
}

/// Copies decoded chunks from another world. The copies replace whatever
/// the target held and are written by the target's next commit.
pub struct CopyChunks<'a> {
	source: &'a mut ChunkCache,
	target: &'a mut ChunkCache,
	positions: Vec<ChunkPos>,
	next: usize,
	skipped: Vec<ChunkPos>,
	failed: bool,
}

impl<'a> CopyChunks<'a> {
	pub(crate) fn new(source: &'a mut ChunkCache, target: &'a mut ChunkCache, positions: Vec<ChunkPos>) -> Self {
		Self {
			source,
			target,
			positions,
			next: 0,
			skipped: Vec::new(),
			failed: false,
		}
	}

	/// Chunks that were missing or malformed in the source, or borrowed in
	/// the target.
	pub fn skipped(&self) -> &[ChunkPos] {
		&self.skipped
	}

	fn copy(&mut self, pos: ChunkPos) -> McResult<()> {
		let chunk = self.source.get(pos)?;
		let data = chunk.try_borrow()?.clone();
		self.target.replace(data)?;
		Ok(())
	}
}

impl<'a> Iterator for CopyChunks<'a> {
	type Item = McResult<Progress>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.failed || self.next >= self.positions.len() {
			return None;
		}
		let pos = self.positions[self.next];
		self.next += 1;
		match self.copy(pos) {
			Ok(()) => {}
			Err(err) if err.is_missing_chunk() || matches!(err, McError::ChunkBorrowed(..)) => {
				warn!("Skipping chunk {pos}: {err}");
				self.skipped.push(pos);
			}
			Err(err) => {
				self.failed = true;
				return Some(Err(err));
			}
		}
		Some(Ok(Progress::new(self.next, self.positions.len())))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::world::{io::WorldFolder, options::RegionOptions};

	fn cache(dir: &std::path::Path) -> ChunkCache {
		ChunkCache::new(WorldFolder::open(dir, RegionOptions::default()), 8, RegionOptions::default()).unwrap()
	}

	#[test]
	fn create_reports_each_chunk() {
		let dir = tempfile::tempdir().unwrap();
		let mut cache = cache(dir.path());
		cache.create(ChunkPos::new(1, 1)).unwrap();
		let positions = vec![ChunkPos::new(0, 0), ChunkPos::new(1, 1), ChunkPos::new(2, 2)];
		let mut task = CreateChunks::new(&mut cache, positions);
		let snapshots: Vec<Progress> = task.by_ref().map(Result::unwrap).collect();
		assert_eq!(snapshots.len(), 3);
		assert_eq!(snapshots[2], Progress::new(3, 3));
		assert!(snapshots[2].is_complete());
		assert_eq!(task.skipped(), &[ChunkPos::new(1, 1)]);
		drop(task);
		assert_eq!(cache.positions().unwrap().len(), 3);
	}

	#[test]
	fn cancel_keeps_finished_work() {
		let dir = tempfile::tempdir().unwrap();
		let mut cache = cache(dir.path());
		let positions = (0..10).map(|x| ChunkPos::new(x, 0)).collect();
		let mut task = CreateChunks::new(&mut cache, positions);
		assert_eq!(task.next().unwrap().unwrap().done, 1);
		task.next();
		drop(task);
		assert_eq!(cache.positions().unwrap(), vec![ChunkPos::new(0, 0), ChunkPos::new(1, 0)]);
	}

	#[test]
	fn copy_skips_missing() {
		let a = tempfile::tempdir().unwrap();
		let b = tempfile::tempdir().unwrap();
		let mut source = cache(a.path());
		let mut target = cache(b.path());
		source.create(ChunkPos::new(0, 0)).unwrap().borrow_mut().set_block(0, 0, 0, 7);
		let positions = vec![ChunkPos::new(0, 0), ChunkPos::new(5, 5)];
		let mut task = CopyChunks::new(&mut source, &mut target, positions);
		let last = run_to_end(task.by_ref()).unwrap().unwrap();
		assert_eq!(last.to_string(), "2/2");
		assert_eq!(task.skipped(), &[ChunkPos::new(5, 5)]);
		drop(task);
		let copy = target.get(ChunkPos::new(0, 0)).unwrap();
		assert_eq!(copy.borrow().block(0, 0, 0), 7);
		assert!(copy.borrow().is_dirty());
	}
}
