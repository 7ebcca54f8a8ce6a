use std::path::PathBuf;

use thiserror::Error;

/// The master error type.
#[derive(Debug, Error)]
pub enum McError {
	#[error("{0}")]
	Custom(String),
	#[error("IO Error: {0}")]
	IoError(#[from] std::io::Error),
	#[error("Chunk ({0}, {1}) is not present.")]
	ChunkNotPresent(i32, i32),
	#[error("Chunk ({x}, {z}) is malformed: {reason}")]
	ChunkMalformed {
		x: i32,
		z: i32,
		reason: String,
	},
	#[error("Region file is malformed: {0}")]
	RegionMalformed(String),
	#[error("Chunk ({x}, {z}) needs {sectors} sectors, a region file can only address 255.")]
	ChunkTooBig {
		x: i32,
		z: i32,
		sectors: u32,
	},
	#[error("Failed to allocate sectors in region file.")]
	RegionAllocationFailure,
	#[error("Session lock was taken over by another handle. ({0})")]
	SessionLockLost(PathBuf),
	#[error("Chunk ({0}, {1}) is already present.")]
	ChunkAlreadyPresent(i32, i32),
	#[error("Chunk ({0}, {1}) is currently borrowed.")]
	ChunkBorrowed(i32, i32),
	#[error("World was opened read-only.")]
	ReadOnly,
	#[error("Invalid Compression value: {0}")]
	InvalidCompressionScheme(u8),
	#[error("Failed to convert to UTF-8 string.")]
	FromUtf8Error(#[from] std::string::FromUtf8Error),
	#[error("Unsupported Tag ID: {0}")]
	UnsupportedTagId(u8),
	#[error("There was an error decoding the NBT Tag.")]
	NbtDecodeError,
	#[error("Tag was not found in Compound.\n\"{0}\"")]
	NotFoundInCompound(String),
	#[error("World Directory not found. {0}")]
	WorldDirectoryNotFound(PathBuf),
}

impl McError {
	/// Builds a [McError::ChunkMalformed].
	pub fn malformed<S: Into<String>>(x: i32, z: i32, reason: S) -> Self {
		McError::ChunkMalformed {
			x,
			z,
			reason: reason.into(),
		}
	}

	/// `ChunkNotPresent` and `ChunkMalformed` are handled the same way
	/// everywhere: the chunk is treated as never having been generated.
	pub fn is_missing_chunk(&self) -> bool {
		matches!(self, McError::ChunkNotPresent(..) | McError::ChunkMalformed { .. })
	}
}

pub type McResult<T> = Result<T,McError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn missing_chunk_folding() {
		assert!(McError::ChunkNotPresent(0, 0).is_missing_chunk());
		assert!(McError::malformed(1, 2, "bad").is_missing_chunk());
		assert!(!McError::ReadOnly.is_missing_chunk());
		assert!(!McError::SessionLockLost(PathBuf::from("x")).is_missing_chunk());
	}
}
