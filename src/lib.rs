pub mod nbt;
pub mod world;
pub mod ioext;
pub mod error;
pub mod math;
pub mod macros;

pub use flate2;

pub use error::McError;
pub use error::McResult;

pub use world::{
	World,
	WorldOptions,
	RegionOptions,
	ChunkHandle,
	ChunkData,
	CommitReport,
	Progress,
	BlockProperties,
	BlockTable,
	CompressionScheme,
};
pub use math::coord::{
	ChunkPos,
	RegionPos,
};
