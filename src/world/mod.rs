pub mod block;
pub mod cache;
pub mod chunk;
pub mod codec;
pub mod io;
pub mod lighting;
pub mod lock;
pub mod options;
pub mod progress;
#[allow(clippy::module_inception)]
pub mod world;

pub use block::{BlockProperties, BlockTable};
pub use cache::{ChunkHandle, CommitReport};
pub use chunk::{ChunkData, ChunkFlags};
pub use io::region::CompressionScheme;
pub use lighting::LightingTask;
pub use options::{RegionOptions, WorldOptions};
pub use progress::{CopyChunks, CreateChunks, Progress};
pub use world::World;
