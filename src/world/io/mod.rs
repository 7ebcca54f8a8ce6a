//! On-disk storage: region files and the folders that hold them.

pub mod region;
pub mod folder;

pub use folder::WorldFolder;
