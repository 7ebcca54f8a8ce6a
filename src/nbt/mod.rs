//! NBT, the named binary tag format every on-disk record is stored in.

pub mod tag;
pub mod tagtype;
pub mod io;
pub mod macros;

/// Compound entries keep the order they were inserted in.
pub type Map = indexmap::IndexMap<String, tag::Tag>;

pub use tag::{
	Tag,
	TagID,
	ListTag,
};
pub use tagtype::DecodeNbt;
pub use io::{
	read_named_tag,
	write_named_tag,
	load_gzip,
	save_gzip,
};
