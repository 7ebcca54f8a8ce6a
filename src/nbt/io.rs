//! Binary NBT reading and writing.

use std::{
	io::{
		Read, Write,
		BufReader, BufWriter,
	},
	fs::File,
	path::Path,
};

use flate2::{
	read::GzDecoder,
	write::GzEncoder,
	Compression,
};

use crate::{
	McError,
	McResult,
	ioext::*,
};
use crate::nbt::Map;
use crate::nbt::tag::*;

/// Compounds and lists may not nest deeper than this. The reader is
/// recursive, so the cap also bounds its stack use.
pub const MAX_DEPTH: usize = 256;

fn read_string<R: Read>(reader: &mut R) -> McResult<String> {
	let length: u16 = reader.read_value()?;
	let mut bytes = Vec::with_capacity(length as usize);
	reader.take(length as u64).read_to_end(&mut bytes)?;
	if bytes.len() != length as usize {
		return Err(McError::NbtDecodeError);
	}
	Ok(String::from_utf8(bytes)?)
}

fn write_string<W: Write>(writer: &mut W, value: &str) -> McResult<usize> {
	let bytes = value.as_bytes();
	if bytes.len() > u16::MAX as usize {
		return Err(McError::Custom(format!("String of {} bytes is too long for NBT.", bytes.len())));
	}
	writer.write_value(bytes.len() as u16)?;
	writer.write_all(bytes)?;
	Ok(bytes.len() + 2)
}

fn read_length<R: Read>(reader: &mut R) -> McResult<usize> {
	let length: i32 = reader.read_value()?;
	if length < 0 {
		return Err(McError::NbtDecodeError);
	}
	Ok(length as usize)
}

/// Reads `length` values. The capacity is capped so that a corrupt length
/// can not allocate more than the stream holds; a short stream fails with
/// an IO error.
fn read_values<R: Read, T: Readable>(reader: &mut R, length: usize) -> McResult<Vec<T>> {
	let mut values = Vec::with_capacity(length.min(4096));
	for _ in 0..length {
		values.push(reader.read_value()?);
	}
	Ok(values)
}

fn read_byte_array<R: Read>(reader: &mut R) -> McResult<Vec<i8>> {
	let length = read_length(reader)?;
	let mut bytes = Vec::with_capacity(length.min(1 << 20));
	reader.take(length as u64).read_to_end(&mut bytes)?;
	if bytes.len() != length {
		return Err(McError::NbtDecodeError);
	}
	Ok(bytes.into_iter().map(|b| b as i8).collect())
}

fn read_payload<R: Read>(reader: &mut R, id: TagID, depth: usize) -> McResult<Tag> {
	if depth > MAX_DEPTH {
		return Err(McError::NbtDecodeError);
	}
	Ok(match id {
		TagID::Byte => Tag::Byte(reader.read_value()?),
		TagID::Short => Tag::Short(reader.read_value()?),
		TagID::Int => Tag::Int(reader.read_value()?),
		TagID::Long => Tag::Long(reader.read_value()?),
		TagID::Float => Tag::Float(reader.read_value()?),
		TagID::Double => Tag::Double(reader.read_value()?),
		TagID::ByteArray => Tag::ByteArray(read_byte_array(reader)?),
		TagID::String => Tag::String(read_string(reader)?),
		TagID::List => Tag::List(read_list(reader, depth)?),
		TagID::Compound => Tag::Compound(read_compound(reader, depth)?),
		TagID::IntArray => {
			let length = read_length(reader)?;
			Tag::IntArray(read_values(reader, length)?)
		}
		TagID::ShortArray => {
			let length = read_length(reader)?;
			Tag::ShortArray(read_values(reader, length)?)
		}
	})
}

fn read_compound<R: Read>(reader: &mut R, depth: usize) -> McResult<Map> {
	let mut map = Map::new();
	loop {
		let id: u8 = reader.read_value()?;
		if id == 0 {
			break;
		}
		let id = TagID::try_from(id)?;
		let name = read_string(reader)?;
		let tag = read_payload(reader, id, depth + 1)?;
		map.insert(name, tag);
	}
	Ok(map)
}

fn read_list<R: Read>(reader: &mut R, depth: usize) -> McResult<ListTag> {
	let element: u8 = reader.read_value()?;
	let length = read_length(reader)?;
	if length == 0 {
		return Ok(ListTag::Empty);
	}
	let element = TagID::try_from(element)?;
	macro_rules! collect {
		($variant:ident, $read:expr) => {
			{
				let mut items = Vec::with_capacity(length.min(4096));
				for _ in 0..length {
					items.push($read);
				}
				ListTag::$variant(items)
			}
		};
	}
	Ok(match element {
		TagID::Byte => ListTag::Byte(read_values(reader, length)?),
		TagID::Short => ListTag::Short(read_values(reader, length)?),
		TagID::Int => ListTag::Int(read_values(reader, length)?),
		TagID::Long => ListTag::Long(read_values(reader, length)?),
		TagID::Float => ListTag::Float(read_values(reader, length)?),
		TagID::Double => ListTag::Double(read_values(reader, length)?),
		TagID::ByteArray => collect!(ByteArray, read_byte_array(reader)?),
		TagID::String => collect!(String, read_string(reader)?),
		TagID::List => collect!(List, {
			if depth + 1 > MAX_DEPTH {
				return Err(McError::NbtDecodeError);
			}
			read_list(reader, depth + 1)?
		}),
		TagID::Compound => collect!(Compound, read_compound(reader, depth + 1)?),
		TagID::IntArray => collect!(IntArray, {
			let inner = read_length(reader)?;
			read_values(reader, inner)?
		}),
		TagID::ShortArray => collect!(ShortArray, {
			let inner = read_length(reader)?;
			read_values(reader, inner)?
		}),
	})
}

fn write_length<W: Write>(writer: &mut W, length: usize) -> McResult<usize> {
	if length > i32::MAX as usize {
		return Err(McError::Custom(format!("Array of {length} elements is too long for NBT.")));
	}
	writer.write_value(length as i32)
}

fn write_values<W: Write, T: Writable + Copy>(writer: &mut W, values: &[T]) -> McResult<usize> {
	let mut size = write_length(writer, values.len())?;
	for value in values {
		size += writer.write_value(*value)?;
	}
	Ok(size)
}

fn write_byte_array<W: Write>(writer: &mut W, values: &[i8]) -> McResult<usize> {
	let size = write_length(writer, values.len())?;
	writer.write_all(bytemuck::cast_slice(values))?;
	Ok(size + values.len())
}

fn write_compound<W: Write>(writer: &mut W, map: &Map) -> McResult<usize> {
	let mut size = 0;
	for (name, tag) in map {
		size += writer.write_value(tag.id() as u8)?;
		size += write_string(writer, name)?;
		size += write_payload(writer, tag)?;
	}
	size += writer.write_value(0u8)?;
	Ok(size)
}

fn write_list<W: Write>(writer: &mut W, list: &ListTag) -> McResult<usize> {
	let element = list.element_id().map(|id| id as u8).unwrap_or(0);
	let mut size = writer.write_value(element)?;
	macro_rules! each {
		($items:expr, $item:ident => $write:expr) => {
			{
				size += write_length(writer, $items.len())?;
				for $item in $items.iter() {
					size += $write;
				}
			}
		};
	}
	match list {
		ListTag::Empty => size += write_length(writer, 0)?,
		ListTag::Byte(items) => size += write_byte_array(writer, items)?,
		ListTag::Short(items) => size += write_values(writer, items)?,
		ListTag::Int(items) => size += write_values(writer, items)?,
		ListTag::Long(items) => size += write_values(writer, items)?,
		ListTag::Float(items) => size += write_values(writer, items)?,
		ListTag::Double(items) => size += write_values(writer, items)?,
		ListTag::ByteArray(items) => each!(items, item => write_byte_array(writer, item)?),
		ListTag::String(items) => each!(items, item => write_string(writer, item)?),
		ListTag::List(items) => each!(items, item => write_list(writer, item)?),
		ListTag::Compound(items) => each!(items, item => write_compound(writer, item)?),
		ListTag::IntArray(items) => each!(items, item => write_values(writer, item)?),
		ListTag::ShortArray(items) => each!(items, item => write_values(writer, item)?),
	}
	Ok(size)
}

fn write_payload<W: Write>(writer: &mut W, tag: &Tag) -> McResult<usize> {
	match tag {
		Tag::Byte(value) => writer.write_value(*value),
		Tag::Short(value) => writer.write_value(*value),
		Tag::Int(value) => writer.write_value(*value),
		Tag::Long(value) => writer.write_value(*value),
		Tag::Float(value) => writer.write_value(*value),
		Tag::Double(value) => writer.write_value(*value),
		Tag::ByteArray(value) => write_byte_array(writer, value),
		Tag::String(value) => write_string(writer, value),
		Tag::List(value) => write_list(writer, value),
		Tag::Compound(value) => write_compound(writer, value),
		Tag::IntArray(value) => write_values(writer, value),
		Tag::ShortArray(value) => write_values(writer, value),
	}
}

/// Reads a named root tag (id, name, payload).
pub fn read_named_tag<R: Read>(reader: &mut R) -> McResult<(String, Tag)> {
	let id: u8 = reader.read_value()?;
	let id = TagID::try_from(id)?;
	let name = read_string(reader)?;
	let tag = read_payload(reader, id, 0)?;
	Ok((name, tag))
}

/// Writes a named root tag. Returns the number of bytes written.
pub fn write_named_tag<W: Write>(writer: &mut W, name: &str, tag: &Tag) -> McResult<usize> {
	let mut size = writer.write_value(tag.id() as u8)?;
	size += write_string(writer, name)?;
	size += write_payload(writer, tag)?;
	Ok(size)
}

/// Decodes an uncompressed NBT record held in memory.
pub fn from_bytes(bytes: &[u8]) -> McResult<(String, Tag)> {
	let mut reader = bytes;
	read_named_tag(&mut reader)
}

/// Encodes an uncompressed NBT record.
pub fn to_bytes(name: &str, tag: &Tag) -> McResult<Vec<u8>> {
	let mut buffer = Vec::new();
	write_named_tag(&mut buffer, name, tag)?;
	Ok(buffer)
}

/// Reads a gzip-framed NBT file such as `level.dat`.
pub fn load_gzip<P: AsRef<Path>>(path: P) -> McResult<(String, Tag)> {
	let file = File::open(path)?;
	let mut decoder = GzDecoder::new(BufReader::new(file));
	read_named_tag(&mut decoder)
}

/// Writes a gzip-framed NBT file.
pub fn save_gzip<P: AsRef<Path>>(path: P, name: &str, tag: &Tag) -> McResult<usize> {
	let file = File::create(path)?;
	let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
	let size = write_named_tag(&mut encoder, name, tag)?;
	let mut writer = encoder.finish()?;
	writer.flush()?;
	Ok(size)
}
