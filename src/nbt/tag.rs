use crate::McError;
use crate::McResult;
use crate::nbt::tagtype::*;

/// Identifies the kind of a [Tag] on disk.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagID {
	Byte = 1,
	Short = 2,
	Int = 3,
	Long = 4,
	Float = 5,
	Double = 6,
	ByteArray = 7,
	String = 8,
	List = 9,
	Compound = 10,
	IntArray = 11,
	ShortArray = 12,
}

impl TagID {
	pub fn title(self) -> &'static str {
		match self {
			TagID::Byte => "Byte",
			TagID::Short => "Short",
			TagID::Int => "Int",
			TagID::Long => "Long",
			TagID::Float => "Float",
			TagID::Double => "Double",
			TagID::ByteArray => "ByteArray",
			TagID::String => "String",
			TagID::List => "List",
			TagID::Compound => "Compound",
			TagID::IntArray => "IntArray",
			TagID::ShortArray => "ShortArray",
		}
	}
}

impl TryFrom<u8> for TagID {
	type Error = McError;

	fn try_from(value: u8) -> McResult<Self> {
		Ok(match value {
			1 => TagID::Byte,
			2 => TagID::Short,
			3 => TagID::Int,
			4 => TagID::Long,
			5 => TagID::Float,
			6 => TagID::Double,
			7 => TagID::ByteArray,
			8 => TagID::String,
			9 => TagID::List,
			10 => TagID::Compound,
			11 => TagID::IntArray,
			12 => TagID::ShortArray,
			other => return Err(McError::UnsupportedTagId(other)),
		})
	}
}

/// A single NBT value.
#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
	Byte(Byte),
	Short(Short),
	Int(Int),
	Long(Long),
	Float(Float),
	Double(Double),
	ByteArray(ByteArray),
	String(String),
	List(ListTag),
	Compound(Compound),
	IntArray(IntArray),
	ShortArray(ShortArray),
}

/// A list of tags that all share the same kind.
/// `Empty` is written with an element id of 0.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ListTag {
	#[default]
	Empty,
	Byte(Vec<Byte>),
	Short(Vec<Short>),
	Int(Vec<Int>),
	Long(Vec<Long>),
	Float(Vec<Float>),
	Double(Vec<Double>),
	ByteArray(Vec<ByteArray>),
	String(Vec<String>),
	List(Vec<ListTag>),
	Compound(Vec<Compound>),
	IntArray(Vec<IntArray>),
	ShortArray(Vec<ShortArray>),
}

impl Tag {
	pub fn id(&self) -> TagID {
		match self {
			Tag::Byte(_) => TagID::Byte,
			Tag::Short(_) => TagID::Short,
			Tag::Int(_) => TagID::Int,
			Tag::Long(_) => TagID::Long,
			Tag::Float(_) => TagID::Float,
			Tag::Double(_) => TagID::Double,
			Tag::ByteArray(_) => TagID::ByteArray,
			Tag::String(_) => TagID::String,
			Tag::List(_) => TagID::List,
			Tag::Compound(_) => TagID::Compound,
			Tag::IntArray(_) => TagID::IntArray,
			Tag::ShortArray(_) => TagID::ShortArray,
		}
	}
}

impl ListTag {
	/// The id of the elements, or `None` for an empty list.
	pub fn element_id(&self) -> Option<TagID> {
		Some(match self {
			ListTag::Empty => return None,
			ListTag::Byte(_) => TagID::Byte,
			ListTag::Short(_) => TagID::Short,
			ListTag::Int(_) => TagID::Int,
			ListTag::Long(_) => TagID::Long,
			ListTag::Float(_) => TagID::Float,
			ListTag::Double(_) => TagID::Double,
			ListTag::ByteArray(_) => TagID::ByteArray,
			ListTag::String(_) => TagID::String,
			ListTag::List(_) => TagID::List,
			ListTag::Compound(_) => TagID::Compound,
			ListTag::IntArray(_) => TagID::IntArray,
			ListTag::ShortArray(_) => TagID::ShortArray,
		})
	}

	pub fn len(&self) -> usize {
		match self {
			ListTag::Empty => 0,
			ListTag::Byte(list) => list.len(),
			ListTag::Short(list) => list.len(),
			ListTag::Int(list) => list.len(),
			ListTag::Long(list) => list.len(),
			ListTag::Float(list) => list.len(),
			ListTag::Double(list) => list.len(),
			ListTag::ByteArray(list) => list.len(),
			ListTag::String(list) => list.len(),
			ListTag::List(list) => list.len(),
			ListTag::Compound(list) => list.len(),
			ListTag::IntArray(list) => list.len(),
			ListTag::ShortArray(list) => list.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

macro_rules! tag_from_impls {
	($($type:ty => $variant:ident;)+) => {
		$(
			impl From<$type> for Tag {
				fn from(value: $type) -> Self {
					Tag::$variant(value)
				}
			}

			impl From<Vec<$type>> for ListTag {
				fn from(value: Vec<$type>) -> Self {
					if value.is_empty() {
						ListTag::Empty
					} else {
						ListTag::$variant(value)
					}
				}
			}
		)+
	};
}

tag_from_impls!(
	Byte => Byte;
	Short => Short;
	Int => Int;
	Long => Long;
	Float => Float;
	Double => Double;
	ByteArray => ByteArray;
	String => String;
	ListTag => List;
	Compound => Compound;
	IntArray => IntArray;
	ShortArray => ShortArray;
);

impl From<&str> for Tag {
	fn from(value: &str) -> Self {
		Tag::String(value.to_owned())
	}
}

impl From<bool> for Tag {
	fn from(value: bool) -> Self {
		Tag::Byte(value as i8)
	}
}
