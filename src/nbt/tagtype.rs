use crate::McError;
use crate::nbt::Map;
use crate::nbt::tag::{
	Tag,
	ListTag,
};

pub type Byte = i8;
pub type Short = i16;
pub type Int = i32;
pub type Long = i64;
pub type Float = f32;
pub type Double = f64;
pub type ByteArray = Vec<i8>;
pub type String = std::string::String;
pub type Compound = Map;
pub type IntArray = Vec<i32>;
pub type ShortArray = Vec<i16>;

/// Converts an owned [Tag] into a concrete Rust value.
pub trait DecodeNbt: Sized {
	type Error;

	fn decode_nbt(nbt: Tag) -> Result<Self, Self::Error>;
}

macro_rules! decode_nbt_impls {
	($($type:ty => $variant:ident;)+) => {
		$(
			impl DecodeNbt for $type {
				type Error = McError;

				fn decode_nbt(nbt: Tag) -> Result<Self, Self::Error> {
					if let Tag::$variant(value) = nbt {
						Ok(value)
					} else {
						Err(McError::NbtDecodeError)
					}
				}
			}
		)+
	};
}

decode_nbt_impls!(
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

impl DecodeNbt for Tag {
	type Error = McError;

	fn decode_nbt(nbt: Tag) -> Result<Self, Self::Error> {
		Ok(nbt)
	}
}

/// `TAG_Byte` used as a flag.
impl DecodeNbt for bool {
	type Error = McError;

	fn decode_nbt(nbt: Tag) -> Result<Self, Self::Error> {
		Ok(Byte::decode_nbt(nbt)? != 0)
	}
}

/// A list of compounds. An empty list of any element kind is accepted.
impl DecodeNbt for Vec<Compound> {
	type Error = McError;

	fn decode_nbt(nbt: Tag) -> Result<Self, Self::Error> {
		match nbt {
			Tag::List(ListTag::Compound(items)) => Ok(items),
			Tag::List(list) if list.is_empty() => Ok(Vec::new()),
			_ => Err(McError::NbtDecodeError),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decode_values() {
		assert_eq!(Int::decode_nbt(Tag::Int(7)).unwrap(), 7);
		assert!(Int::decode_nbt(Tag::Short(7)).is_err());
		assert!(bool::decode_nbt(Tag::Byte(1)).unwrap());
		assert!(Vec::<Compound>::decode_nbt(Tag::List(ListTag::Empty)).unwrap().is_empty());
		assert!(Vec::<Compound>::decode_nbt(Tag::List(ListTag::Int(vec![1]))).is_err());
	}
}
