/// Shorthand way to create a Tag::Compound.
/// Example:
/// ```no_run
/// # use mcworld::compound;
/// compound!{
///     ("Item One", 0i8),
///     (String::from("Item Two"), 2i32),
/// };
/// ```
#[macro_export]
macro_rules! compound {
	($(($name:expr, $value:expr)),+$(,)?) => {
		$crate::nbt::tag::Tag::Compound($crate::nbt::Map::from([
			$(
				(::std::string::String::from($name), $crate::nbt::tag::Tag::from($value)),
			)+
		]))
	};
	() => {
		$crate::nbt::tag::Tag::Compound($crate::nbt::Map::new())
	};
}

/// Removes an entry from a Map and decodes it into the requested type.
/// Entries are removed with `shift_remove` so whatever is left in the map
/// keeps its original order.
/// ```rust,ignore
/// let value: Byte = map_decoder!(map; "some tag" -> Byte);
/// // In case the value might not exist.
/// let option: Option<Byte> = map_decoder!(map; "some tag" -> Option<Byte>);
/// ```
#[macro_export]
macro_rules! map_decoder {
	($map:expr; $name:literal) => {
		$map.shift_remove($name).ok_or($crate::McError::NotFoundInCompound($name.to_owned()))?
	};
	($map:expr; $name:literal -> Option<$type:ty>) => {
		if let Some(tag) = $map.shift_remove($name) {
			Some(<$type as $crate::nbt::DecodeNbt>::decode_nbt(tag)?)
		} else {
			None
		}
	};
	($map:expr; $name:literal -> $type:ty) => {
		<$type as $crate::nbt::DecodeNbt>::decode_nbt(
			$map.shift_remove($name).ok_or($crate::McError::NotFoundInCompound($name.to_owned()))?
		)?
	};
}

#[cfg(test)]
mod tests {
	use crate::McError;
	use crate::McResult;
	use crate::nbt::*;

	#[test]
	fn compound_keeps_order() {
		let tag = compound! {
			("b", 1i8),
			(String::from("a"), "text"),
		};
		let Tag::Compound(map) = tag else {
			panic!("not a compound");
		};
		assert_eq!(map.get_index(0).map(|(k, _)| k.as_str()), Some("b"));
		assert_eq!(map.get("a"), Some(&Tag::String("text".to_owned())));
	}

	#[test]
	fn decoder_removes_entries() {
		fn decode(mut map: Map) -> McResult<(i32, Option<i8>, Map)> {
			let x = map_decoder!(map; "x" -> i32);
			let flag = map_decoder!(map; "flag" -> Option<i8>);
			Ok((x, flag, map))
		}
		let map = Map::from([
			("x".to_owned(), Tag::Int(4)),
			("keep".to_owned(), Tag::Byte(0)),
			("other".to_owned(), Tag::Byte(1)),
		]);
		let (x, flag, rest) = decode(map).unwrap();
		assert_eq!(x, 4);
		assert_eq!(flag, None);
		assert_eq!(rest.keys().collect::<Vec<_>>(), vec!["keep", "other"]);
		assert!(matches!(decode(Map::new()), Err(McError::NotFoundInCompound(name)) if name == "x"));
	}
}
