//! Nibble arrays store two 4-bit values per byte, low nibble first.

/// Packs 4-bit values two per byte. Values are masked to their low nibble.
/// An odd trailing value ends up alone in the low nibble of the last byte.
pub fn pack_nibbles<I: IntoIterator<Item = u8>>(values: I) -> Vec<i8> {
	let mut packed = Vec::new();
	let mut pending: Option<u8> = None;
	for value in values {
		let value = value & 0xF;
		match pending.take() {
			Some(low) => packed.push((low | (value << 4)) as i8),
			None => pending = Some(value),
		}
	}
	if let Some(low) = pending {
		packed.push(low as i8);
	}
	packed
}

/// Unpacks a nibble array into `out`, one value per byte.
/// `packed` must hold at least `out.len() / 2` bytes (rounded up).
pub fn unpack_nibbles(packed: &[i8], out: &mut [u8]) {
	let bytes: &[u8] = bytemuck::cast_slice(packed);
	for (index, value) in out.iter_mut().enumerate() {
		let byte = bytes[index >> 1];
		*value = if index & 1 == 0 {
			byte & 0xF
		} else {
			byte >> 4
		};
	}
}
