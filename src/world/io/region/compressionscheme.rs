use std::io::{Read, Write};

use flate2::{
	read::{GzDecoder, ZlibDecoder},
	write::{GzEncoder, ZlibEncoder},
	Compression,
};

use crate::{
	McResult, McError,
	ioext::*,
};

/// Compression scheme byte that precedes every chunk record.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionScheme {
	/// GZip compression is used.
	GZip = 1,
	/// ZLib (deflate) compression is used.
	#[default]
	ZLib = 2,
}

impl CompressionScheme {
	pub fn compress(self, data: &[u8]) -> McResult<Vec<u8>> {
		Ok(match self {
			CompressionScheme::GZip => {
				let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
				encoder.write_all(data)?;
				encoder.finish()?
			}
			CompressionScheme::ZLib => {
				let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
				encoder.write_all(data)?;
				encoder.finish()?
			}
		})
	}

	pub fn decompress(self, data: &[u8]) -> McResult<Vec<u8>> {
		let mut output = Vec::new();
		match self {
			CompressionScheme::GZip => {
				GzDecoder::new(data).read_to_end(&mut output)?;
			}
			CompressionScheme::ZLib => {
				ZlibDecoder::new(data).read_to_end(&mut output)?;
			}
		}
		Ok(output)
	}
}

impl TryFrom<u8> for CompressionScheme {
	type Error = McError;

	fn try_from(value: u8) -> McResult<Self> {
		match value {
			1 => Ok(Self::GZip),
			2 => Ok(Self::ZLib),
			unexpected => Err(McError::InvalidCompressionScheme(unexpected)),
		}
	}
}

impl Writable for CompressionScheme {
	fn write_to<W: Write>(&self, writer: &mut W) -> McResult<usize> {
		writer.write_value(*self as u8)
	}
}

impl Readable for CompressionScheme {
	fn read_from<R: Read>(reader: &mut R) -> McResult<Self> {
		Self::try_from(reader.read_value::<u8>()?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn both_schemes() {
		let data = b"chunk chunk chunk chunk chunk".repeat(10);
		for scheme in [CompressionScheme::GZip, CompressionScheme::ZLib] {
			let packed = scheme.compress(&data).unwrap();
			assert!(packed.len() < data.len());
			assert_eq!(scheme.decompress(&packed).unwrap(), data);
		}
		// gzip magic
		assert_eq!(&CompressionScheme::GZip.compress(b"x").unwrap()[..2], &[0x1f, 0x8b]);
	}

	#[test]
	fn scheme_byte() {
		assert!(matches!(CompressionScheme::try_from(3), Err(McError::InvalidCompressionScheme(3))));
		let mut reader: &[u8] = &[2];
		assert_eq!(CompressionScheme::read_from(&mut reader).unwrap(), CompressionScheme::ZLib);
		assert!(CompressionScheme::ZLib.decompress(b"not zlib").is_err());
	}
}
