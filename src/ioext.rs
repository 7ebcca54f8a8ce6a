//! Big-endian read/write helpers shared by the region file and the NBT codec.

use std::io::{
	self,
	Read, Write,
	SeekFrom,
};

use byteorder::{
	BigEndian,
	ReadBytesExt,
	WriteBytesExt,
};

use crate::McResult;

/// A value that can be read (big-endian) from a reader.
pub trait Readable: Sized {
	fn read_from<R: Read>(reader: &mut R) -> McResult<Self>;
}

/// A value that can be written (big-endian) to a writer.
/// Returns the number of bytes that were written.
pub trait Writable {
	fn write_to<W: Write>(&self, writer: &mut W) -> McResult<usize>;
}

/// A value that knows where it lives in a file.
pub trait Seekable {
	fn seeker(&self) -> SeekFrom;
}

pub trait ReadExt {
	fn read_value<T: Readable>(&mut self) -> McResult<T>;
}

pub trait WriteExt {
	fn write_value<T: Writable>(&mut self, value: T) -> McResult<usize>;
}

impl<R: Read> ReadExt for R {
	#[inline(always)]
	fn read_value<T: Readable>(&mut self) -> McResult<T> {
		T::read_from(self)
	}
}

impl<W: Write> WriteExt for W {
	#[inline(always)]
	fn write_value<T: Writable>(&mut self, value: T) -> McResult<usize> {
		value.write_to(self)
	}
}

macro_rules! __primitive_io {
	($type:ty, $read:ident, $write:ident) => {
		impl Readable for $type {
			fn read_from<R: Read>(reader: &mut R) -> McResult<Self> {
				Ok(reader.$read::<BigEndian>()?)
			}
		}

		impl Writable for $type {
			fn write_to<W: Write>(&self, writer: &mut W) -> McResult<usize> {
				writer.$write::<BigEndian>(*self)?;
				Ok(std::mem::size_of::<$type>())
			}
		}
	};
}

__primitive_io!(u16, read_u16, write_u16);
__primitive_io!(u32, read_u32, write_u32);
__primitive_io!(u64, read_u64, write_u64);
__primitive_io!(i16, read_i16, write_i16);
__primitive_io!(i32, read_i32, write_i32);
__primitive_io!(i64, read_i64, write_i64);
__primitive_io!(f32, read_f32, write_f32);
__primitive_io!(f64, read_f64, write_f64);

impl Readable for u8 {
	fn read_from<R: Read>(reader: &mut R) -> McResult<Self> {
		Ok(reader.read_u8()?)
	}
}

impl Writable for u8 {
	fn write_to<W: Write>(&self, writer: &mut W) -> McResult<usize> {
		writer.write_u8(*self)?;
		Ok(1)
	}
}

impl Readable for i8 {
	fn read_from<R: Read>(reader: &mut R) -> McResult<Self> {
		Ok(reader.read_i8()?)
	}
}

impl Writable for i8 {
	fn write_to<W: Write>(&self, writer: &mut W) -> McResult<usize> {
		writer.write_i8(*self)?;
		Ok(1)
	}
}

pub trait WriteZeroes {
	fn write_zeroes(&mut self, count: u64) -> io::Result<u64>;
}

impl<T: Write> WriteZeroes for T {
	fn write_zeroes(&mut self, count: u64) -> io::Result<u64> {
		const ZEROES: &'static [u8; 4096] = &[0u8; 4096];
		let mut remainder = count;
		while remainder >= ZEROES.len() as u64 {
			self.write_all(ZEROES)?;
			remainder -= ZEROES.len() as u64;
		}
		if remainder != 0 {
			self.write_all(&ZEROES[0..remainder as usize])?;
		}
		Ok(count)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;

	#[test]
	fn big_endian_values() {
		let mut buf = Vec::new();
		buf.write_value(0x01020304u32).unwrap();
		buf.write_value(-2i16).unwrap();
		buf.write_value(7u8).unwrap();
		assert_eq!(buf, vec![1, 2, 3, 4, 0xFF, 0xFE, 7]);
		let mut reader = Cursor::new(buf);
		assert_eq!(reader.read_value::<u32>().unwrap(), 0x01020304);
		assert_eq!(reader.read_value::<i16>().unwrap(), -2);
		assert_eq!(reader.read_value::<u8>().unwrap(), 7);
		assert!(reader.read_value::<u8>().is_err());
	}

	#[test]
	fn zeroes() {
		let mut buf = Vec::new();
		assert_eq!(buf.write_zeroes(5000).unwrap(), 5000);
		assert_eq!(buf.len(), 5000);
		assert!(buf.iter().all(|&b| b == 0));
	}
}
