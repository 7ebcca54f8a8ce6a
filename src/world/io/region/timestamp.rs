use std::io::{Read, Write};

use chrono::{DateTime, Utc};

use crate::{
	McResult,
	ioext::*,
};

/// A 32-bit Unix timestamp, as stored in the timestamp table.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Timestamp(u32);

impl Timestamp {
	pub const fn new(seconds: u32) -> Self {
		Self(seconds)
	}

	/// Get a [Timestamp] for the current time (in Utc).
	pub fn utc_now() -> Timestamp {
		Timestamp::from(Utc::now())
	}

	pub const fn seconds(self) -> u32 {
		self.0
	}

	pub fn to_datetime(self) -> Option<DateTime<Utc>> {
		DateTime::from_timestamp(self.0 as i64, 0)
	}
}

impl From<DateTime<Utc>> for Timestamp {
	fn from(value: DateTime<Utc>) -> Self {
		Timestamp(value.timestamp().clamp(0, u32::MAX as i64) as u32)
	}
}

impl Readable for Timestamp {
	fn read_from<R: Read>(reader: &mut R) -> McResult<Self> {
		Ok(Self(reader.read_value()?))
	}
}

impl Writable for Timestamp {
	fn write_to<W: Write>(&self, writer: &mut W) -> McResult<usize> {
		writer.write_value(self.0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn now_is_recent() {
		let now = Timestamp::utc_now();
		// 2020-01-01
		assert!(now.seconds() > 1_577_836_800);
		let datetime = now.to_datetime().unwrap();
		assert_eq!(Timestamp::from(datetime), now);
	}
}
