use std::{
	fs::File,
	io::{ErrorKind, Read, Write},
	path::{Path, PathBuf},
};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use chrono::Utc;
use log::debug;

use crate::{return_if, McError, McResult};

pub const LOCK_FILE_NAME: &str = "session.lock";

/// Single writer token for a world folder.
///
/// Acquiring the lock writes a new token to `session.lock`, which silently
/// invalidates any handle that acquired it earlier.
#[derive(Debug)]
pub struct SessionLock {
	path: PathBuf,
	token: i64,
}

fn read_token(path: &Path) -> McResult<Option<i64>> {
	let mut file = match File::open(path) {
		Ok(file) => file,
		Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
		Err(err) => return Err(err.into()),
	};
	let mut bytes = Vec::with_capacity(8);
	file.read_to_end(&mut bytes)?;
	return_if!(bytes.len() < 8 => Ok(None));
	Ok(Some((&bytes[..8]).read_i64::<BigEndian>()?))
}

impl SessionLock {
	/// Takes the lock of the folder at `root`.
	/// The token is the current time in milliseconds, or one past the
	/// previous token if that is not older.
	pub fn acquire<P: AsRef<Path>>(root: P) -> McResult<Self> {
		let path = root.as_ref().join(LOCK_FILE_NAME);
		let now = Utc::now().timestamp_millis();
		let token = match read_token(&path)? {
			Some(previous) if previous >= now => previous + 1,
			_ => now,
		};
		let mut file = File::create(&path)?;
		file.write_i64::<BigEndian>(token)?;
		file.flush()?;
		debug!("Acquired session lock {} ({token})", path.display());
		Ok(Self {
			path,
			token,
		})
	}

	pub fn token(&self) -> i64 {
		self.token
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Fails with [McError::SessionLockLost] if another handle has taken
	/// the lock since this one acquired it.
	pub fn check(&self) -> McResult<()> {
		match read_token(&self.path)? {
			Some(token) if token == self.token => Ok(()),
			_ => Err(McError::SessionLockLost(self.path.clone())),
		}
	}
}
