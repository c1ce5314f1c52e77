//! Positional read/write/sync/delete of a preallocated segment file.
//!
//! Grounded on `sonnerie::block_file::BlockFile`, which does the same
//! thing for sonnerie's block file; the difference here is that failures
//! are propagated as `Result` instead of panicking, since a single
//! misbehaving segment must not bring a multi-data-type store down.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;

use crate::error::{Error, Result};

/// A single preallocated, positionally-addressed file.
pub(crate) struct SegmentIo {
	file: File,
}

impl SegmentIo {
	/// Open (creating if necessary) `path`, preallocating it to `size`
	/// bytes if it's currently smaller.
	pub(crate) fn open(path: &Path, size: u64) -> Result<SegmentIo> {
		let file = OpenOptions::new()
			.read(true)
			.write(true)
			.create(true)
			.open(path)?;

		if file.metadata()?.len() < size {
			file.set_len(size)?;
		}

		Ok(SegmentIo { file })
	}

	/// Write `data` at `offset`, failing if the OS reports a short write.
	pub(crate) fn write(&self, offset: u64, data: &[u8]) -> Result<usize> {
		self.file.write_at(data, offset)?;
		Ok(data.len())
	}

	/// Read exactly `buf.len()` bytes starting at `offset`.
	pub(crate) fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
		let read = self.read_partial(offset, buf)?;
		if read != buf.len() {
			return Err(Error::Io(std::io::Error::new(
				std::io::ErrorKind::UnexpectedEof,
				"short read on segment file",
			)));
		}
		Ok(())
	}

	/// Read up to `buf.len()` bytes starting at `offset`, returning the
	/// number actually read (shorter than `buf.len()` only near EOF).
	pub(crate) fn read_partial(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
		let mut total = 0;
		loop {
			match self.file.read_at(&mut buf[total..], offset + total as u64) {
				Ok(0) => break,
				Ok(n) => total += n,
				Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
				Err(e) => return Err(Error::Io(e)),
			}
			if total == buf.len() {
				break;
			}
		}
		Ok(total)
	}

	pub(crate) fn sync(&self) -> Result<()> {
		self.file.sync_all()?;
		Ok(())
	}

	pub(crate) fn delete(self, path: &Path) -> Result<()> {
		drop(self.file);
		std::fs::remove_file(path)?;
		Ok(())
	}
}
