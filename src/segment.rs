//! A single append-only, preallocated log file for one data type.
//!
//! Grounded on `log_file.go`'s `LogFile` (open/name/read) combined with
//! `sonnerie::segment_reader`'s "decode or report the end" control flow.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::io::SegmentIo;
use crate::options::{DataType, LOG_FILE_PREFIX};
use crate::record::{self, HeaderOutcome, Record, MAX_HEADER_SIZE};

/// The outcome of reading a record at some offset.
pub(crate) enum ScanOutcome {
	/// A decoded record together with the number of bytes it occupied.
	Record(Record, u64),
	/// The offset is past the last record; the rest is zero-filled.
	EndOfSegment,
}

/// One preallocated log file: `log.<type>.<fid>` under the data
/// directory.
pub(crate) struct SegmentFile {
	pub(crate) fid: u32,
	io: SegmentIo,
	/// End offset of the last record successfully appended. Mutated only
	/// while the coordinator's segment-map lock is held, but read
	/// concurrently by readers, hence atomic.
	write_at: AtomicU64,
}

pub(crate) fn segment_path(dir: &Path, data_type: DataType, fid: u32) -> PathBuf {
	dir.join(format!("{}.{}.{}", LOG_FILE_PREFIX, data_type.token(), fid))
}

/// Parse `log.<type>.<fid>` into its data type and fid. Any other shape
/// is `None` and should be rejected by the caller.
pub(crate) fn parse_segment_filename(name: &str) -> Option<(DataType, u32)> {
	let mut parts = name.split('.');
	let prefix = parts.next()?;
	let type_token = parts.next()?;
	let fid = parts.next()?;
	if parts.next().is_some() || prefix != LOG_FILE_PREFIX {
		return None;
	}
	let data_type = DataType::from_token(type_token)?;
	let fid: u32 = fid.parse().ok()?;
	Some((data_type, fid))
}

impl SegmentFile {
	/// Open or create the segment for `(data_type, fid)`, preallocated to
	/// `size` bytes, with a fresh `write_at` of zero.
	///
	/// Recovery is responsible for overwriting `write_at` with the
	/// authoritative value once the active segment has been scanned.
	pub(crate) fn open(dir: &Path, fid: u32, data_type: DataType, size: u64) -> Result<SegmentFile> {
		let path = segment_path(dir, data_type, fid);
		let io = SegmentIo::open(&path, size)?;
		Ok(SegmentFile {
			fid,
			io,
			write_at: AtomicU64::new(0),
		})
	}

	pub(crate) fn write_at(&self) -> u64 {
		self.write_at.load(Ordering::SeqCst)
	}

	pub(crate) fn set_write_at(&self, value: u64) {
		self.write_at.store(value, Ordering::SeqCst);
	}

	/// Append an already-encoded record at the current `write_at`,
	/// advancing the cursor only if the write fully succeeds.
	///
	/// Returns the offset the record was written at.
	pub(crate) fn append(&self, encoded: &[u8]) -> Result<u64> {
		let offset = self.write_at();
		let written = self.io.write(offset, encoded)?;
		if written != encoded.len() {
			return Err(Error::WriteSizeNotEqual);
		}
		self.write_at.store(offset + written as u64, Ordering::SeqCst);
		Ok(offset)
	}

	/// Read and decode the record starting at `offset`.
	pub(crate) fn read_record(&self, offset: u64) -> Result<ScanOutcome> {
		let mut header_buf = [0u8; MAX_HEADER_SIZE];
		let read = self.io.read_partial(offset, &mut header_buf)?;

		let header = match record::decode_header(&header_buf[..read]) {
			HeaderOutcome::Header(h) => h,
			HeaderOutcome::EndOfSegment => return Ok(ScanOutcome::EndOfSegment),
		};

		let total_len = header.header_len + header.key_size + header.value_size;
		let mut buf = vec![0u8; total_len];
		let copy_len = read.min(total_len);
		buf[..copy_len].copy_from_slice(&header_buf[..copy_len]);
		if total_len > read {
			self.io.read(offset + read as u64, &mut buf[read..])?;
		}

		let record = record::decode_record(&buf, &header)?;
		Ok(ScanOutcome::Record(record, total_len as u64))
	}

	pub(crate) fn sync(&self) -> Result<()> {
		self.io.sync()
	}
}
