//! The on-disk record format: a CRC-checked header followed by key and
//! value bytes.
//!
//! See `entry.go`'s `LogEntry`/`encode`/`decodeHeader` in the original
//! implementation for the format this mirrors.

use integer_encoding::VarInt;

use crate::error::{Error, Result};

/// Header fields occupy at most this many bytes: a `u32` CRC, one type
/// byte, and three zig-zag varints, each up to 10 bytes in the worst case
/// for a full-width `i64`.
pub(crate) const MAX_HEADER_SIZE: usize = 5 + 3 * 10;

/// Whether a record is a live value or a tombstone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RecordKind {
	Put = 0,
	Delete = 1,
}

impl RecordKind {
	fn from_byte(b: u8) -> Option<RecordKind> {
		match b {
			0 => Some(RecordKind::Put),
			1 => Some(RecordKind::Delete),
			_ => None,
		}
	}
}

/// A single decoded log entry: a key, optionally a value, an expiry, and
/// whether it's a tombstone.
#[derive(Clone, Debug)]
pub(crate) struct Record {
	pub(crate) key: Vec<u8>,
	pub(crate) value: Vec<u8>,
	pub(crate) expire_at: i64,
	pub(crate) kind: RecordKind,
}

impl Record {
	pub(crate) fn put(key: &[u8], value: &[u8], expire_at: i64) -> Record {
		Record {
			key: key.to_vec(),
			value: value.to_vec(),
			expire_at,
			kind: RecordKind::Put,
		}
	}

	pub(crate) fn tombstone(key: &[u8]) -> Record {
		Record {
			key: key.to_vec(),
			value: Vec::new(),
			expire_at: 0,
			kind: RecordKind::Delete,
		}
	}

	/// Encode this record, returning the full on-disk byte sequence.
	pub(crate) fn encode(&self) -> Vec<u8> {
		let mut header = [0u8; MAX_HEADER_SIZE];
		header[4] = self.kind as u8;
		let mut index = 5;
		index += (self.key.len() as i64).encode_var(&mut header[index..]);
		index += (self.value.len() as i64).encode_var(&mut header[index..]);
		index += self.expire_at.encode_var(&mut header[index..]);

		let size = index + self.key.len() + self.value.len();
		let mut buf = vec![0u8; size];
		buf[..index].copy_from_slice(&header[..index]);
		buf[index..index + self.key.len()].copy_from_slice(&self.key);
		buf[index + self.key.len()..].copy_from_slice(&self.value);

		let crc = crc32fast::hash(&buf[4..]);
		buf[0..4].copy_from_slice(&crc.to_le_bytes());
		buf
	}
}

/// The fixed-size part of a record, decoded from the header bytes.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Header {
	pub(crate) crc32: u32,
	pub(crate) kind_byte: u8,
	pub(crate) key_size: usize,
	pub(crate) value_size: usize,
	pub(crate) expire_at: i64,
	/// Number of bytes the header itself occupied.
	pub(crate) header_len: usize,
}

/// The result of trying to decode a header at some offset.
pub(crate) enum HeaderOutcome {
	Header(Header),
	/// The zero-filled tail of a preallocated segment: not a record.
	EndOfSegment,
}

/// Decode just the fixed-size header fields from `buf`.
///
/// `buf` must be at least [`MAX_HEADER_SIZE`] bytes (or the remainder of
/// the segment, whichever is shorter); short reads are reported as
/// [`HeaderOutcome::EndOfSegment`] exactly as a genuine zero-filled tail
/// would be, since both mean "nothing valid starts here".
pub(crate) fn decode_header(buf: &[u8]) -> HeaderOutcome {
	if buf.len() < 6 {
		return HeaderOutcome::EndOfSegment;
	}

	let crc32 = u32::from_le_bytes(buf[0..4].try_into().unwrap());
	let kind_byte = buf[4];

	let mut index = 5;
	let (key_size, used) = match i64::decode_var(&buf[index..]) {
		Some(v) => v,
		None => return HeaderOutcome::EndOfSegment,
	};
	index += used;
	let (value_size, used) = match i64::decode_var(&buf[index..]) {
		Some(v) => v,
		None => return HeaderOutcome::EndOfSegment,
	};
	index += used;
	let (expire_at, used) = match i64::decode_var(&buf[index..]) {
		Some(v) => v,
		None => return HeaderOutcome::EndOfSegment,
	};
	index += used;

	// The preallocated, zero-filled tail of a segment decodes to a CRC of
	// zero and a key size of zero (a real key is never empty). Relying on
	// the CRC alone would also work, but checking the key size too means a
	// run of zero bytes is recognized before `key_size` is trusted as a
	// length to allocate.
	if crc32 == 0 || key_size == 0 {
		return HeaderOutcome::EndOfSegment;
	}

	if key_size < 0 || value_size < 0 {
		return HeaderOutcome::EndOfSegment;
	}

	HeaderOutcome::Header(Header {
		crc32,
		kind_byte,
		key_size: key_size as usize,
		value_size: value_size as usize,
		expire_at,
		header_len: index,
	})
}

/// Decode a complete record from a buffer that holds at least
/// `header.header_len + header.key_size + header.value_size` bytes
/// starting at its beginning, validating the CRC.
pub(crate) fn decode_record(buf: &[u8], header: &Header) -> Result<Record> {
	let crc = crc32fast::hash(&buf[4..]);
	if crc != header.crc32 {
		return Err(Error::DecodeLogEntryHeader);
	}

	let kind = RecordKind::from_byte(header.kind_byte).ok_or(Error::DecodeLogEntryHeader)?;

	let key_start = header.header_len;
	let value_start = key_start + header.key_size;
	let value_end = value_start + header.value_size;

	Ok(Record {
		key: buf[key_start..value_start].to_vec(),
		value: buf[value_start..value_end].to_vec(),
		expire_at: header.expire_at,
		kind,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_a_put() {
		let rec = Record::put(b"hello", b"world", 0);
		let buf = rec.encode();
		let header = match decode_header(&buf) {
			HeaderOutcome::Header(h) => h,
			HeaderOutcome::EndOfSegment => panic!("should not be end of segment"),
		};
		let decoded = decode_record(&buf, &header).unwrap();
		assert_eq!(decoded.key, b"hello");
		assert_eq!(decoded.value, b"world");
		assert_eq!(decoded.kind, RecordKind::Put);
	}

	#[test]
	fn round_trips_a_tombstone_with_empty_value() {
		let rec = Record::tombstone(b"gone");
		let buf = rec.encode();
		let header = match decode_header(&buf) {
			HeaderOutcome::Header(h) => h,
			HeaderOutcome::EndOfSegment => panic!("should not be end of segment"),
		};
		let decoded = decode_record(&buf, &header).unwrap();
		assert_eq!(decoded.key, b"gone");
		assert!(decoded.value.is_empty());
		assert_eq!(decoded.kind, RecordKind::Delete);
	}

	#[test]
	fn zero_filled_tail_is_end_of_segment() {
		let zeros = vec![0u8; MAX_HEADER_SIZE];
		assert!(matches!(decode_header(&zeros), HeaderOutcome::EndOfSegment));
	}

	#[test]
	fn corrupted_crc_fails_decode() {
		let rec = Record::put(b"k", b"v", 0);
		let mut buf = rec.encode();
		buf[0] ^= 0xff;
		let header = match decode_header(&buf) {
			HeaderOutcome::Header(h) => h,
			HeaderOutcome::EndOfSegment => panic!("should not be end of segment"),
		};
		assert!(decode_record(&buf, &header).is_err());
	}

	#[test]
	fn preserves_an_expiry() {
		let rec = Record::put(b"k", b"v", -42);
		let buf = rec.encode();
		let header = match decode_header(&buf) {
			HeaderOutcome::Header(h) => h,
			HeaderOutcome::EndOfSegment => panic!("should not be end of segment"),
		};
		assert_eq!(header.expire_at, -42);
	}
}
