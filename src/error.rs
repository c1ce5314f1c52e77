//! The error taxonomy for the whole crate.

use std::path::PathBuf;

/// Everything that can go wrong talking to an [`crate::Bitcask`].
#[derive(thiserror::Error, Debug)]
pub enum Error {
	/// A file under the data directory didn't split into
	/// `log.<type>.<fid>` as expected.
	#[error("invalid log file name: {0:?}")]
	LogFileNameInvalid(PathBuf),

	/// `Options::log_file_size_threshold` was zero or negative.
	#[error("invalid log file size threshold")]
	InvalidLogFileSize,

	/// A positional write reported fewer bytes written than were given.
	#[error("write size is not equal to entry size")]
	WriteSizeNotEqual,

	/// A record header failed CRC validation or was otherwise malformed.
	#[error("unable to decode log entry header")]
	DecodeLogEntryHeader,

	/// Reached the zero-filled tail of a segment.
	#[error("end of entry in log file")]
	EndOfEntry,

	/// An index lookup produced a value that wasn't an `IndexNode`.
	#[error("index tree node can not be converted to an index")]
	InvalidIndexTreeNode,

	/// The key has no live record.
	#[error("key is not found")]
	KeyNotFound,

	/// A `nil`/empty key was given where one isn't allowed.
	#[error("key is nil")]
	KeyIsNil,

	/// `MGet`/`MSet`/`MSetNX` got zero, or an odd, number of arguments.
	#[error("number of arguments is not correct")]
	WrongNumOfArgs,

	/// `Incr`/`Decr` couldn't parse the stored value as a signed integer.
	#[error("value is not an integer")]
	WrongValueType,

	/// `Scan`'s pattern argument isn't a valid regular expression.
	#[error("invalid scan pattern: {0}")]
	InvalidPattern(String),

	/// `Incr`/`Decr` would overflow `i64`.
	#[error("increment or decrement overflow")]
	IntegerOverflow,

	/// The store has been closed and rejects further operations.
	#[error("the store is closed")]
	Closed,

	/// A lower-level I/O failure.
	#[error(transparent)]
	Io(#[from] std::io::Error),
}

/// Shorthand used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
