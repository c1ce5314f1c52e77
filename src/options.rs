//! Configuration and the `DataType` enumeration.

use std::path::PathBuf;

/// Options controlling how a [`crate::Bitcask`] is opened.
#[derive(Clone, Debug)]
pub struct Options {
	/// Directory holding all log files. Created with mode `0755` if it
	/// doesn't exist yet.
	pub dir_path: PathBuf,

	/// Maximum size, in bytes, of an active log file before it is rotated
	/// out and archived. Must be positive.
	pub log_file_size_threshold: u64,
}

/// Default threshold before a segment is rotated: 512 MiB.
pub const DEFAULT_LOG_FILE_SIZE_THRESHOLD: u64 = 512 << 20;

impl Options {
	/// Options with the default 512 MiB rotation threshold.
	pub fn new(dir_path: impl Into<PathBuf>) -> Options {
		Options {
			dir_path: dir_path.into(),
			log_file_size_threshold: DEFAULT_LOG_FILE_SIZE_THRESHOLD,
		}
	}
}

/// The data structure type a record belongs to.
///
/// Only [`DataType::String`] has a command surface today; the others exist
/// so the segment-naming scheme and recovery loop are uniform across data
/// types that may be added later without an on-disk format change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DataType {
	String,
	List,
	Hash,
	Set,
	ZSet,
}

impl DataType {
	pub(crate) const ALL: [DataType; 5] = [
		DataType::String,
		DataType::List,
		DataType::Hash,
		DataType::Set,
		DataType::ZSet,
	];

	/// The token used in segment filenames, `log.<token>.<fid>`.
	pub(crate) fn token(self) -> &'static str {
		match self {
			DataType::String => "strs",
			DataType::List => "list",
			DataType::Hash => "hash",
			DataType::Set => "sets",
			DataType::ZSet => "zset",
		}
	}

	pub(crate) fn from_token(token: &str) -> Option<DataType> {
		match token {
			"strs" => Some(DataType::String),
			"list" => Some(DataType::List),
			"hash" => Some(DataType::Hash),
			"sets" => Some(DataType::Set),
			"zset" => Some(DataType::ZSet),
			_ => None,
		}
	}
}

pub(crate) const LOG_FILE_PREFIX: &str = "log";
