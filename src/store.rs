//! The coordinator: opens a data directory, recovers the index from
//! whatever log files are already there, and serializes writes across
//! segment rotation.
//!
//! Grounded on `db.go`'s `MyBitcask` (`Open`/`Close`/`writeLogEntry`/
//! `readLogEntry`/`loadLogFile`/`loadIndexFromLogFile`/`buildIndex`), with
//! `sonnerie::database_reader`'s pattern of keeping every segment file open
//! for the lifetime of the store.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use antidote::RwLock;

use crate::error::{Error, Result};
use crate::index::{IndexNode, StringIndex};
use crate::options::{DataType, Options};
use crate::record::{Record, RecordKind};
use crate::segment::{parse_segment_filename, ScanOutcome, SegmentFile};

pub(crate) fn now_unix() -> i64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs() as i64)
		.unwrap_or(0)
}

/// An embedded, crash-consistent, append-only-log key-value store.
pub struct Bitcask {
	options: Options,
	closed: AtomicBool,
	indexes: HashMap<DataType, StringIndex>,
	active: RwLock<HashMap<DataType, SegmentFile>>,
	archived: RwLock<HashMap<DataType, HashMap<u32, SegmentFile>>>,
}

/// Replay every segment belonging to one data type, rebuilding its index
/// and determining where the active segment's write cursor should resume.
///
/// Mirrors `loadIndexFromLogFile`/`buildStrIndex`: a `Put` upserts the
/// index entry, a `Delete` removes it outright (the tombstone itself
/// never becomes a live entry).
fn recover_data_type(
	dir: &Path,
	data_type: DataType,
	mut fids: Vec<u32>,
	threshold: u64,
) -> Result<(HashMap<u32, SegmentFile>, SegmentFile, StringIndex)> {
	if fids.is_empty() {
		fids.push(1);
	}

	let mut segments = Vec::with_capacity(fids.len());
	for fid in &fids {
		segments.push(SegmentFile::open(dir, *fid, data_type, threshold)?);
	}

	let index = StringIndex::new();
	let active_fid = *fids.last().unwrap();
	let now = now_unix();

	for seg in &segments {
		let mut offset = 0u64;
		loop {
			let outcome = match seg.read_record(offset) {
				Ok(outcome) => outcome,
				Err(Error::DecodeLogEntryHeader) => {
					log::warn!(
						"corrupt record in {:?} segment {} at offset {offset}, treating the rest as unwritten",
						data_type,
						seg.fid,
					);
					break;
				}
				Err(e) => return Err(e),
			};
			match outcome {
				ScanOutcome::EndOfSegment => break,
				ScanOutcome::Record(record, consumed) => {
					match record.kind {
						RecordKind::Put if record.expire_at != 0 && now > record.expire_at => {}
						RecordKind::Put => index.insert(
							&record.key,
							IndexNode {
								fid: seg.fid,
								offset,
								size: consumed,
								expire_at: record.expire_at,
							},
						),
						RecordKind::Delete => {
							index.remove(&record.key);
						}
					}
					offset += consumed;
				}
			}
		}
		if seg.fid == active_fid {
			seg.set_write_at(offset);
		}
	}

	let mut archived = HashMap::new();
	let mut active = None;
	for seg in segments {
		if seg.fid == active_fid {
			active = Some(seg);
		} else {
			archived.insert(seg.fid, seg);
		}
	}

	Ok((archived, active.expect("fids is never empty"), index))
}

impl Bitcask {
	/// Open (creating if necessary) the store at `options.dir_path`,
	/// recovering the index from any log files already present.
	///
	/// Recovery for each data type runs on its own thread, the direct
	/// equivalent of the original's `sync.WaitGroup` fan-out over
	/// `buildIndex`.
	pub fn open(options: Options) -> Result<Bitcask> {
		log::info!("opening embercask store at {:?}", options.dir_path);
		if options.log_file_size_threshold == 0 {
			return Err(Error::InvalidLogFileSize);
		}
		fs::create_dir_all(&options.dir_path)?;

		let mut fids_by_type: HashMap<DataType, Vec<u32>> =
			DataType::ALL.iter().map(|&dt| (dt, Vec::new())).collect();

		for entry in fs::read_dir(&options.dir_path)? {
			let entry = entry?;
			let path = entry.path();
			if !entry.file_type()?.is_file() {
				continue;
			}
			let name = path
				.file_name()
				.and_then(|n| n.to_str())
				.ok_or_else(|| Error::LogFileNameInvalid(path.clone()))?;
			let (data_type, fid) =
				parse_segment_filename(name).ok_or_else(|| Error::LogFileNameInvalid(path.clone()))?;
			fids_by_type.get_mut(&data_type).unwrap().push(fid);
		}
		for fids in fids_by_type.values_mut() {
			fids.sort_unstable();
		}

		let results: Vec<Result<(DataType, HashMap<u32, SegmentFile>, SegmentFile, StringIndex)>> =
			thread::scope(|scope| {
				let handles: Vec<_> = DataType::ALL
					.iter()
					.map(|&data_type| {
						let fids = fids_by_type[&data_type].clone();
						let dir = options.dir_path.clone();
						let threshold = options.log_file_size_threshold;
						scope.spawn(move || {
							recover_data_type(&dir, data_type, fids, threshold)
								.map(|(archived, active, index)| (data_type, archived, active, index))
						})
					})
					.collect();
				handles
					.into_iter()
					.map(|h| h.join().expect("recovery thread panicked"))
					.collect()
			});

		let mut active_map = HashMap::new();
		let mut archived_map = HashMap::new();
		let mut indexes = HashMap::new();
		for result in results {
			let (data_type, archived, active, index) = result?;
			log::debug!(
				"recovered {} live keys for {:?} across {} archived segment(s)",
				index.len(),
				data_type,
				archived.len(),
			);
			active_map.insert(data_type, active);
			archived_map.insert(data_type, archived);
			indexes.insert(data_type, index);
		}

		Ok(Bitcask {
			options,
			closed: AtomicBool::new(false),
			indexes,
			active: RwLock::new(active_map),
			archived: RwLock::new(archived_map),
		})
	}

	/// Sync every open segment and mark the store closed. Further reads or
	/// writes return [`Error::Closed`].
	pub fn close(&self) -> Result<()> {
		log::info!("closing embercask store at {:?}", self.options.dir_path);
		self.closed.store(true, Ordering::SeqCst);
		for seg in self.active.read().values() {
			seg.sync().inspect_err(|e| log::error!("failed to sync active segment: {e}"))?;
		}
		for segs in self.archived.read().values() {
			for seg in segs.values() {
				seg.sync().inspect_err(|e| log::error!("failed to sync archived segment: {e}"))?;
			}
		}
		Ok(())
	}

	pub(crate) fn index(&self, data_type: DataType) -> &StringIndex {
		&self.indexes[&data_type]
	}

	/// Append `record` to the active segment for `data_type`, rotating to
	/// a fresh segment first if it would overflow the size threshold.
	fn write_record(&self, data_type: DataType, record: &Record) -> Result<IndexNode> {
		if self.closed.load(Ordering::SeqCst) {
			return Err(Error::Closed);
		}
		let encoded = record.encode();

		let mut active = self.active.write();
		let current = active.get(&data_type).expect("every data type has an active segment");
		if current.write_at() + encoded.len() as u64 > self.options.log_file_size_threshold {
			let new_fid = current.fid + 1;
			log::debug!("rotating {data_type:?} segment {} -> {new_fid}", current.fid);
			current.sync()?;
			let new_segment =
				SegmentFile::open(&self.options.dir_path, new_fid, data_type, self.options.log_file_size_threshold)?;
			let old = active.insert(data_type, new_segment).expect("just checked it's present");
			self.archived
				.write()
				.entry(data_type)
				.or_default()
				.insert(old.fid, old);
		}

		let segment = active.get(&data_type).expect("just ensured one exists");
		let offset = segment.append(&encoded)?;
		Ok(IndexNode {
			fid: segment.fid,
			offset,
			size: encoded.len() as u64,
			expire_at: record.expire_at,
		})
	}

	fn read_record(&self, data_type: DataType, node: IndexNode) -> Result<Record> {
		if self.closed.load(Ordering::SeqCst) {
			return Err(Error::Closed);
		}

		let outcome = {
			let active = self.active.read();
			if let Some(segment) = active.get(&data_type) {
				if segment.fid == node.fid {
					Some(segment.read_record(node.offset)?)
				} else {
					None
				}
			} else {
				None
			}
		};
		let outcome = match outcome {
			Some(o) => o,
			None => {
				let archived = self.archived.read();
				let segment = archived
					.get(&data_type)
					.and_then(|m| m.get(&node.fid))
					.ok_or(Error::KeyNotFound)?;
				segment.read_record(node.offset)?
			}
		};

		match outcome {
			ScanOutcome::Record(record, _) => Ok(record),
			ScanOutcome::EndOfSegment => Err(Error::EndOfEntry),
		}
	}

	/// Write a live value for `key`, updating the index only after the
	/// record has been durably appended.
	pub(crate) fn store_put(&self, data_type: DataType, key: &[u8], value: &[u8], expire_at: i64) -> Result<()> {
		let record = Record::put(key, value, expire_at);
		let node = self.write_record(data_type, &record)?;
		self.indexes[&data_type].insert(key, node);
		Ok(())
	}

	/// Append a tombstone for `key` and drop it from the index. A no-op
	/// (but still durable) if the key was already absent.
	pub(crate) fn store_delete(&self, data_type: DataType, key: &[u8]) -> Result<()> {
		let record = Record::tombstone(key);
		self.write_record(data_type, &record)?;
		self.indexes[&data_type].remove(key);
		Ok(())
	}

	/// The live value for `key`, or `None` if it's absent or expired.
	pub(crate) fn store_get(&self, data_type: DataType, key: &[u8]) -> Result<Option<Vec<u8>>> {
		let node = match self.indexes[&data_type].search(key, now_unix()) {
			Some(n) => n,
			None => return Ok(None),
		};
		Ok(Some(self.read_record(data_type, node)?.value))
	}

	/// The index node for `key`, or `None` if it's absent or expired.
	pub(crate) fn index_node(&self, data_type: DataType, key: &[u8]) -> Option<IndexNode> {
		self.indexes[&data_type].search(key, now_unix())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn open_tmp() -> (tempfile::TempDir, Bitcask) {
		let dir = tempfile::tempdir().unwrap();
		let db = Bitcask::open(Options::new(dir.path())).unwrap();
		(dir, db)
	}

	#[test]
	fn put_then_get_round_trips() {
		let (_dir, db) = open_tmp();
		db.store_put(DataType::String, b"k", b"v", 0).unwrap();
		assert_eq!(db.store_get(DataType::String, b"k").unwrap(), Some(b"v".to_vec()));
	}

	#[test]
	fn delete_removes_the_value() {
		let (_dir, db) = open_tmp();
		db.store_put(DataType::String, b"k", b"v", 0).unwrap();
		db.store_delete(DataType::String, b"k").unwrap();
		assert_eq!(db.store_get(DataType::String, b"k").unwrap(), None);
	}

	#[test]
	fn reopen_recovers_live_data_and_tombstones() {
		let dir = tempfile::tempdir().unwrap();
		{
			let db = Bitcask::open(Options::new(dir.path())).unwrap();
			db.store_put(DataType::String, b"a", b"1", 0).unwrap();
			db.store_put(DataType::String, b"b", b"2", 0).unwrap();
			db.store_delete(DataType::String, b"a").unwrap();
			db.close().unwrap();
		}
		let db = Bitcask::open(Options::new(dir.path())).unwrap();
		assert_eq!(db.store_get(DataType::String, b"a").unwrap(), None);
		assert_eq!(db.store_get(DataType::String, b"b").unwrap(), Some(b"2".to_vec()));
	}

	#[test]
	fn rotation_creates_a_new_segment() {
		let dir = tempfile::tempdir().unwrap();
		let mut options = Options::new(dir.path());
		options.log_file_size_threshold = 64;
		let db = Bitcask::open(options).unwrap();
		for i in 0..10 {
			let key = format!("key-{i}");
			db.store_put(DataType::String, key.as_bytes(), b"some value", 0).unwrap();
		}
		assert!(db.active.read()[&DataType::String].fid > 1);
		assert!(!db.archived.read()[&DataType::String].is_empty());
	}

	#[test]
	fn operations_after_close_fail() {
		let (_dir, db) = open_tmp();
		db.close().unwrap();
		assert!(matches!(
			db.store_put(DataType::String, b"k", b"v", 0),
			Err(Error::Closed)
		));
	}

	#[test]
	fn an_empty_key_is_accepted_by_the_store_layer() {
		// Key non-emptiness is validated only by the Incr/Decr family in
		// `strings.rs`; the shared data-layer helpers here don't reject it.
		let (_dir, db) = open_tmp();
		db.store_put(DataType::String, b"", b"v", 0).unwrap();
		assert_eq!(db.store_get(DataType::String, b"").unwrap(), Some(b"v".to_vec()));
	}
}
