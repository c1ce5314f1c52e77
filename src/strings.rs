//! The `String` command surface: `Set`/`Get`/`MGet`/`MSet`/`MSetNX`/
//! `SetEX`/`SetNX`/`GetDel`/`Delete`/`Append`/`Incr`/`IncrBy`/`Decr`/
//! `DecrBy`/`GetRange`/`StrLen`/`Count`/`Scan`/`Expire`/`TTL`/`Persist`/
//! `Keys`.
//!
//! Grounded line-for-line on `strs.go`.

use std::collections::HashMap;

use regex::Regex;

use crate::error::{Error, Result};
use crate::options::DataType;
use crate::store::{now_unix, Bitcask};

const DT: DataType = DataType::String;

impl Bitcask {
	/// Set `key` to `value` with no expiry.
	pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
		self.store_put(DT, key, value, 0)
	}

	/// Set `key` to `value`, expiring after `ttl_seconds`.
	pub fn setex(&self, key: &[u8], value: &[u8], ttl_seconds: i64) -> Result<()> {
		self.store_put(DT, key, value, now_unix() + ttl_seconds)
	}

	/// Set `key` to `value` only if it doesn't already exist (or has
	/// expired). Returns whether the value was set.
	pub fn setnx(&self, key: &[u8], value: &[u8]) -> Result<bool> {
		if self.store_get(DT, key)?.is_some() {
			return Ok(false);
		}
		self.set(key, value)?;
		Ok(true)
	}

	/// The live value for `key`.
	pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
		self.store_get(DT, key)?.ok_or(Error::KeyNotFound)
	}

	/// The value for each of `keys`, in order; `None` for any key that's
	/// absent or expired.
	pub fn mget(&self, keys: &[&[u8]]) -> Result<Vec<Option<Vec<u8>>>> {
		keys.iter().map(|key| self.store_get(DT, key)).collect()
	}

	/// Set every key/value pair in `kvs` (a flat `[k1, v1, k2, v2, ...]`
	/// slice).
	pub fn mset(&self, kvs: &[&[u8]]) -> Result<()> {
		if kvs.is_empty() || kvs.len() % 2 != 0 {
			return Err(Error::WrongNumOfArgs);
		}
		for pair in kvs.chunks(2) {
			self.set(pair[0], pair[1])?;
		}
		Ok(())
	}

	/// Set every key/value pair in `kvs`, but only if none of the keys
	/// already exist. All-or-nothing: if any key is already present,
	/// nothing is written and `false` is returned.
	///
	/// Keys repeated within `kvs` are not a conflict with each other; the
	/// last occurrence of a repeated key wins.
	pub fn msetnx(&self, kvs: &[&[u8]]) -> Result<bool> {
		if kvs.is_empty() || kvs.len() % 2 != 0 {
			return Err(Error::WrongNumOfArgs);
		}

		let mut last_write_wins: HashMap<&[u8], &[u8]> = HashMap::new();
		for pair in kvs.chunks(2) {
			last_write_wins.insert(pair[0], pair[1]);
		}

		for key in last_write_wins.keys() {
			if self.store_get(DT, key)?.is_some() {
				return Ok(false);
			}
		}
		for (key, value) in &last_write_wins {
			self.set(key, value)?;
		}
		Ok(true)
	}

	/// Remove `key` and return its value, or an empty value if it was
	/// already absent or expired.
	pub fn getdel(&self, key: &[u8]) -> Result<Vec<u8>> {
		match self.store_get(DT, key)? {
			Some(value) => {
				self.store_delete(DT, key)?;
				Ok(value)
			}
			None => Ok(Vec::new()),
		}
	}

	/// Remove `key`. A no-op if it was already absent.
	pub fn delete(&self, key: &[u8]) -> Result<()> {
		self.store_delete(DT, key)
	}

	/// Append `value` to whatever is currently stored at `key` (treating
	/// an absent key as an empty string). Behaves like `Set` for the
	/// resulting entry, clearing any prior TTL.
	pub fn append(&self, key: &[u8], value: &[u8]) -> Result<()> {
		let mut joined = self.store_get(DT, key)?.unwrap_or_default();
		joined.extend_from_slice(value);
		self.store_put(DT, key, &joined, 0)
	}

	/// Increment the integer value at `key` by one.
	pub fn incr(&self, key: &[u8]) -> Result<i64> {
		self.incr_decr_by(key, 1)
	}

	/// Increment the integer value at `key` by `delta`.
	pub fn incr_by(&self, key: &[u8], delta: i64) -> Result<i64> {
		self.incr_decr_by(key, delta)
	}

	/// Decrement the integer value at `key` by one.
	pub fn decr(&self, key: &[u8]) -> Result<i64> {
		self.incr_decr_by(key, -1)
	}

	/// Decrement the integer value at `key` by `delta`.
	pub fn decr_by(&self, key: &[u8], delta: i64) -> Result<i64> {
		let delta = delta.checked_neg().ok_or(Error::IntegerOverflow)?;
		self.incr_decr_by(key, delta)
	}

	fn incr_decr_by(&self, key: &[u8], delta: i64) -> Result<i64> {
		if key.is_empty() {
			return Err(Error::KeyIsNil);
		}
		let expire_at = self.index_node(DT, key).map(|n| n.expire_at).unwrap_or(0);
		let current: i64 = match self.store_get(DT, key)? {
			Some(value) => std::str::from_utf8(&value)
				.ok()
				.and_then(|s| s.parse().ok())
				.ok_or(Error::WrongValueType)?,
			None => 0,
		};
		let updated = current.checked_add(delta).ok_or(Error::IntegerOverflow)?;
		self.store_put(DT, key, updated.to_string().as_bytes(), expire_at)?;
		Ok(updated)
	}

	/// The substring of the value at `key` spanned by `[start, end]`
	/// (inclusive, zero-indexed), with negative indices counting from the
	/// end as in Redis's `GETRANGE`. Out-of-range indices clamp rather
	/// than error.
	pub fn get_range(&self, key: &[u8], start: i64, end: i64) -> Result<Vec<u8>> {
		let value = self.store_get(DT, key)?.unwrap_or_default();
		let len = value.len() as i64;
		if len == 0 {
			return Ok(Vec::new());
		}

		// Negative indices count from the end. Only `end` is clamped on the
		// high side to the last valid offset; a `start` that's still beyond
		// the value after the negative-index adjustment is left as-is, so
		// it stays greater than `end` and falls through to the empty case.
		let adjust = |i: i64| -> i64 { if i < 0 { len + i } else { i } };

		let start = adjust(start).max(0);
		let end = adjust(end).clamp(0, len - 1);
		if start > end {
			return Ok(Vec::new());
		}
		Ok(value[start as usize..=end as usize].to_vec())
	}

	/// The byte length of the value at `key`, or zero if it's absent.
	pub fn strlen(&self, key: &[u8]) -> Result<usize> {
		Ok(self.store_get(DT, key)?.map(|v| v.len()).unwrap_or(0))
	}

	/// The number of live (non-expired) string keys.
	pub fn count(&self) -> usize {
		self.index(DT).len()
	}

	/// Walk every live key under `prefix` whose name matches `pattern` (a
	/// regular expression), in lexicographic order, returning the matches
	/// as a flat `[k1, v1, k2, v2, ...]` sequence and stopping once that
	/// sequence reaches `2 * count` elements (i.e. `count` pairs).
	pub fn scan(&self, prefix: &[u8], pattern: &str, count: usize) -> Result<Vec<Vec<u8>>> {
		if count == 0 {
			return Ok(Vec::new());
		}
		let re = Regex::new(pattern).map_err(|e| Error::InvalidPattern(e.to_string()))?;
		let max_len = count * 2;
		let mut results = Vec::new();

		self.index(DT).for_each_prefix(prefix, now_unix(), |key, _node| {
			if re.is_match(&String::from_utf8_lossy(key)) {
				if let Ok(Some(value)) = self.store_get(DT, key) {
					results.push(key.to_vec());
					results.push(value);
				}
			}
			results.len() < max_len
		});
		Ok(results)
	}

	/// All live keys, in lexicographic order.
	pub fn keys(&self) -> Vec<Vec<u8>> {
		self.index(DT).keys(now_unix())
	}

	/// Set `key`'s expiry to `ttl_seconds` from now. A non-positive
	/// `ttl_seconds` is a no-op, leaving any existing expiry untouched.
	/// Returns `false` if the key doesn't exist.
	pub fn expire(&self, key: &[u8], ttl_seconds: i64) -> Result<bool> {
		if ttl_seconds <= 0 {
			return Ok(false);
		}
		match self.store_get(DT, key)? {
			Some(value) => {
				self.store_put(DT, key, &value, now_unix() + ttl_seconds)?;
				Ok(true)
			}
			None => Ok(false),
		}
	}

	/// Seconds remaining before `key` expires: `-1` if it has no expiry,
	/// `None` if it doesn't exist.
	pub fn ttl(&self, key: &[u8]) -> Option<i64> {
		let node = self.index_node(DT, key)?;
		if node.expire_at == 0 {
			Some(-1)
		} else {
			Some((node.expire_at - now_unix()).max(0))
		}
	}

	/// Remove any expiry on `key`. Returns `false` if the key doesn't
	/// exist.
	pub fn persist(&self, key: &[u8]) -> Result<bool> {
		match self.store_get(DT, key)? {
			Some(value) => {
				self.store_put(DT, key, &value, 0)?;
				Ok(true)
			}
			None => Ok(false),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::options::Options;
	use crate::store::Bitcask;

	fn open_tmp() -> (tempfile::TempDir, Bitcask) {
		let dir = tempfile::tempdir().unwrap();
		let db = Bitcask::open(Options::new(dir.path())).unwrap();
		(dir, db)
	}

	#[test]
	fn set_then_get_round_trips() {
		let (_dir, db) = open_tmp();
		db.set(b"k", b"v").unwrap();
		assert_eq!(db.get(b"k").unwrap(), b"v");
	}

	#[test]
	fn get_missing_key_errors() {
		let (_dir, db) = open_tmp();
		assert!(matches!(db.get(b"nope"), Err(Error::KeyNotFound)));
	}

	#[test]
	fn getdel_on_missing_key_is_empty_not_error() {
		let (_dir, db) = open_tmp();
		assert_eq!(db.getdel(b"nope").unwrap(), Vec::<u8>::new());
	}

	#[test]
	fn getdel_removes_the_key() {
		let (_dir, db) = open_tmp();
		db.set(b"k", b"v").unwrap();
		assert_eq!(db.getdel(b"k").unwrap(), b"v");
		assert!(matches!(db.get(b"k"), Err(Error::KeyNotFound)));
	}

	#[test]
	fn mget_reports_absent_keys_as_none() {
		let (_dir, db) = open_tmp();
		db.set(b"a", b"1").unwrap();
		let got = db.mget(&[b"a", b"missing"]).unwrap();
		assert_eq!(got, vec![Some(b"1".to_vec()), None]);
	}

	#[test]
	fn mset_sets_every_pair() {
		let (_dir, db) = open_tmp();
		db.mset(&[b"a", b"1", b"b", b"2"]).unwrap();
		assert_eq!(db.get(b"a").unwrap(), b"1");
		assert_eq!(db.get(b"b").unwrap(), b"2");
	}

	#[test]
	fn mset_rejects_odd_arg_count() {
		let (_dir, db) = open_tmp();
		assert!(matches!(db.mset(&[b"a"]), Err(Error::WrongNumOfArgs)));
	}

	#[test]
	fn msetnx_fails_entirely_if_one_key_exists() {
		let (_dir, db) = open_tmp();
		db.set(b"b", b"old").unwrap();
		let applied = db.msetnx(&[b"a", b"1", b"b", b"2"]).unwrap();
		assert!(!applied);
		assert!(matches!(db.get(b"a"), Err(Error::KeyNotFound)));
		assert_eq!(db.get(b"b").unwrap(), b"old");
	}

	#[test]
	fn msetnx_intra_batch_duplicate_is_last_write_wins() {
		let (_dir, db) = open_tmp();
		let applied = db.msetnx(&[b"a", b"1", b"a", b"2"]).unwrap();
		assert!(applied);
		assert_eq!(db.get(b"a").unwrap(), b"2");
	}

	#[test]
	fn append_to_absent_key_behaves_like_set() {
		let (_dir, db) = open_tmp();
		db.append(b"k", b"hello").unwrap();
		assert_eq!(db.get(b"k").unwrap(), b"hello");
	}

	#[test]
	fn append_extends_existing_value() {
		let (_dir, db) = open_tmp();
		db.set(b"k", b"hello").unwrap();
		db.append(b"k", b" world").unwrap();
		assert_eq!(db.get(b"k").unwrap(), b"hello world");
	}

	#[test]
	fn incr_and_decr_round_trip() {
		let (_dir, db) = open_tmp();
		db.set(b"n", b"10").unwrap();
		assert_eq!(db.incr(b"n").unwrap(), 11);
		assert_eq!(db.decr_by(b"n", 5).unwrap(), 6);
	}

	#[test]
	fn incr_on_non_integer_errors() {
		let (_dir, db) = open_tmp();
		db.set(b"n", b"not a number").unwrap();
		assert!(matches!(db.incr(b"n"), Err(Error::WrongValueType)));
	}

	#[test]
	fn incr_overflow_is_detected() {
		let (_dir, db) = open_tmp();
		db.set(b"n", i64::MAX.to_string().as_bytes()).unwrap();
		assert!(matches!(db.incr(b"n"), Err(Error::IntegerOverflow)));
	}

	#[test]
	fn get_range_handles_negative_indices() {
		let (_dir, db) = open_tmp();
		db.set(b"k", b"Hello World").unwrap();
		assert_eq!(db.get_range(b"k", 0, 4).unwrap(), b"Hello");
		assert_eq!(db.get_range(b"k", -5, -1).unwrap(), b"World");
	}

	#[test]
	fn strlen_of_absent_key_is_zero() {
		let (_dir, db) = open_tmp();
		assert_eq!(db.strlen(b"nope").unwrap(), 0);
	}

	#[test]
	fn scan_matches_a_pattern_under_a_prefix_in_lexicographic_order() {
		let (_dir, db) = open_tmp();
		db.set(b"user:2", b"b").unwrap();
		db.set(b"user:1", b"a").unwrap();
		db.set(b"order:1", b"c").unwrap();
		let matched = db.scan(b"user:", "^user:", 10).unwrap();
		assert_eq!(
			matched,
			vec![b"user:1".to_vec(), b"a".to_vec(), b"user:2".to_vec(), b"b".to_vec()]
		);
	}

	#[test]
	fn scan_stops_at_count_pairs() {
		let (_dir, db) = open_tmp();
		db.set(b"a1", b"1").unwrap();
		db.set(b"a2", b"2").unwrap();
		db.set(b"a3", b"3").unwrap();
		let matched = db.scan(b"", "^a", 2).unwrap();
		assert_eq!(matched.len(), 4);
	}

	#[test]
	fn expire_then_ttl_then_persist() {
		let (_dir, db) = open_tmp();
		db.set(b"k", b"v").unwrap();
		assert_eq!(db.ttl(b"k"), Some(-1));
		db.expire(b"k", 100).unwrap();
		let ttl = db.ttl(b"k").unwrap();
		assert!(ttl > 0 && ttl <= 100);
		db.persist(b"k").unwrap();
		assert_eq!(db.ttl(b"k"), Some(-1));
	}

	#[test]
	fn expire_on_missing_key_returns_false() {
		let (_dir, db) = open_tmp();
		assert!(!db.expire(b"nope", 10).unwrap());
	}

	#[test]
	fn count_tracks_live_keys() {
		let (_dir, db) = open_tmp();
		db.set(b"a", b"1").unwrap();
		db.set(b"b", b"2").unwrap();
		assert_eq!(db.count(), 2);
		db.delete(b"a").unwrap();
		assert_eq!(db.count(), 1);
	}
}
