//! The in-memory index mapping string keys to where their value lives on
//! disk.
//!
//! Grounded on `index.go`'s `StringIndex`/`IndexNode`, with
//! `radix_trie::Trie` standing in for the original's
//! `go-adaptive-radix-tree` and `antidote::RwLock` standing in for
//! `sync.RWMutex`.

use antidote::RwLock;
use radix_trie::{Trie, TrieCommon};

/// Where a live value lives: which segment, at what offset, how big, and
/// when (if ever) it expires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct IndexNode {
	pub(crate) fid: u32,
	pub(crate) offset: u64,
	pub(crate) size: u64,
	/// Unix timestamp the value expires at, or zero for "never".
	pub(crate) expire_at: i64,
}

impl IndexNode {
	pub(crate) fn is_expired(&self, now: i64) -> bool {
		self.expire_at != 0 && self.expire_at < now
	}
}

/// The radix-tree index for one data type, guarded by a single
/// reader/writer lock the way `index.go`'s `StringIndex` guards its tree
/// with a `sync.RWMutex`.
pub(crate) struct StringIndex {
	tree: RwLock<Trie<Vec<u8>, IndexNode>>,
}

impl StringIndex {
	pub(crate) fn new() -> StringIndex {
		StringIndex {
			tree: RwLock::new(Trie::new()),
		}
	}

	pub(crate) fn insert(&self, key: &[u8], node: IndexNode) {
		self.tree.write().insert(key.to_vec(), node);
	}

	pub(crate) fn remove(&self, key: &[u8]) -> Option<IndexNode> {
		self.tree.write().remove(&key.to_vec())
	}

	/// Look up `key`, lazily dropping and reporting `None` for a node whose
	/// expiry has passed. A lazily-expired entry is removed under the
	/// write lock so later lookups don't repeat the work.
	pub(crate) fn search(&self, key: &[u8], now: i64) -> Option<IndexNode> {
		let key_vec = key.to_vec();
		let found = *self.tree.read().get(&key_vec)?;
		if found.is_expired(now) {
			self.tree.write().remove(&key_vec);
			return None;
		}
		Some(found)
	}

	pub(crate) fn len(&self) -> usize {
		self.tree.read().iter().count()
	}

	/// All live keys, in lexicographic order, with expired entries lazily
	/// dropped along the way.
	pub(crate) fn keys(&self, now: i64) -> Vec<Vec<u8>> {
		let expired: Vec<Vec<u8>> = self
			.tree
			.read()
			.iter()
			.filter(|(_, node)| node.is_expired(now))
			.map(|(key, _)| key.clone())
			.collect();
		if !expired.is_empty() {
			let mut tree = self.tree.write();
			for key in &expired {
				tree.remove(key);
			}
		}

		let mut keys: Vec<Vec<u8>> = self.tree.read().iter().map(|(key, _)| key.clone()).collect();
		keys.sort();
		keys
	}

	/// Visit every live key under `prefix` in lexicographic order, calling
	/// `visitor` with the key and its node. Stops early the moment
	/// `visitor` returns `false`.
	pub(crate) fn for_each_prefix(
		&self,
		prefix: &[u8],
		now: i64,
		mut visitor: impl FnMut(&[u8], IndexNode) -> bool,
	) {
		let mut matches: Vec<(Vec<u8>, IndexNode)> = {
			let tree = self.tree.read();
			match tree.subtrie(&prefix.to_vec()) {
				Some(sub) => sub
					.iter()
					.map(|(key, node)| (key.clone(), *node))
					.collect(),
				None => Vec::new(),
			}
		};
		matches.sort_by(|a, b| a.0.cmp(&b.0));

		for (key, node) in matches {
			if node.is_expired(now) {
				self.tree.write().remove(&key);
				continue;
			}
			if !visitor(&key, node) {
				break;
			}
		}
	}
}
