use dashmap::DashMap;

use crate::ring::NodeId;

/// Concurrent map from ring identifier to opaque serialized value.
///
/// Holds both entries this node is the successor for and entries mirrored
/// here as a backup for a neighbor. Storage carries no provenance; which
/// class an entry belongs to is re-derived from the current ring neighbors
/// during the backup-forwarding pass.
#[derive(Debug, Default)]
pub struct LocalStore {
	table: DashMap<NodeId, Vec<u8>>,
}

impl LocalStore {
	/// Create an empty store.
	pub fn new() -> Self {
		Self { table: DashMap::new() }
	}

	/// Look up a value.
	pub fn get(&self, key: NodeId) -> Option<Vec<u8>> {
		self.table.get(&key).map(|v| v.value().clone())
	}

	/// Insert or replace a value.
	pub fn insert(&self, key: NodeId, value: Vec<u8>) {
		self.table.insert(key, value);
	}

	/// Remove a value if present.
	pub fn remove(&self, key: NodeId) {
		self.table.remove(&key);
	}

	/// Snapshot of all entries, for iteration outside the map's shards.
	pub fn entries(&self) -> Vec<(NodeId, Vec<u8>)> {
		self.table.iter().map(|e| (*e.key(), e.value().clone())).collect()
	}

	/// Snapshot of the stored keys.
	pub fn keys(&self) -> Vec<NodeId> {
		let mut keys: Vec<NodeId> = self.table.iter().map(|e| *e.key()).collect();
		keys.sort_unstable();
		keys
	}

	/// Number of stored entries.
	pub fn len(&self) -> usize {
		self.table.len()
	}

	/// Whether the store holds nothing.
	pub fn is_empty(&self) -> bool {
		self.table.is_empty()
	}
}
