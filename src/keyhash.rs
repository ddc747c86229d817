//! Maps application keys onto the ring.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::ring::{Keyspace, NodeId};

/// Hash a string key to an identifier in `[0, 2^m)`.
///
/// Deterministic across processes, so every node maps the same key to the
/// same point on the ring.
pub fn key_hash(key: &str, space: Keyspace) -> NodeId {
	let mut hasher = DefaultHasher::new();
	key.hash(&mut hasher);
	hasher.finish() % space.size()
}
