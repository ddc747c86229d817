use parking_lot::RwLock;
use rand::Rng;

use crate::remote::RemoteNode;
use crate::ring::{Keyspace, NodeId};

/// One entry in the finger table.
///
/// `start` is fixed at construction; the cached peer handle may be set,
/// replaced, or cleared at any time by maintenance while request routing
/// reads it. A stale handle is tolerated and repaired when a call through
/// it fails.
#[derive(Debug)]
pub struct Finger {
	start: NodeId,
	node: RwLock<Option<RemoteNode>>,
}

impl Finger {
	fn new(start: NodeId) -> Self {
		Finger { start, node: RwLock::new(None) }
	}

	/// The ring offset this finger is responsible for.
	pub fn start(&self) -> NodeId {
		self.start
	}

	/// The cached peer believed to be `successor(start)`, if any.
	pub fn node(&self) -> Option<RemoteNode> {
		self.node.read().clone()
	}

	/// Replace the cached peer handle.
	pub fn set(&self, node: Option<RemoteNode>) {
		*self.node.write() = node;
	}
}

/// The ordered collection of m fingers of a node. Entry 0 is the successor
/// pointer. Fixed size; entries are never added or removed.
#[derive(Debug)]
pub struct FingerTable {
	fingers: Vec<Finger>,
}

impl FingerTable {
	/// Build the table for a node, computing every start offset.
	pub fn new(space: Keyspace, node_key: NodeId) -> Self {
		let fingers = (0..space.bits())
			.map(|i| Finger::new(space.finger_start(node_key, i)))
			.collect();
		FingerTable { fingers }
	}

	/// Entry 0, the successor pointer.
	pub fn successor(&self) -> &Finger {
		&self.fingers[0]
	}

	/// The entry at `index`.
	pub fn get(&self, index: usize) -> &Finger {
		&self.fingers[index]
	}

	/// Iterate the entries in table order. Reverse the iterator for the
	/// closest-preceding-finger walk.
	pub fn iter(&self) -> std::slice::Iter<'_, Finger> {
		self.fingers.iter()
	}

	/// Index of one entry, chosen uniformly.
	pub fn random_index(&self) -> usize {
		rand::thread_rng().gen_range(0..self.fingers.len())
	}

	/// Number of entries, m.
	pub fn len(&self) -> usize {
		self.fingers.len()
	}

	/// A finger table is never empty; m is at least one.
	pub fn is_empty(&self) -> bool {
		self.fingers.is_empty()
	}
}
