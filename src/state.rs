use serde::{Serialize, Deserialize};

use crate::ring::NodeId;

/// A point-in-time snapshot of a node's ring state.
///
/// Produced for inspection tooling; nothing in the protocol depends on it.
/// Handles are reduced to their identifiers, so a snapshot says what the
/// node currently believes, not whether those peers are still alive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeState {
	/// This node's identifier.
	pub key: NodeId,
	/// The current predecessor's identifier, if one is known.
	pub predecessor: Option<NodeId>,
	/// Every finger entry, in table order. Entry 0 is the successor.
	pub fingers: Vec<FingerEntry>,
	/// Identifiers of all locally stored values, primaries and backups alike.
	pub stored_keys: Vec<NodeId>,
}

/// One finger as it appears in a [`NodeState`] snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerEntry {
	/// The finger's fixed start offset.
	pub start: NodeId,
	/// Identifier of the cached peer, or `None` when the slot is unset.
	pub node: Option<NodeId>,
}
