use serde::{Serialize, Deserialize};

use crate::remote::RemoteNode;
use crate::ring::NodeId;
use crate::state::NodeState;

// The peer protocol. A connection carries one JSON request at a time and
// receives exactly one response for it. Leaving the ring is deliberately
// not on the wire; peers cannot force a node out.

#[derive(Debug, Serialize, Deserialize)]
pub(crate) enum Request {
	GetNodeKey,
	GetHashLength,
	FindSuccessor { key: NodeId },
	GetPredecessor,
	CheckPredecessor { candidate: RemoteNode },
	GetState,

	// client-facing: route and mutate
	Get { key: NodeId },
	Put { key: NodeId, value: Vec<u8> },
	Delete { key: NodeId },

	// neighbor-facing: mutate the local store without routing
	PutBackup { key: NodeId, value: Vec<u8> },
	RemoveBackup { key: NodeId },
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) enum Response {
	NodeKey { key: NodeId },
	HashLength { bits: u32 },
	Successor { node: RemoteNode },
	Predecessor { node: Option<RemoteNode> },
	State { state: NodeState },
	Value { value: Option<Vec<u8>> },
	Done,

	// the receiver has left the ring; callers treat this as unreachable
	Departed,
	// the receiver's own retry harness gave up; callers must not retry
	Hosed { message: String },
	Error { message: String },
}
