use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::proto::{Request, Response};
use crate::ring::NodeId;
use crate::state::NodeState;
use crate::transport;

/// An opaque, network-callable reference to a node in the ring.
///
/// A handle is an address plus the identifier the peer advertised; it owns
/// nothing. Two handles are equal when they name the same network identity,
/// regardless of where they were obtained. Every call may fail with
/// [`Error::Unreachable`]: a dead peer, a departed peer, and a transport
/// fault are indistinguishable to routing, which is all callers need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNode {
	key: NodeId,
	addr: String,
}

impl RemoteNode {
	/// Build a handle from a peer's identifier and listen address.
	pub fn new(key: NodeId, addr: String) -> Self {
		RemoteNode { key, addr }
	}

	/// Build a handle by asking the node at `addr` for its identifier.
	pub async fn connect(addr: String) -> Result<RemoteNode> {
		let mut node = RemoteNode::new(0, addr);
		node.key = node.probe().await?;
		Ok(node)
	}

	/// The identifier this peer advertised.
	pub fn key(&self) -> NodeId {
		self.key
	}

	/// The peer's listen address.
	pub fn addr(&self) -> &str {
		&self.addr
	}

	async fn call(&self, request: Request) -> Result<Response> {
		match transport::call(&self.addr, request).await? {
			Response::Departed => Err(self.unreachable("peer has left the ring")),
			// the peer already exhausted its own retries; keep that terminal
			// so our caller's harness does not multiply the attempts
			Response::Hosed { message } => {
				Err(Error::NetworkHosed(Box::new(self.unreachable(&message))))
			},
			Response::Error { message } => Err(self.unreachable(&message)),
			response => Ok(response),
		}
	}

	fn unreachable(&self, reason: &str) -> Error {
		Error::Unreachable { addr: self.addr.clone(), reason: reason.to_string() }
	}

	/// Ask the peer for its identifier. Cheap; doubles as a liveness probe.
	pub async fn probe(&self) -> Result<NodeId> {
		match self.call(Request::GetNodeKey).await? {
			Response::NodeKey { key } => Ok(key),
			_ => Err(self.unreachable("unexpected response")),
		}
	}

	/// The hash length m of the peer's ring, for computing key identifiers.
	pub async fn hash_length(&self) -> Result<u32> {
		match self.call(Request::GetHashLength).await? {
			Response::HashLength { bits } => Ok(bits),
			_ => Err(self.unreachable("unexpected response")),
		}
	}

	/// Resolve the successor of `key` starting from this peer.
	pub async fn find_successor(&self, key: NodeId) -> Result<RemoteNode> {
		match self.call(Request::FindSuccessor { key }).await? {
			Response::Successor { node } => Ok(node),
			_ => Err(self.unreachable("unexpected response")),
		}
	}

	/// The peer's current predecessor, if it knows one.
	pub async fn get_predecessor(&self) -> Result<Option<RemoteNode>> {
		match self.call(Request::GetPredecessor).await? {
			Response::Predecessor { node } => Ok(node),
			_ => Err(self.unreachable("unexpected response")),
		}
	}

	/// Hint that `candidate` may be the peer's predecessor.
	pub async fn check_predecessor(&self, candidate: RemoteNode) -> Result<()> {
		match self.call(Request::CheckPredecessor { candidate }).await? {
			Response::Done => Ok(()),
			_ => Err(self.unreachable("unexpected response")),
		}
	}

	/// Snapshot the peer's ring state.
	pub async fn state(&self) -> Result<NodeState> {
		match self.call(Request::GetState).await? {
			Response::State { state } => Ok(state),
			_ => Err(self.unreachable("unexpected response")),
		}
	}

	/// Fetch the value stored under `key`, routed from this peer.
	pub async fn get(&self, key: NodeId) -> Result<Option<Vec<u8>>> {
		match self.call(Request::Get { key }).await? {
			Response::Value { value } => Ok(value),
			_ => Err(self.unreachable("unexpected response")),
		}
	}

	/// Store `value` under `key`, routed from this peer.
	pub async fn put(&self, key: NodeId, value: Vec<u8>) -> Result<()> {
		match self.call(Request::Put { key, value }).await? {
			Response::Done => Ok(()),
			_ => Err(self.unreachable("unexpected response")),
		}
	}

	/// Remove the value under `key`, routed from this peer.
	pub async fn delete(&self, key: NodeId) -> Result<()> {
		match self.call(Request::Delete { key }).await? {
			Response::Done => Ok(()),
			_ => Err(self.unreachable("unexpected response")),
		}
	}

	/// Mirror `value` into the peer's local store, without routing.
	pub async fn put_backup(&self, key: NodeId, value: Vec<u8>) -> Result<()> {
		match self.call(Request::PutBackup { key, value }).await? {
			Response::Done => Ok(()),
			_ => Err(self.unreachable("unexpected response")),
		}
	}

	/// Drop `key` from the peer's local store, without routing.
	pub async fn remove_backup(&self, key: NodeId) -> Result<()> {
		match self.call(Request::RemoveBackup { key }).await? {
			Response::Done => Ok(()),
			_ => Err(self.unreachable("unexpected response")),
		}
	}
}
