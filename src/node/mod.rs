use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::info;

use crate::error::Result;
use crate::finger::FingerTable;
use crate::keyhash::key_hash;
use crate::remote::RemoteNode;
use crate::ring::{Keyspace, NodeId};
use crate::state::{FingerEntry, NodeState};
use crate::store::LocalStore;
use crate::transport;

mod maintenance;
mod routing;
mod server;

/// Default maintainer period; also the sleep between retry attempts.
const FIX_INTERVAL: Duration = Duration::from_millis(1000);

/// Configures a chord node before it is started.
///
/// Acts like a builder: create it, adjust the intervals, then consume it
/// with [`ChordNode::start`], which returns a [`NodeHandle`] to the
/// running node.
#[derive(Debug)]
pub struct ChordNode {
	space: Keyspace,
	key: NodeId,
	addr: String,
	fix_interval: Duration,
	retries: u32,
}

impl ChordNode {
	/// Create a node for a `2^hash_length` identifier space.
	///
	/// Fails when the hash length cannot be represented or when `node_key`
	/// does not fit the keyspace.
	pub fn new(hash_length: u32, node_key: NodeId, addr: impl Into<String>) -> Result<Self> {
		let space = Keyspace::new(hash_length)?;
		space.check_node_key(node_key)?;
		Ok(ChordNode {
			space,
			key: node_key,
			addr: addr.into(),
			fix_interval: FIX_INTERVAL,
			retries: hash_length + 1,
		})
	}

	/// Override the maintainer period (default 1000 ms). The retry harness
	/// sleeps for the same interval between attempts.
	pub fn set_fix_interval(&mut self, interval: Duration) {
		self.fix_interval = interval;
	}

	/// Override the retry bound (default `hash_length + 1`, the ring
	/// diameter in hops).
	pub fn set_retries(&mut self, retries: u32) {
		self.retries = retries;
	}

	/// Start the node: bind the peer listener, join the ring, and spawn the
	/// background maintainer.
	///
	/// With `Some(addr)` the node contacts the peer at `addr` to find its
	/// successor; with `None` it forms a new ring of one.
	pub async fn start(self, bootstrap: Option<String>) -> Result<NodeHandle> {
		let node = Arc::new(Node {
			space: self.space,
			key: self.key,
			addr: self.addr,
			fingers: FingerTable::new(self.space, self.key),
			store: LocalStore::new(),
			predecessor: RwLock::new(None),
			has_left: AtomicBool::new(false),
			fix_interval: self.fix_interval,
			retries: self.retries,
		});

		let listener = transport::listen(&node.addr, Arc::clone(&node)).await?;
		if let Err(e) = node.join(bootstrap).await {
			listener.abort();
			return Err(e);
		}
		let maintainer = spawn_maintainer(Arc::clone(&node));

		Ok(NodeHandle { node, listener, maintainer })
	}
}

/// The node state machine shared between the serving tasks and the
/// maintainer. All fields tolerate concurrent access: the finger entries
/// and predecessor are single-handle swaps whose stale reads are
/// self-correcting, the store is a concurrent map, and departure is a
/// monotonic flag.
pub(crate) struct Node {
	space: Keyspace,
	key: NodeId,
	addr: String,
	fingers: FingerTable,
	store: LocalStore,
	predecessor: RwLock<Option<RemoteNode>>,
	has_left: AtomicBool,
	fix_interval: Duration,
	retries: u32,
}

impl Node {
	/// A handle naming this node, as peers see it.
	fn self_ref(&self) -> RemoteNode {
		RemoteNode::new(self.key, self.addr.clone())
	}

	/// Handles compare by network identity; our own key means ourselves.
	fn is_self(&self, peer: &RemoteNode) -> bool {
		peer.key() == self.key
	}

	fn has_left(&self) -> bool {
		self.has_left.load(Ordering::SeqCst)
	}

	fn check_departed(&self) -> Result<()> {
		if self.has_left() {
			return Err(crate::error::Error::Departed);
		}
		Ok(())
	}

	/// The successor pointer. An unset slot reads as self; entry 0 must
	/// never stay unknown once the node has joined.
	fn successor_or_self(&self) -> RemoteNode {
		self.fingers.successor().node().unwrap_or_else(|| self.self_ref())
	}

	async fn join(&self, bootstrap: Option<String>) -> Result<()> {
		self.check_departed()?;
		match bootstrap {
			Some(addr) => {
				let bootstrap = RemoteNode::connect(addr).await?;
				let successor = bootstrap.find_successor(self.key).await?;
				self.fingers.successor().set(Some(successor.clone()));
				// volunteer as the new successor's predecessor
				if self.is_self(&successor) {
					self.handle_check_predecessor(self.self_ref()).await?;
				} else {
					successor.check_predecessor(self.self_ref()).await?;
				}
				info!("node {} joined network via {}", self.key, bootstrap.addr());
			},
			None => {
				self.fingers.successor().set(Some(self.self_ref()));
				info!("node {} starting new network; setting successor to self", self.key);
			},
		}
		Ok(())
	}

	fn leave(&self) {
		if !self.has_left.swap(true, Ordering::SeqCst) {
			info!("node {} left network", self.key);
		}
	}

	fn state(&self) -> NodeState {
		NodeState {
			key: self.key,
			predecessor: self.predecessor.read().as_ref().map(RemoteNode::key),
			fingers: self
				.fingers
				.iter()
				.map(|f| FingerEntry { start: f.start(), node: f.node().map(|n| n.key()) })
				.collect(),
			stored_keys: self.store.keys(),
		}
	}
}

fn spawn_maintainer(node: Arc<Node>) -> JoinHandle<()> {
	tokio::spawn(async move {
		let mut ticker = interval(node.fix_interval);
		loop {
			ticker.tick().await;
			if node.has_left() {
				break;
			}
			node.stabilize().await;
			let index = node.fingers.random_index();
			node.fix_finger(index).await;
			// backup forwarding talks to peers and must not stall the next tick
			tokio::spawn(Arc::clone(&node).forward_values_for_backup());
		}
		info!("node {} maintenance task terminating", node.key);
	})
}

/// A running chord node.
///
/// The handle owns the listener and maintainer tasks and is the local
/// client surface: get, put and delete route from this node to wherever
/// the key lives on the ring.
pub struct NodeHandle {
	node: Arc<Node>,
	listener: JoinHandle<()>,
	maintainer: JoinHandle<()>,
}

impl NodeHandle {
	/// This node's identifier.
	pub fn key(&self) -> NodeId {
		self.node.key
	}

	/// The identifier space this node lives in.
	pub fn keyspace(&self) -> Keyspace {
		self.node.space
	}

	/// A network handle to this node, as a peer would hold it.
	pub fn remote(&self) -> RemoteNode {
		self.node.self_ref()
	}

	/// Snapshot the node's ring state.
	pub fn state(&self) -> NodeState {
		self.node.state()
	}

	/// Resolve the successor of an identifier from this node.
	pub async fn find_successor(&self, key: NodeId) -> Result<RemoteNode> {
		self.node.find_successor(key).await
	}

	/// Fetch the value stored under `key`, wherever it lives.
	pub async fn get(&self, key: NodeId) -> Result<Option<Vec<u8>>> {
		self.node.get(key).await
	}

	/// Store `value` under `key` on the key's successor, mirrored to the
	/// successor's successor as a backup.
	pub async fn put(&self, key: NodeId, value: Vec<u8>) -> Result<()> {
		self.node.put(key, value).await
	}

	/// Remove the value under `key`, and its backup.
	pub async fn delete(&self, key: NodeId) -> Result<()> {
		self.node.delete(key).await
	}

	/// [`NodeHandle::get`] with the key hashed onto the ring.
	pub async fn get_str(&self, key: &str) -> Result<Option<Vec<u8>>> {
		self.get(key_hash(key, self.node.space)).await
	}

	/// [`NodeHandle::put`] with the key hashed onto the ring.
	pub async fn put_str(&self, key: &str, value: Vec<u8>) -> Result<()> {
		self.put(key_hash(key, self.node.space), value).await
	}

	/// [`NodeHandle::delete`] with the key hashed onto the ring.
	pub async fn delete_str(&self, key: &str) -> Result<()> {
		self.delete(key_hash(key, self.node.space)).await
	}

	/// Leave the ring. The departure flag is permanent: every subsequent
	/// remote call is refused, and the maintainer is cancelled. Peers
	/// discover the departure through their own probing.
	pub fn leave(&self) {
		self.node.leave();
		self.maintainer.abort();
	}

	/// Tear the node down, aborting its background tasks.
	pub async fn stop(self) {
		self.node.leave();
		self.listener.abort();
		let _ = self.listener.await;
		self.maintainer.abort();
		let _ = self.maintainer.await;
	}
}
