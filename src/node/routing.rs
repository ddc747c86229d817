use std::future::Future;
use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::remote::RemoteNode;
use crate::ring::{NodeId, in_range};

use super::Node;

impl Node {
	/// Run `operation` until it succeeds, retrying transient peer failures
	/// with a sleep between attempts so maintenance has a chance to repair
	/// the ring. Exhausting the bound surfaces the last cause as
	/// [`Error::NetworkHosed`]; any other error fails immediately.
	pub(crate) async fn with_retries<T, F, Fut>(&self, operation: F) -> Result<T>
	where
		F: Fn() -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let mut attempt = 0;
		loop {
			match operation().await {
				Ok(value) => return Ok(value),
				Err(e) if e.is_transient() => {
					attempt += 1;
					if attempt >= self.retries {
						warn!("node {} giving up after {} attempts: {}", self.key, attempt, e);
						return Err(Error::NetworkHosed(Box::new(e)));
					}
					debug!("node {} retrying after transient failure: {}", self.key, e);
					sleep(self.fix_interval).await;
				},
				Err(e) => return Err(e),
			}
		}
	}

	/// Probe a peer for liveness, returning its key. Probing ourselves is
	/// answered locally.
	pub(super) async fn probe(&self, peer: &RemoteNode) -> Result<NodeId> {
		if self.is_self(peer) {
			self.check_departed()?;
			return Ok(self.key);
		}
		peer.probe().await
	}

	/// The current successor, probed for liveness. A dead successor resets
	/// the pointer to self and the probe starts over.
	pub(super) async fn live_successor(&self) -> Result<(RemoteNode, NodeId)> {
		loop {
			let successor = self.successor_or_self();
			match self.probe(&successor).await {
				Ok(key) => return Ok((successor, key)),
				Err(e) if self.is_self(&successor) => return Err(e),
				Err(_) => {
					info!("node {} lost its successor; resetting to self", self.key);
					self.fingers.successor().set(Some(self.self_ref()));
				},
			}
		}
	}

	/// Find the live node responsible for `key`: the first node whose
	/// identifier is at or clockwise-after `key` on the ring.
	pub(crate) async fn find_successor(&self, key: NodeId) -> Result<RemoteNode> {
		self.space.check_key(key)?;
		self.check_departed()?;

		let (successor, successor_key) = self.live_successor().await?;
		if in_range(false, self.key, key, successor_key, true) {
			return Ok(successor);
		}

		// walk the fingers backwards for the closest preceding node and
		// hand the query to it
		for finger in self.fingers.iter().rev() {
			let Some(node) = finger.node() else {
				if finger.start() == self.fingers.successor().start() {
					finger.set(Some(self.self_ref()));
				}
				continue;
			};
			if !in_range(false, self.key, node.key(), key, false) {
				continue;
			}
			match node.find_successor(key).await {
				Ok(found) => return Ok(found),
				Err(e) => {
					debug!("node {} clearing stale finger {}: {}", self.key, node.key(), e);
					let replacement = if finger.start() == self.fingers.successor().start() {
						Some(self.self_ref())
					} else {
						None
					};
					finger.set(replacement);
				},
			}
		}

		// no finger can help; we are the best approximation we know of
		Ok(self.self_ref())
	}

	pub(crate) async fn get(self: &Arc<Self>, key: NodeId) -> Result<Option<Vec<u8>>> {
		self.space.check_key(key)?;
		let node = Arc::clone(self);
		self.with_retries(|| {
			let node = Arc::clone(&node);
			async move { node.get_once(key).await }
		})
		.await
	}

	async fn get_once(&self, key: NodeId) -> Result<Option<Vec<u8>>> {
		self.check_departed()?;
		let target = self.find_successor(key).await?;
		if self.is_self(&target) {
			Ok(self.store.get(key))
		} else {
			target.get(key).await
		}
	}

	pub(crate) async fn put(self: &Arc<Self>, key: NodeId, value: Vec<u8>) -> Result<()> {
		self.space.check_key(key)?;
		let node = Arc::clone(self);
		self.with_retries(|| {
			let node = Arc::clone(&node);
			let value = value.clone();
			async move { node.put_once(key, value).await }
		})
		.await
	}

	async fn put_once(&self, key: NodeId, value: Vec<u8>) -> Result<()> {
		self.check_departed()?;
		let target = self.find_successor(key).await?;
		if self.is_self(&target) {
			info!("node {} adding value with key {}", self.key, key);
			self.store.insert(key, value.clone());
			// mirror to the successor; a failure here reroutes the whole put
			let successor = self.successor_or_self();
			if self.is_self(&successor) {
				self.store.insert(key, value);
			} else {
				successor.put_backup(key, value).await?;
			}
			Ok(())
		} else {
			target.put(key, value).await
		}
	}

	pub(crate) async fn delete(self: &Arc<Self>, key: NodeId) -> Result<()> {
		self.space.check_key(key)?;
		let node = Arc::clone(self);
		self.with_retries(|| {
			let node = Arc::clone(&node);
			async move { node.delete_once(key).await }
		})
		.await
	}

	async fn delete_once(&self, key: NodeId) -> Result<()> {
		self.check_departed()?;
		let target = self.find_successor(key).await?;
		if self.is_self(&target) {
			info!("node {} removing value with key {}", self.key, key);
			self.store.remove(key);
			let successor = self.successor_or_self();
			if self.is_self(&successor) {
				self.store.remove(key);
			} else {
				successor.remove_backup(key).await?;
			}
			Ok(())
		} else {
			target.delete(key).await
		}
	}

	/// Store a value on behalf of a neighbor. No routing, no forwarding.
	pub(crate) fn put_backup(&self, key: NodeId, value: Vec<u8>) -> Result<()> {
		self.check_departed()?;
		self.store.insert(key, value);
		Ok(())
	}

	/// Drop a neighbor's value. No routing, no forwarding.
	pub(crate) fn remove_backup(&self, key: NodeId) -> Result<()> {
		self.check_departed()?;
		self.store.remove(key);
		Ok(())
	}
}
