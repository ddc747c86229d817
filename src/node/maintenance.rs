use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::remote::RemoteNode;
use crate::ring::{NodeId, in_range};

use super::Node;

impl Node {
	/// A peer's predecessor pointer; asking about ourselves is answered
	/// locally.
	async fn peer_predecessor(&self, peer: &RemoteNode) -> Result<Option<RemoteNode>> {
		if self.is_self(peer) {
			self.check_departed()?;
			return Ok(self.predecessor.read().clone());
		}
		peer.get_predecessor().await
	}

	/// Adopt `candidate` as predecessor when it sits strictly between the
	/// current predecessor and this node, or unconditionally when the
	/// current predecessor is unknown or unreachable. Storage is never
	/// pruned here; the backup-forwarding pass redistributes ownership.
	#[instrument(skip(self))]
	pub(crate) async fn handle_check_predecessor(&self, candidate: RemoteNode) -> Result<()> {
		self.check_departed()?;
		let current = self.predecessor.read().clone();
		let adopt = match current {
			// a predecessor of self is the solo-ring placeholder; the arc
			// (self, self) is empty, so any real peer replaces it directly
			Some(ref predecessor) if self.is_self(predecessor) => !self.is_self(&candidate),
			Some(ref predecessor) => match self.probe(predecessor).await {
				Ok(predecessor_key) => {
					in_range(false, predecessor_key, candidate.key(), self.key, false)
				},
				Err(_) => true,
			},
			None => true,
		};
		if adopt {
			debug!("node {} adopting {} as predecessor", self.key, candidate.key());
			*self.predecessor.write() = Some(candidate);
		}
		Ok(())
	}

	/// One stabilization round: re-probe the successor, adopt its
	/// predecessor if that peer sits between us, then volunteer as the
	/// (possibly new) successor's predecessor.
	pub(crate) async fn stabilize(&self) {
		let Ok((successor, successor_key)) = self.live_successor().await else {
			// only fails once this node has departed
			return;
		};

		match self.peer_predecessor(&successor).await {
			Ok(Some(between)) => {
				// pointing at ourselves means we have no real successor yet;
				// any peer that has shown up is closer than we are
				let closer = if successor_key == self.key {
					!self.is_self(&between)
				} else {
					in_range(false, self.key, between.key(), successor_key, false)
				};
				if closer {
					debug!("node {} stabilized onto new successor {}", self.key, between.key());
					self.fingers.successor().set(Some(between));
				}
			},
			Ok(None) => {},
			Err(_) => {},
		}

		let successor = self.successor_or_self();
		let notified = if self.is_self(&successor) {
			self.handle_check_predecessor(self.self_ref()).await
		} else {
			successor.check_predecessor(self.self_ref()).await
		};
		if notified.is_err() {
			info!("node {} could not notify successor; resetting to self", self.key);
			self.fingers.successor().set(Some(self.self_ref()));
		}
	}

	/// Repoint one finger at the current successor of its start offset.
	pub(crate) async fn fix_finger(&self, index: usize) {
		let finger = self.fingers.get(index);
		match self.find_successor(finger.start()).await {
			Ok(node) => finger.set(Some(node)),
			Err(e) => {
				debug!("node {} clearing finger {} after repair failure: {}", self.key, index, e);
				finger.set(None);
			},
		}
	}

	/// Re-derive which stored values this node is still responsible for and
	/// ship copies to the neighbors that need them.
	///
	/// With P our predecessor and PP its predecessor: keys in `(PP, P]`
	/// belong primarily to P, so P gets them as backups; keys in
	/// `(P, self]` are our primaries, so the successor gets them as
	/// backups; keys outside `(PP, self]` belong to neither of our roles
	/// any more and are pruned. The pass is skipped entirely while the
	/// neighborhood is unknown.
	pub(crate) async fn forward_values_for_backup(self: Arc<Self>) {
		let node = Arc::clone(&self);
		let result = self
			.with_retries(|| {
				let node = Arc::clone(&node);
				async move { node.forward_values_once().await }
			})
			.await;
		if let Err(e) = result {
			debug!("node {} abandoning backup forwarding: {}", self.key, e);
		}
	}

	async fn forward_values_once(&self) -> Result<()> {
		self.check_departed()?;
		let Some(predecessor) = self.predecessor.read().clone() else {
			return Ok(());
		};
		let Some(before) = self.peer_predecessor(&predecessor).await? else {
			return Ok(());
		};
		let predecessor_key = predecessor.key();
		let before_key = before.key();
		let successor = self.successor_or_self();

		for (key, value) in self.store.entries() {
			// our predecessor's primaries; it may be missing them
			if in_range(false, before_key, key, predecessor_key, true) {
				self.backup_to(&predecessor, key, value.clone()).await?;
			}
			// our primaries; the successor mirrors them
			if in_range(false, predecessor_key, key, self.key, true) {
				self.backup_to(&successor, key, value.clone()).await?;
			}
			// neither our primary nor our backup window any more
			if !in_range(false, before_key, key, self.key, true) {
				info!("node {} pruning key {} outside its window", self.key, key);
				self.store.remove(key);
			}
		}
		Ok(())
	}

	async fn backup_to(&self, peer: &RemoteNode, key: NodeId, value: Vec<u8>) -> Result<()> {
		if self.is_self(peer) {
			return self.put_backup(key, value);
		}
		peer.put_backup(key, value).await
	}
}
