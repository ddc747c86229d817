use std::time::Duration;

use chord_ring::{ChordNode, NodeHandle, NodeId};
use tokio::time::sleep;

/// Short maintenance period so rings stabilize quickly under test.
pub const FIX_INTERVAL: Duration = Duration::from_millis(50);

/// Every node listens on `base_port + key`, so a test's ring lives in its
/// own port range and tests can run in parallel.
pub fn node_addr(base_port: u16, key: NodeId) -> String {
	format!("127.0.0.1:{}", base_port + key as u16)
}

pub async fn make_node(bits: u32, key: NodeId, base_port: u16, bootstrap: Option<String>) -> NodeHandle {
	let mut node = ChordNode::new(bits, key, node_addr(base_port, key)).expect("node config should be valid");
	node.set_fix_interval(FIX_INTERVAL);
	node.start(bootstrap).await.expect("node should start")
}

/// Start one node per key; the first forms the ring, the rest join through
/// it.
pub async fn make_ring(bits: u32, keys: &[NodeId], base_port: u16) -> Vec<NodeHandle> {
	let mut v = Vec::new();
	for (i, &key) in keys.iter().enumerate() {
		let bootstrap = if i == 0 { None } else { Some(node_addr(base_port, keys[0])) };
		v.push(make_node(bits, key, base_port, bootstrap).await);
		sleep(FIX_INTERVAL).await;
	}
	v
}

/// Give the maintainers `rounds` ticks to converge.
pub async fn wait_for_stabilization(rounds: u32) {
	sleep(FIX_INTERVAL * rounds).await;
}
