mod common;

use std::collections::{HashMap, HashSet};

use chord_ring::{ChordNode, Error, Keyspace, NodeId, key_hash};
use tokio::time::{Duration, sleep};

use common::{FIX_INTERVAL, make_node, make_ring, node_addr, wait_for_stabilization};

fn init_logging() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// The node every live key routes to: the least live key at or clockwise
/// after the id.
fn expected_successor(live: &[NodeId], id: NodeId) -> NodeId {
	live.iter()
		.copied()
		.filter(|&k| k >= id)
		.min()
		.unwrap_or_else(|| live.iter().copied().min().unwrap())
}

#[tokio::test]
async fn single_node_ring_serves_all_keys() {
	init_logging();
	let handle = make_node(4, 5, 20100, None).await;
	wait_for_stabilization(4).await;

	handle.put(9, b"v".to_vec()).await.unwrap();
	assert_eq!(handle.get(9).await.unwrap(), Some(b"v".to_vec()));
	assert_eq!(handle.get(3).await.unwrap(), None);

	let state = handle.state();
	assert_eq!(state.key, 5);
	// successor is self; the predecessor is unknown or self
	assert_eq!(state.fingers[0].node, Some(5));
	assert!(state.predecessor.is_none() || state.predecessor == Some(5));

	// string keys round-trip through the hash
	handle.put_str("a", b"value".to_vec()).await.unwrap();
	assert_eq!(handle.get_str("a").await.unwrap(), Some(b"value".to_vec()));
	handle.delete_str("a").await.unwrap();
	assert_eq!(handle.get_str("a").await.unwrap(), None);
}

#[tokio::test]
async fn two_nodes_form_a_ring() {
	init_logging();
	let a = make_node(4, 2, 20200, None).await;
	let b = make_node(4, 10, 20200, Some(node_addr(20200, 2))).await;
	wait_for_stabilization(6).await;

	let a_state = a.state();
	let b_state = b.state();
	assert_eq!(a_state.fingers[0].node, Some(10));
	assert_eq!(b_state.fingers[0].node, Some(2));
	assert_eq!(a_state.predecessor, Some(10));
	assert_eq!(b_state.predecessor, Some(2));

	// key 3 lives on node 10; the put is mirrored to node 2 immediately
	a.put(3, b"x".to_vec()).await.unwrap();
	assert_eq!(a.get(3).await.unwrap(), Some(b"x".to_vec()));
	assert_eq!(b.get(3).await.unwrap(), Some(b"x".to_vec()));
	assert!(a.state().stored_keys.contains(&3));
	assert!(b.state().stored_keys.contains(&3));

	// deleting removes the primary and the backup
	b.delete(3).await.unwrap();
	assert_eq!(a.get(3).await.unwrap(), None);
	assert!(!a.state().stored_keys.contains(&3));
	assert!(!b.state().stored_keys.contains(&3));
}

#[tokio::test]
async fn arcs_crossing_zero_route_correctly() {
	init_logging();
	let low = make_node(4, 0, 20300, None).await;
	let high = make_node(4, 15, 20300, Some(node_addr(20300, 0))).await;
	wait_for_stabilization(6).await;

	// 0 and 15 are each other's neighbors in both directions
	assert_eq!(low.state().fingers[0].node, Some(15));
	assert_eq!(high.state().fingers[0].node, Some(0));

	assert_eq!(low.find_successor(0).await.unwrap().key(), 0);
	assert_eq!(low.find_successor(1).await.unwrap().key(), 15);
	assert_eq!(high.find_successor(15).await.unwrap().key(), 15);
	assert_eq!(high.find_successor(14).await.unwrap().key(), 15);

	// key 1 wraps around: primary on 15, backup on 0
	high.put(1, b"wrapped".to_vec()).await.unwrap();
	assert_eq!(low.get(1).await.unwrap(), Some(b"wrapped".to_vec()));
	assert!(high.state().stored_keys.contains(&1));
	assert!(low.state().stored_keys.contains(&1));
}

#[tokio::test]
async fn values_survive_a_node_leaving() {
	init_logging();
	let space = Keyspace::new(4).unwrap();
	let keys: Vec<NodeId> = (0..16).collect();
	let handles = make_ring(4, &keys, 20400).await;
	wait_for_stabilization(40).await;

	// several test keys may hash to the same identifier; the last write to
	// a slot is the value every reader should see afterwards
	let mut expected: HashMap<NodeId, Vec<u8>> = HashMap::new();
	for i in 0..10 {
		let value = format!("testValue{i}").into_bytes();
		handles[1].put_str(&format!("testKey{i}"), value.clone()).await.unwrap();
		expected.insert(key_hash(&format!("testKey{i}"), space), value);
	}

	// drop the node the bare key name hashes to, without warning
	let departing = key_hash("testKey", space);
	handles[departing as usize].leave();
	wait_for_stabilization(100).await;

	// its successor held the backups, so every value is still reachable
	let reader = &handles[((departing + 3) % 16) as usize];
	for i in 0..10 {
		let slot = key_hash(&format!("testKey{i}"), space);
		assert_eq!(
			reader.get_str(&format!("testKey{i}")).await.unwrap(),
			Some(expected[&slot].clone()),
			"lost value for testKey{i}",
		);
	}
}

#[tokio::test]
async fn lookups_recover_after_a_crash() {
	init_logging();
	let keys: Vec<NodeId> = vec![0, 3, 5, 9, 12, 15, 18, 22, 25, 28, 31, 35, 38, 42, 45, 48, 52, 55, 58, 62];
	let handles = make_ring(6, &keys, 20500).await;
	wait_for_stabilization(60).await;

	// a stable ring satisfies successor(n).predecessor = n for every node
	let mut successor_of = HashMap::new();
	let mut predecessor_of = HashMap::new();
	let mut successors = HashSet::new();
	for handle in &handles {
		let state = handle.state();
		let succ = state.fingers[0].node.expect("stable node should have a successor");
		assert!(successors.insert(succ), "two nodes share successor {succ}");
		successor_of.insert(state.key, succ);
		predecessor_of.insert(state.key, state.predecessor.expect("stable node should have a predecessor"));
	}
	for (&node, &succ) in &successor_of {
		assert_eq!(predecessor_of[&succ], node, "ring pointers disagree around {node}");
	}

	// kill one mid-ring node and let maintenance repair routes to it
	let dead: NodeId = 35;
	let dead_index = keys.iter().position(|&k| k == dead).unwrap();
	handles[dead_index].leave();
	wait_for_stabilization(80).await;

	let live: Vec<NodeId> = keys.iter().copied().filter(|&k| k != dead).collect();
	for (i, handle) in handles.iter().enumerate() {
		if i == dead_index {
			continue;
		}
		for id in (0..64).step_by(5) {
			let found = handle.find_successor(id).await.unwrap();
			assert_eq!(
				found.key(),
				expected_successor(&live, id),
				"wrong successor for id {id} asked from node {}",
				handle.key(),
			);
			// resolving the result's own key lands on the same node
			let again = handle.find_successor(found.key()).await.unwrap();
			assert_eq!(again.key(), found.key());
		}
	}
}

#[tokio::test]
async fn keys_outside_the_space_are_rejected() {
	init_logging();
	// a node key must fit the keyspace
	assert!(matches!(
		ChordNode::new(4, 16, "127.0.0.1:20600"),
		Err(Error::NodeKeyOutOfBounds { key: 16, keyspace: 16 }),
	));
	assert!(matches!(ChordNode::new(0, 0, "127.0.0.1:20600"), Err(Error::InvalidHashLength { bits: 0 })));

	let handle = make_node(4, 5, 20600, None).await;
	assert!(matches!(handle.put(16, b"v".to_vec()).await, Err(Error::KeyOutOfBounds { key: 16, keyspace: 16 })));
	assert!(matches!(handle.get(16).await, Err(Error::KeyOutOfBounds { .. })));
	assert!(matches!(handle.delete(99).await, Err(Error::KeyOutOfBounds { .. })));
	assert!(matches!(handle.find_successor(16).await, Err(Error::KeyOutOfBounds { .. })));
}

#[tokio::test]
async fn exhausted_retries_surface_network_hosed() {
	init_logging();
	let mut node = ChordNode::new(3, 5, "127.0.0.1:20700").unwrap();
	node.set_fix_interval(Duration::from_millis(10));
	let handle = node.start(None).await.unwrap();

	handle.put(1, b"v".to_vec()).await.unwrap();
	handle.leave();

	// m + 1 attempts, then the terminal failure with its last cause
	match handle.get(1).await {
		Err(Error::NetworkHosed(cause)) => assert!(matches!(*cause, Error::Departed)),
		other => panic!("expected NetworkHosed, got {other:?}"),
	}
}

#[tokio::test]
async fn backup_mutations_are_idempotent() {
	init_logging();
	let handle = make_node(4, 7, 20800, None).await;
	let remote = handle.remote();

	assert_eq!(remote.probe().await.unwrap(), 7);
	assert_eq!(remote.hash_length().await.unwrap(), 4);

	remote.put_backup(4, b"b".to_vec()).await.unwrap();
	remote.put_backup(4, b"b".to_vec()).await.unwrap();
	assert_eq!(handle.get(4).await.unwrap(), Some(b"b".to_vec()));
	assert_eq!(remote.state().await.unwrap().stored_keys, vec![4]);

	remote.remove_backup(4).await.unwrap();
	remote.remove_backup(4).await.unwrap();
	assert_eq!(handle.get(4).await.unwrap(), None);

	// a departed peer answers nothing, not even a probe
	handle.leave();
	sleep(FIX_INTERVAL).await;
	assert!(remote.probe().await.is_err());
	assert!(remote.put_backup(4, b"b".to_vec()).await.is_err());
}
