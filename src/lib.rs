#![deny(missing_docs)]

//! A node of a Chord distributed hash table.
//!
//! Nodes cooperate to form a ring overlay over an m-bit identifier space
//! and store key/value pairs on the key's successor, with one backup on
//! the successor's immediate predecessor. A background maintainer repairs
//! the ring as peers come and go: successor/predecessor stabilization,
//! one finger repair per tick, and redistribution of stored values after
//! neighbor changes.
//!
//! # Examples
//! Start a new ring and store a value in it.
//! ```no_run
//! # async fn demo() -> chord_ring::Result<()> {
//! // a node with id 82 in a 2^6 identifier space, listening on port 3000
//! let node = chord_ring::ChordNode::new(6, 82, "127.0.0.1:3000")?;
//! // no bootstrap address: this node forms a ring of one
//! let handle = node.start(None).await?;
//!
//! handle.put_str("some key", b"some value".to_vec()).await?;
//! assert_eq!(handle.get_str("some key").await?, Some(b"some value".to_vec()));
//! # Ok(())
//! # }
//! ```
//!
//! Join an existing ring by naming any peer already in it.
//! ```no_run
//! # async fn demo() -> chord_ring::Result<()> {
//! let node = chord_ring::ChordNode::new(6, 17, "127.0.0.1:3001")?;
//! let handle = node.start(Some("127.0.0.1:3000".to_string())).await?;
//! # Ok(())
//! # }
//! ```

/// The identifier space and the clockwise arc predicate.
pub mod ring;
pub use ring::{Keyspace, NodeId, in_range};

/// Hashing of application keys onto the ring.
pub mod keyhash;
pub use keyhash::key_hash;

/// Everything that can go wrong, and the crate-wide `Result`.
pub mod error;
pub use error::{Error, Result};

/// The concurrent local value store.
pub mod store;

/// The finger table routing structure.
pub mod finger;

/// Network handles to other nodes, and the peer protocol they speak.
pub mod remote;
pub use remote::RemoteNode;

/// Ring-state snapshots for inspection.
pub mod state;
pub use state::NodeState;

/// The node itself: configuration, state machine, and client surface.
pub mod node;
pub use node::{ChordNode, NodeHandle};

mod proto;
mod transport;
