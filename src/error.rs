use crate::ring::NodeId;

/// A wrapped `Result` carrying this crate's errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong inside a chord node.
///
/// Routing and maintenance absorb `Unreachable` silently and self-heal by
/// clearing stale fingers or resetting the successor to self; only retry
/// exhaustion surfaces, as `NetworkHosed`. Argument errors bypass the retry
/// machinery entirely.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// A value key outside the identifier space `[0, 2^m)`.
	#[error("key value ({key}) is outside the allowable bounds [0, {keyspace})")]
	KeyOutOfBounds {
		/// The offending key.
		key: NodeId,
		/// The size of the identifier space, `2^m`.
		keyspace: u64,
	},

	/// A node key outside the identifier space `[0, 2^m)`.
	#[error("node key ({key}) cannot exceed the max keyspace ({keyspace})")]
	NodeKeyOutOfBounds {
		/// The offending node key.
		key: NodeId,
		/// The size of the identifier space, `2^m`.
		keyspace: u64,
	},

	/// A hash length that cannot be represented on this ring.
	#[error("hash length ({bits}) is outside the supported range [1, 63]")]
	InvalidHashLength {
		/// The offending hash length.
		bits: u32,
	},

	/// A remote call failed or a peer handle was not set. Transient; the
	/// retry harness consumes these.
	#[error("peer {addr} is unreachable: {reason}")]
	Unreachable {
		/// Address of the peer that could not be reached.
		addr: String,
		/// What the transport observed.
		reason: String,
	},

	/// The peer listener socket could not be bound.
	#[error("failed to listen on {addr}")]
	Listen {
		/// The requested listen address.
		addr: String,
		/// The underlying socket error.
		#[source]
		source: std::io::Error,
	},

	/// This node has left the ring and refuses service.
	#[error("node has left the ring")]
	Departed,

	/// Terminal failure after the retry bound was exhausted. Carries the
	/// last transient cause.
	#[error("the network is hosed")]
	NetworkHosed(#[source] Box<Error>),
}

impl Error {
	/// Whether the retry harness may re-execute the operation.
	pub fn is_transient(&self) -> bool {
		matches!(self, Error::Unreachable { .. } | Error::Departed)
	}
}
