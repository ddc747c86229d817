use std::sync::Arc;

use crate::error::Error;
use crate::proto::{Request, Response};

use super::Node;

/// Report a failed operation to the calling peer. An exhausted retry
/// harness stays distinguishable on the wire so the caller's own harness
/// does not retry on top of ours; everything else is a plain error the
/// caller may absorb as unreachable.
fn failure(e: Error) -> Response {
	match e {
		Error::NetworkHosed(cause) => Response::Hosed { message: cause.to_string() },
		e => Response::Error { message: e.to_string() },
	}
}

impl Node {
	/// Serve one inbound peer request. Every operation is refused once the
	/// node has left.
	pub(crate) async fn handle_request(self: &Arc<Self>, request: Request) -> Response {
		if self.has_left() {
			return Response::Departed;
		}
		match request {
			Request::GetNodeKey => Response::NodeKey { key: self.key },
			Request::GetHashLength => Response::HashLength { bits: self.space.bits() },
			Request::FindSuccessor { key } => match self.find_successor(key).await {
				Ok(node) => Response::Successor { node },
				Err(e) => failure(e),
			},
			Request::GetPredecessor => Response::Predecessor {
				node: self.predecessor.read().clone(),
			},
			Request::CheckPredecessor { candidate } => {
				match self.handle_check_predecessor(candidate).await {
					Ok(()) => Response::Done,
					Err(e) => failure(e),
				}
			},
			Request::GetState => Response::State { state: self.state() },
			Request::Get { key } => match self.get(key).await {
				Ok(value) => Response::Value { value },
				Err(e) => failure(e),
			},
			Request::Put { key, value } => match self.put(key, value).await {
				Ok(()) => Response::Done,
				Err(e) => failure(e),
			},
			Request::Delete { key } => match self.delete(key).await {
				Ok(()) => Response::Done,
				Err(e) => failure(e),
			},
			Request::PutBackup { key, value } => match self.put_backup(key, value) {
				Ok(()) => Response::Done,
				Err(e) => failure(e),
			},
			Request::RemoveBackup { key } => match self.remove_backup(key) {
				Ok(()) => Response::Done,
				Err(e) => failure(e),
			},
		}
	}
}
