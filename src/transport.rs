use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Deserializer;
use serde_json::error::Category;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::node::Node;
use crate::proto::{Request, Response};

// ceiling on a whole remote call: connect, send, receive
const CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// A TCP stream carrying newline-free JSON values back to back. Reads
/// buffer raw bytes until a complete value deserializes; leftover bytes
/// stay buffered for the next message.
struct JsonStream {
	stream: TcpStream,
	buffer: Vec<u8>,
}

impl JsonStream {
	fn new(stream: TcpStream) -> Self {
		Self { stream, buffer: Vec::new() }
	}

	async fn read<T: DeserializeOwned>(&mut self) -> std::io::Result<T> {
		loop {
			// attempt to deserialize one value from the buffer
			let mut decoded = None;
			let mut offset = 0;
			{
				let mut stream = Deserializer::from_slice(self.buffer.as_slice()).into_iter::<T>();
				match stream.next() {
					Some(Ok(msg)) => {
						decoded = Some(msg);
						offset = stream.byte_offset();
					},
					// an EOF here means more bytes may arrive later
					Some(Err(ref e)) if e.classify() == Category::Eof => {},
					Some(Err(e)) => {
						return Err(std::io::Error::new(ErrorKind::InvalidData, e));
					},
					None => {},
				}
			}
			if let Some(msg) = decoded {
				self.buffer.drain(..offset);
				return Ok(msg);
			}

			// else, read bytes into the buffer
			let mut tmp_buf = vec![0; 1024];
			match self.stream.read(&mut tmp_buf).await {
				Ok(0) => {
					return Err(std::io::Error::from(ErrorKind::UnexpectedEof));
				},
				Ok(len) => {
					self.buffer.extend_from_slice(&tmp_buf[..len]);
				},
				Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
					continue;
				},
				Err(e) => {
					return Err(e);
				},
			}
		}
	}

	async fn write<T: Serialize>(&mut self, msg: &T) -> std::io::Result<()> {
		let raw_data = serde_json::to_string(msg)
			.map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
		self.stream.write_all(raw_data.as_bytes()).await
	}
}

/// Perform one remote call: connect to `addr`, send the request, await the
/// response. Every failure along the way collapses into
/// [`Error::Unreachable`]; the retry harness upstream decides what to do
/// with it.
pub(crate) async fn call(addr: &str, request: Request) -> Result<Response> {
	let attempt = async {
		let stream = TcpStream::connect(addr).await?;
		let mut stream = JsonStream::new(stream);
		stream.write(&request).await?;
		stream.read::<Response>().await
	};
	match timeout(CALL_TIMEOUT, attempt).await {
		Ok(Ok(response)) => Ok(response),
		Ok(Err(e)) => Err(Error::Unreachable { addr: addr.to_string(), reason: e.to_string() }),
		Err(_) => Err(Error::Unreachable { addr: addr.to_string(), reason: "call timed out".to_string() }),
	}
}

/// Bind the peer listener and spawn the accept loop. Each accepted
/// connection gets its own serving task, so inbound calls never queue
/// behind each other.
pub(crate) async fn listen(addr: &str, node: Arc<Node>) -> Result<JoinHandle<()>> {
	let listener = TcpListener::bind(addr).await.map_err(|source| Error::Listen {
		addr: addr.to_string(),
		source,
	})?;
	info!("listening on {}", addr);
	Ok(tokio::spawn(async move {
		loop {
			match listener.accept().await {
				Ok((stream, _)) => {
					tokio::spawn(serve_connection(stream, node.clone()));
				},
				Err(e) => {
					warn!("error accepting connection: {}", e);
				},
			}
		}
	}))
}

async fn serve_connection(stream: TcpStream, node: Arc<Node>) {
	let mut stream = JsonStream::new(stream);
	loop {
		let request: Request = match stream.read().await {
			Ok(request) => request,
			// peer closed the connection or sent garbage; either way we are done
			Err(_) => break,
		};
		let response = node.handle_request(request).await;
		if stream.write(&response).await.is_err() {
			break;
		}
	}
}
