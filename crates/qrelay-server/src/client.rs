use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use qrelay_core::{ClientId, RtcClient};
use quinn::SendStream;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Bounded capacity of a client's outbound queue. Sized so a peer that falls
/// briefly behind doesn't need to be disconnected, but a peer that never
/// drains its queue can't grow it without bound.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 128;

pub type OutboundSender = tokio::sync::mpsc::Sender<Bytes>;
pub type OutboundReceiver = tokio::sync::mpsc::Receiver<Bytes>;

/// Builds the bounded, multi-producer single-consumer queue a client's
/// fan-out writer drains. Every peer relaying into this client holds a clone
/// of the sender; only the writer task holds the receiver.
pub fn outbound_channel() -> (OutboundSender, OutboundReceiver) {
	tokio::sync::mpsc::channel(OUTBOUND_QUEUE_CAPACITY)
}

/// A single authenticated QUIC connection.
///
/// Exists in the registry only between successful authentication and
/// teardown. `data_send` is shared between the fan-out writer task and the
/// connection handler's own echo path, since both write to the same quinn
/// stream; everything else is touched by at most one task at a time.
pub struct Client {
	pub id:          ClientId,
	alias:           OnceLock<String>,
	pub remote_addr: String,
	pub echo:        bool,
	pub outbound_tx: OutboundSender,
	pub data_send:   Arc<Mutex<SendStream>>,
	pub cancel:      CancellationToken,
}

impl Client {
	pub fn new(
		id: ClientId,
		remote_addr: String,
		echo: bool,
		outbound_tx: OutboundSender,
		data_send: SendStream,
		cancel: CancellationToken,
	) -> Self {
		Self {
			id,
			alias: OnceLock::new(),
			remote_addr,
			echo,
			outbound_tx,
			data_send: Arc::new(Mutex::new(data_send)),
			cancel,
		}
	}

	/// Set exactly once, when authentication succeeds.
	pub fn set_alias(&self, alias: String) {
		let _ = self.alias.set(alias);
	}

	/// Enqueues a frame destined for this client. Never blocks: if the
	/// queue is full the frame is dropped for this peer only, which is the
	/// backpressure policy (see `fanout`).
	pub fn try_enqueue(&self, frame: Bytes) -> Result<(), Bytes> {
		use tokio::sync::mpsc::error::TrySendError;

		self.outbound_tx.try_send(frame).map_err(|err| match err {
			TrySendError::Full(frame) => frame,
			TrySendError::Closed(frame) => frame,
		})
	}
}

impl RtcClient for Client {
	fn id(&self) -> ClientId {
		self.id
	}

	fn alias(&self) -> Option<&str> {
		self.alias.get().map(String::as_str)
	}

	fn remote_addr(&self) -> &str {
		&self.remote_addr
	}
}
