//! Fan-out writer task (C4).
//!
//! One instance is spawned per client on entry to `Relaying`. It is the sole
//! consumer of that client's outbound queue and the sole long-lived holder
//! of read access to `data_send` outside of the echo path.
use std::sync::Arc;

use quinn::SendStream;
use tokio::{io::AsyncWriteExt, sync::Mutex};
use tokio_util::sync::CancellationToken;

use crate::client::OutboundReceiver;
use qrelay_core::warn;

/// Drains `rx` in FIFO order, writing each frame to `data_send`. Exits when
/// the queue closes or a write fails; cancellation is cooperative, so a
/// write already in flight always finishes before the task returns.
pub async fn run_writer(data_send: Arc<Mutex<SendStream>>, mut rx: OutboundReceiver, cancel: CancellationToken, client_id: u32) {
	loop {
		let frame = tokio::select! {
			biased;
			_ = cancel.cancelled() => break,
			frame = rx.recv() => frame,
		};

		let Some(frame) = frame else { break };

		let mut send = data_send.lock().await;
		if let Err(err) = send.write_all(&frame).await {
			warn!("write to client {client_id} failed, stopping its writer task: {err}");
			break;
		}
	}
}
