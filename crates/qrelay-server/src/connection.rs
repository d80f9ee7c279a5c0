//! Per-connection protocol engine (C3).
//!
//! Drives one accepted QUIC connection through
//! `AwaitControlStream -> AwaitAuthMessage -> Authorizing -> AwaitDataStream
//! -> Relaying -> Closed`. Every error is handled here: nothing propagates
//! past this module, the listener only ever sees a completed future.
use std::sync::Arc;

use qrelay_core::{QUARANTINE_CHANNEL, debug, error, info, warn};
use quinn::{Connection, RecvStream};
use tokio_util::sync::CancellationToken;

use crate::{
	ClientRegistry,
	auth,
	client::{Client, outbound_channel},
	fanout::run_writer,
	proto::{ControlMessage, ProtoError, encode_outbound_frame, read_control_message, read_data_frame},
};

/// Why a connection's run loop ended. Used only to pick a log level at the
/// call site.
enum Outcome {
	Cancelled,
	StreamClosed(String),
	Unauthorized,
	Protocol(ProtoError),
}

/// A read error whose cause is an EOF is a peer closing the stream, not
/// malformed input; everything else is a protocol violation.
fn classify_read_error(err: ProtoError) -> Outcome {
	if let ProtoError::Io { source, .. } = &err
		&& source.kind() == std::io::ErrorKind::UnexpectedEof
	{
		return Outcome::StreamClosed("stream closed by peer".into());
	}
	Outcome::Protocol(err)
}

pub async fn handle_connection(
	ctx: Arc<qrelay_core::AppContext>,
	registry: Arc<ClientRegistry>,
	connection: Connection,
	authorization_uri: Arc<str>,
	http: reqwest::Client,
) {
	let remote_addr = connection.remote_address().to_string();
	let cancel = ctx.child_token();

	let outcome = run(&registry, &connection, &authorization_uri, &http, &remote_addr, cancel).await;

	match outcome {
		Outcome::Cancelled => debug!("connection from {remote_addr} cancelled"),
		Outcome::StreamClosed(reason) => debug!("connection from {remote_addr} closed: {reason}"),
		Outcome::Unauthorized => info!("connection from {remote_addr} rejected by authorization"),
		Outcome::Protocol(err) => warn!("connection from {remote_addr} violated the protocol: {err}"),
	}
}

async fn run(
	registry: &Arc<ClientRegistry>,
	connection: &Connection,
	authorization_uri: &str,
	http: &reqwest::Client,
	remote_addr: &str,
	cancel: CancellationToken,
) -> Outcome {
	// AwaitControlStream
	let mut control = tokio::select! {
		biased;
		_ = cancel.cancelled() => return Outcome::Cancelled,
		stream = connection.accept_uni() => match stream {
			Ok(stream) => stream,
			Err(err) => return Outcome::StreamClosed(err.to_string()),
		},
	};

	// AwaitAuthMessage: ignore anything but Authentication until it arrives.
	let (echo, username, password) = loop {
		tokio::select! {
			biased;
			_ = cancel.cancelled() => return Outcome::Cancelled,
			msg = read_control_message(&mut control) => match msg {
				Ok(ControlMessage::Authentication { echo, username, password }) => break (echo, username, password),
				Ok(ControlMessage::JoinChannel { .. } | ControlMessage::Invalid { .. }) => continue,
				Err(err) => return classify_read_error(err),
			},
		}
	};

	// Authorizing
	if !auth::authorize(http, authorization_uri, &username, &password, remote_addr).await {
		return Outcome::Unauthorized;
	}

	// AwaitDataStream
	let (data_send, mut data_recv) = tokio::select! {
		biased;
		_ = cancel.cancelled() => return Outcome::Cancelled,
		stream = connection.accept_bi() => match stream {
			Ok(stream) => stream,
			Err(err) => return Outcome::StreamClosed(err.to_string()),
		},
	};

	let client_id = registry.next_client_id();
	let (outbound_tx, outbound_rx) = outbound_channel();
	let client = Arc::new(Client::new(client_id, remote_addr.to_owned(), echo, outbound_tx, data_send, cancel.clone()));
	client.set_alias(username);

	// "Default channel 0" rule: every client starts quarantined.
	registry.add(client.clone(), QUARANTINE_CHANNEL).await;

	let writer = tokio::spawn(run_writer(client.data_send.clone(), outbound_rx, cancel.clone(), client.id));

	let outcome = tokio::select! {
		biased;
		_ = cancel.cancelled() => Outcome::Cancelled,
		outcome = control_consumer(&client, registry, &mut control) => outcome,
		outcome = data_relay(&client, registry, &mut data_recv) => outcome,
	};

	registry.remove(client.id).await;
	cancel.cancel();
	// Cancellation is cooperative: let the writer finish draining the queue
	// (and any write already in flight) rather than killing it mid-write.
	let _ = writer.await;

	outcome
}

/// Reads control messages for the remainder of the connection's life,
/// re-routing the client on every `JoinChannel`. A malformed message trips
/// the linked cancellation signal so the data relay exits too.
async fn control_consumer(client: &Arc<Client>, registry: &Arc<ClientRegistry>, control: &mut RecvStream) -> Outcome {
	loop {
		match read_control_message(control).await {
			Ok(ControlMessage::Authentication { .. }) => {
				debug!("ignoring re-authentication from client {}", client.id);
			}
			Ok(ControlMessage::JoinChannel { channel_id }) => {
				registry.add(client.clone(), channel_id).await;
			}
			Ok(ControlMessage::Invalid { kind }) => {
				warn!("client {} sent an unrecognized control message (type {kind})", client.id);
			}
			Err(err) => return classify_read_error(err),
		}
	}
}

/// Reads data frames from the client and either echoes them back directly
/// or fans them out to every peer on the client's current channel.
async fn data_relay(client: &Arc<Client>, registry: &Arc<ClientRegistry>, data_recv: &mut RecvStream) -> Outcome {
	use tokio::io::AsyncWriteExt;

	loop {
		let payload = match read_data_frame(data_recv).await {
			Ok(payload) => payload,
			Err(err) => return classify_read_error(err),
		};

		if payload.is_empty() {
			continue;
		}

		if client.echo {
			let framed = encode_outbound_frame(client.id, &payload);
			let mut send = client.data_send.lock().await;
			if let Err(err) = send.write_all(&framed).await {
				return Outcome::StreamClosed(err.to_string());
			}
			continue;
		}

		let peers = registry.peers_on_same_channel(client.id, true).await;
		for peer in peers {
			let framed = encode_outbound_frame(client.id, &payload).freeze();
			if peer.try_enqueue(framed).is_err() {
				error!("dropping a frame for client {} (its outbound queue is full)", peer.id);
			}
		}
	}
}
