//! End-to-end tests driving real QUIC connections against a real listener.
//!
//! Each test binds the listener to port 0, learns the actual address, and
//! drives it with a bare `quinn::Connection` built from a verifier that
//! accepts any server certificate -- mirroring the relay's own clients,
//! which never validate what they connect to.
use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::http::StatusCode;
use bytes::BytesMut;
use qrelay_core::AppContext;
use quinn::{ClientConfig, Connection, Endpoint, RecvStream, SendStream, crypto::rustls::QuicClientConfig};
use qrelay_server::{
	ClientRegistry,
	listener,
	proto::{encode_authentication, encode_join_channel, write_control_message},
	tls::ALPN,
};
use rustls::{
	DigitallySignedStruct, SignatureScheme,
	client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
	pki_types::{CertificateDer, ServerName, UnixTime},
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const MAX_IDLE_TIME: Duration = Duration::from_secs(30);

/// The relay never authenticates itself to clients, so the test client
/// mirrors that: any certificate is accepted.
#[derive(Debug)]
struct AcceptAnyServerCert;

impl ServerCertVerifier for AcceptAnyServerCert {
	fn verify_server_cert(
		&self,
		_end_entity: &CertificateDer<'_>,
		_intermediates: &[CertificateDer<'_>],
		_server_name: &ServerName<'_>,
		_ocsp_response: &[u8],
		_now: UnixTime,
	) -> Result<ServerCertVerified, rustls::Error> {
		Ok(ServerCertVerified::assertion())
	}

	fn verify_tls12_signature(&self, _message: &[u8], _cert: &CertificateDer<'_>, _dss: &DigitallySignedStruct) -> Result<HandshakeSignatureValid, rustls::Error> {
		Ok(HandshakeSignatureValid::assertion())
	}

	fn verify_tls13_signature(&self, _message: &[u8], _cert: &CertificateDer<'_>, _dss: &DigitallySignedStruct) -> Result<HandshakeSignatureValid, rustls::Error> {
		Ok(HandshakeSignatureValid::assertion())
	}

	fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
		vec![
			SignatureScheme::ED25519,
			SignatureScheme::ECDSA_NISTP256_SHA256,
			SignatureScheme::ECDSA_NISTP384_SHA384,
			SignatureScheme::RSA_PSS_SHA256,
			SignatureScheme::RSA_PSS_SHA384,
			SignatureScheme::RSA_PSS_SHA512,
			SignatureScheme::RSA_PKCS1_SHA256,
			SignatureScheme::RSA_PKCS1_SHA384,
			SignatureScheme::RSA_PKCS1_SHA512,
		]
	}
}

fn test_client_endpoint() -> eyre::Result<Endpoint> {
	let mut endpoint = Endpoint::client("127.0.0.1:0".parse()?)?;

	let mut crypto = rustls::ClientConfig::builder_with_protocol_versions(&[&rustls::version::TLS13])
		.dangerous()
		.with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
		.with_no_client_auth();
	crypto.alpn_protocols = vec![ALPN.to_vec()];

	let client_config = ClientConfig::new(Arc::new(QuicClientConfig::try_from(crypto)?));
	endpoint.set_default_client_config(client_config);
	Ok(endpoint)
}

/// Starts the relay listener on an ephemeral port and returns its address
/// alongside the registry so tests can inspect introspection state directly.
async fn start_server(authorization_uri: Arc<str>) -> eyre::Result<(SocketAddr, Arc<ClientRegistry>, Arc<AppContext>)> {
	let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

	let endpoint = listener::bind("127.0.0.1:0".parse()?, MAX_IDLE_TIME)?;
	let addr = endpoint.local_addr()?;

	let ctx = AppContext::new();
	let registry = Arc::new(ClientRegistry::new());

	{
		let ctx = ctx.clone();
		let registry = registry.clone();
		tokio::spawn(async move {
			let _ = listener::serve(ctx, registry, endpoint, authorization_uri).await;
		});
	}

	Ok((addr, registry, ctx))
}

/// A fake authorization endpoint that accepts every request.
async fn spawn_allow_all() -> eyre::Result<Arc<str>> {
	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
	let addr = listener.local_addr()?;
	let app = axum::Router::new().route("/auth", axum::routing::post(|| async { StatusCode::OK }));
	tokio::spawn(async move {
		let _ = axum::serve(listener, app).await;
	});
	Ok(Arc::from(format!("http://{addr}/auth")))
}

/// A fake authorization endpoint that rejects every request.
async fn spawn_reject_all() -> eyre::Result<Arc<str>> {
	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
	let addr = listener.local_addr()?;
	let app = axum::Router::new().route("/auth", axum::routing::post(|| async { StatusCode::UNAUTHORIZED }));
	tokio::spawn(async move {
		let _ = axum::serve(listener, app).await;
	});
	Ok(Arc::from(format!("http://{addr}/auth")))
}

async fn connect(endpoint: &Endpoint, addr: SocketAddr) -> eyre::Result<Connection> {
	Ok(endpoint.connect(addr, "localhost")?.await?)
}

/// Opens the control stream, authenticates, then opens the data stream.
/// Returns the still-open control stream (for later `JoinChannel`s) plus the
/// data stream halves.
async fn authenticate(connection: &Connection, echo: bool, username: &str, password: &str) -> eyre::Result<(SendStream, SendStream, RecvStream)> {
	let mut control = connection.open_uni().await?;

	let mut buf = BytesMut::new();
	encode_authentication(echo, username, password, &mut buf)?;
	write_control_message(&mut control, buf).await?;

	let (data_send, data_recv) = connection.open_bi().await?;
	Ok((control, data_send, data_recv))
}

async fn join_channel(control: &mut SendStream, channel_id: u32) -> eyre::Result<()> {
	let mut buf = BytesMut::new();
	encode_join_channel(channel_id, &mut buf);
	write_control_message(control, buf).await?;
	Ok(())
}

async fn send_frame(send: &mut SendStream, payload: &[u8]) -> eyre::Result<()> {
	send.write_u16_le(payload.len() as u16).await?;
	if !payload.is_empty() {
		send.write_all(payload).await?;
	}
	Ok(())
}

async fn read_frame(recv: &mut RecvStream) -> eyre::Result<(u32, Vec<u8>)> {
	let sender_id = recv.read_u32_le().await?;
	let len = recv.read_u16_le().await?;
	let mut buf = vec![0u8; len as usize];
	recv.read_exact(&mut buf).await?;
	Ok((sender_id, buf))
}

async fn expect_silence(recv: &mut RecvStream) {
	let result = tokio::time::timeout(Duration::from_millis(200), recv.read_u32_le()).await;
	assert!(result.is_err(), "expected no frame to arrive, but one did");
}

#[test_log::test(tokio::test)]
async fn echo_returns_the_same_payload_to_its_sender() -> eyre::Result<()> {
	let auth = spawn_allow_all().await?;
	let (addr, _registry, ctx) = start_server(auth).await?;
	let client = test_client_endpoint()?;

	let connection = connect(&client, addr).await?;
	let (_control, mut data_send, mut data_recv) = authenticate(&connection, true, "alice", "hunter2").await?;

	send_frame(&mut data_send, &[]).await?; // keep-alive, should produce nothing
	send_frame(&mut data_send, b"Test Message").await?;

	let (sender_id, payload) = read_frame(&mut data_recv).await?;
	assert_eq!(sender_id, 0);
	assert_eq!(payload, b"Test Message");

	ctx.token.cancel();
	Ok(())
}

#[test_log::test(tokio::test)]
async fn fan_out_reaches_every_other_member_but_not_the_sender() -> eyre::Result<()> {
	let auth = spawn_allow_all().await?;
	let (addr, _registry, ctx) = start_server(auth).await?;
	let client = test_client_endpoint()?;

	let conn_a = connect(&client, addr).await?;
	let (mut control_a, mut send_a, mut recv_a) = authenticate(&conn_a, false, "a", "p").await?;
	join_channel(&mut control_a, 1).await?;

	let conn_b = connect(&client, addr).await?;
	let (mut control_b, _send_b, mut recv_b) = authenticate(&conn_b, false, "b", "p").await?;
	join_channel(&mut control_b, 1).await?;

	let conn_c = connect(&client, addr).await?;
	let (mut control_c, _send_c, mut recv_c) = authenticate(&conn_c, false, "c", "p").await?;
	join_channel(&mut control_c, 1).await?;

	// give the control messages time to land before sending
	tokio::time::sleep(Duration::from_millis(100)).await;

	send_frame(&mut send_a, b"hello").await?;

	let (sender_id, payload) = read_frame(&mut recv_b).await?;
	assert_eq!(sender_id, 0);
	assert_eq!(payload, b"hello");

	let (sender_id, payload) = read_frame(&mut recv_c).await?;
	assert_eq!(sender_id, 0);
	assert_eq!(payload, b"hello");

	expect_silence(&mut recv_a).await;

	ctx.token.cancel();
	Ok(())
}

#[test_log::test(tokio::test)]
async fn mutual_broadcast_carries_the_correct_sender_id_to_everyone_else() -> eyre::Result<()> {
	let auth = spawn_allow_all().await?;
	let (addr, _registry, ctx) = start_server(auth).await?;
	let client = test_client_endpoint()?;

	let conn_a = connect(&client, addr).await?;
	let (mut control_a, mut send_a, mut recv_a) = authenticate(&conn_a, false, "a", "p").await?;
	join_channel(&mut control_a, 7).await?;

	let conn_b = connect(&client, addr).await?;
	let (mut control_b, mut send_b, mut recv_b) = authenticate(&conn_b, false, "b", "p").await?;
	join_channel(&mut control_b, 7).await?;

	let conn_c = connect(&client, addr).await?;
	let (mut control_c, mut send_c, mut recv_c) = authenticate(&conn_c, false, "c", "p").await?;
	join_channel(&mut control_c, 7).await?;

	tokio::time::sleep(Duration::from_millis(100)).await;

	send_frame(&mut send_a, b"from-a").await?;
	send_frame(&mut send_b, b"from-b").await?;
	send_frame(&mut send_c, b"from-c").await?;

	let mut seen_by_a = vec![read_frame(&mut recv_a).await?, read_frame(&mut recv_a).await?];
	let mut seen_by_b = vec![read_frame(&mut recv_b).await?, read_frame(&mut recv_b).await?];
	let mut seen_by_c = vec![read_frame(&mut recv_c).await?, read_frame(&mut recv_c).await?];

	seen_by_a.sort_by_key(|(id, _)| *id);
	seen_by_b.sort_by_key(|(id, _)| *id);
	seen_by_c.sort_by_key(|(id, _)| *id);

	assert_eq!(seen_by_a.iter().map(|(_, p)| p.clone()).collect::<Vec<_>>(), vec![b"from-b".to_vec(), b"from-c".to_vec()]);
	assert_eq!(seen_by_b.iter().map(|(_, p)| p.clone()).collect::<Vec<_>>(), vec![b"from-a".to_vec(), b"from-c".to_vec()]);
	assert_eq!(seen_by_c.iter().map(|(_, p)| p.clone()).collect::<Vec<_>>(), vec![b"from-a".to_vec(), b"from-b".to_vec()]);

	let _ = (control_a, control_b, control_c);

	ctx.token.cancel();
	Ok(())
}

#[test_log::test(tokio::test)]
async fn a_rejected_authorization_tears_the_connection_down() -> eyre::Result<()> {
	let auth = spawn_reject_all().await?;
	let (addr, registry, ctx) = start_server(auth).await?;
	let client = test_client_endpoint()?;

	let connection = connect(&client, addr).await?;
	let (_control, mut data_send, mut data_recv) = authenticate(&connection, false, "nobody", "wrong").await?;

	// the handler never gets as far as accepting a data stream, so any
	// attempt to use it observes the connection going away.
	let result = send_frame(&mut data_send, b"irrelevant").await;
	let _ = read_frame(&mut data_recv).await;
	assert!(result.is_err() || data_recv.read_u8().await.is_err());

	assert_eq!(registry.store_info().await.client_count, 0);

	ctx.token.cancel();
	Ok(())
}

#[test_log::test(tokio::test)]
async fn channel_zero_is_a_silent_quarantine() -> eyre::Result<()> {
	let auth = spawn_allow_all().await?;
	let (addr, _registry, ctx) = start_server(auth).await?;
	let client = test_client_endpoint()?;

	let conn_a = connect(&client, addr).await?;
	let (_control_a, mut send_a, mut recv_a) = authenticate(&conn_a, false, "a", "p").await?;

	let conn_b = connect(&client, addr).await?;
	let (_control_b, _send_b, mut recv_b) = authenticate(&conn_b, false, "b", "p").await?;

	// neither client ever sends JoinChannel, so both stay on channel 0.
	send_frame(&mut send_a, b"into-the-void").await?;

	expect_silence(&mut recv_b).await;
	expect_silence(&mut recv_a).await;

	ctx.token.cancel();
	Ok(())
}

#[test_log::test(tokio::test)]
async fn rejoining_a_channel_collapses_membership_in_the_old_one() -> eyre::Result<()> {
	let auth = spawn_allow_all().await?;
	let (addr, registry, ctx) = start_server(auth).await?;
	let client = test_client_endpoint()?;

	let connection = connect(&client, addr).await?;
	let (mut control, _data_send, _data_recv) = authenticate(&connection, false, "a", "p").await?;

	join_channel(&mut control, 1).await?;
	tokio::time::sleep(Duration::from_millis(100)).await;
	assert_eq!(registry.store_info().await.channel_count, 1);

	join_channel(&mut control, 2).await?;
	tokio::time::sleep(Duration::from_millis(100)).await;

	let info = registry.store_info().await;
	assert_eq!(info.channel_count, 1, "the old channel must not linger once the client leaves it");
	assert_eq!(info.client_count, 1);

	ctx.token.cancel();
	Ok(())
}
