//! QUIC accept loop.
//!
//! Every accepted connection is handed to [`crate::connection::handle_connection`]
//! on its own task, so a slow or stuck connection never blocks the listener
//! from accepting the next one.
use std::{net::SocketAddr, sync::Arc, time::Duration};

use qrelay_core::{AppContext, error, info};
use quinn::{Endpoint, EndpointConfig, IdleTimeout, ServerConfig, TokioRuntime, TransportConfig, crypto::rustls::QuicServerConfig};
use rustls::ServerConfig as RustlsServerConfig;

use crate::{
	ClientRegistry,
	connection::handle_connection,
	tls::{ALPN, EphemeralIdentity, generate_self_signed},
};

pub struct ListenerOpts {
	pub bind_addr:         SocketAddr,
	pub authorization_uri: Arc<str>,
	pub max_idle_time:     Duration,
}

/// Binds the QUIC endpoint without accepting anything yet. Split out from
/// [`serve`] so a caller can read back the actual bound address before
/// connections start arriving (tests bind to port 0).
pub fn bind(bind_addr: SocketAddr, max_idle_time: Duration) -> eyre::Result<Endpoint> {
	let identity = generate_self_signed(vec!["localhost".to_string()])?;
	let server_config = build_server_config(identity, max_idle_time)?;

	let socket = std::net::UdpSocket::bind(bind_addr)?;
	let endpoint = Endpoint::new(EndpointConfig::default(), Some(server_config), socket, Arc::new(TokioRuntime))?;
	Ok(endpoint)
}

/// Accepts connections on `endpoint` until `ctx`'s token fires. Each
/// connection is spawned onto `ctx.tasks` immediately.
pub async fn serve(ctx: Arc<AppContext>, registry: Arc<ClientRegistry>, endpoint: Endpoint, authorization_uri: Arc<str>) -> eyre::Result<()> {
	info!("quic listener bound to {}", endpoint.local_addr()?);

	let http = reqwest::Client::new();

	loop {
		tokio::select! {
			_ = ctx.token.cancelled() => {
				info!("quic listener shutting down");
				break;
			}
			incoming = endpoint.accept() => {
				let Some(incoming) = incoming else { break };

				let ctx = ctx.clone();
				let registry = registry.clone();
				let authorization_uri = authorization_uri.clone();
				let http = http.clone();

				ctx.tasks.spawn(async move {
					match incoming.accept() {
						Ok(connecting) => match connecting.await {
							Ok(connection) => handle_connection(ctx, registry, connection, authorization_uri, http).await,
							Err(err) => error!("failed to establish a quic connection: {err}"),
						},
						Err(err) => error!("failed to accept a quic connection: {err}"),
					}
				});
			}
		}
	}

	endpoint.wait_idle().await;
	Ok(())
}

/// Binds and serves in one call. The entry point `main` uses.
pub async fn run(ctx: Arc<AppContext>, registry: Arc<ClientRegistry>, opts: ListenerOpts) -> eyre::Result<()> {
	let endpoint = bind(opts.bind_addr, opts.max_idle_time)?;
	serve(ctx, registry, endpoint, opts.authorization_uri).await
}

fn build_server_config(identity: EphemeralIdentity, max_idle_time: Duration) -> eyre::Result<ServerConfig> {
	let mut crypto = RustlsServerConfig::builder_with_protocol_versions(&[&rustls::version::TLS13])
		.with_no_client_auth()
		.with_single_cert(identity.certificate, identity.private_key)?;
	crypto.alpn_protocols = vec![ALPN.to_vec()];

	let mut config = ServerConfig::with_crypto(Arc::new(QuicServerConfig::try_from(crypto)?));

	let mut transport = TransportConfig::default();
	transport.max_idle_timeout(Some(IdleTimeout::try_from(max_idle_time).map_err(|_| eyre::eyre!("invalid max idle time"))?));
	config.transport_config(Arc::new(transport));

	Ok(config)
}
