use std::sync::Arc;

use clap::Parser as _;
use qrelay_core::{AppContext, info};
use qrelay_server::{ClientRegistry, listener::ListenerOpts};
use tokio::task::JoinSet;

use crate::cli::Cli;

mod cli;
mod conf;
mod http;
mod log;

#[tokio::main]
async fn main() -> eyre::Result<()> {
	let cli = match Cli::try_parse() {
		Ok(v) => v,
		Err(err) => {
			println!("{err:#}");
			return Ok(());
		}
	};

	if cli.version {
		const VER: &str = match option_env!("QRELAY_OVERRIDE_VERSION") {
			Some(v) => v,
			None => env!("CARGO_PKG_VERSION"),
		};
		println!("qrelay {VER}");
		return Ok(());
	}

	let persistent = conf::persistent::PersistentConfig::load(cli.config)?;
	let config = Arc::new(conf::Config::from_persistent(persistent));

	log::init_log(config.tracing_level())?;
	info!("qrelay starting");

	let ctx = AppContext::new();
	let registry = Arc::new(ClientRegistry::new());

	let mut set: JoinSet<eyre::Result<()>> = JoinSet::new();

	{
		let ctx = ctx.clone();
		let registry = registry.clone();
		let opts = ListenerOpts {
			bind_addr:         config.quic_bind_addr,
			authorization_uri: config.authorization_uri.clone(),
			max_idle_time:     config.max_idle_time,
		};
		set.spawn(async move { qrelay_server::listener::run(ctx, registry, opts).await });
	}

	{
		let config = config.clone();
		let registry = registry.clone();
		let http_bind_addr = config.http_bind_addr;
		set.spawn(async move {
			let state = http::AppState { registry, config };
			let listener = tokio::net::TcpListener::bind(http_bind_addr).await?;
			info!("http introspection server bound to {http_bind_addr}");
			axum::serve(listener, http::router(state)).await?;
			Ok(())
		});
	}

	set.spawn(async move {
		tokio::signal::ctrl_c().await?;
		info!("received ctrl-c, shutting down");
		ctx.token.cancel();
		ctx.tasks.close();
		ctx.tasks.wait().await;
		Ok(())
	});

	while let Some(result) = set.join_next().await {
		match result {
			Ok(Ok(())) => {}
			Ok(Err(err)) => return Err(err),
			Err(err) => return Err(err.into()),
		}
	}

	Ok(())
}
