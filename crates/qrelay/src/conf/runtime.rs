use std::{net::SocketAddr, sync::Arc, time::Duration};

use serde::Serialize;
use tracing::Level;

use super::persistent::LogLevel;

/// Fully resolved configuration, derived once from [`super::persistent::PersistentConfig`].
/// Also the value served back verbatim by `GET /info/config`.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
	pub quic_bind_addr:     SocketAddr,
	pub http_bind_addr:     SocketAddr,
	pub authorization_uri:  Arc<str>,
	pub log_level:          LogLevel,
	#[serde(skip)]
	pub max_idle_time:      Duration,
}

impl Config {
	pub fn from_persistent(config: super::persistent::PersistentConfig) -> Self {
		Self {
			quic_bind_addr: SocketAddr::from(([0, 0, 0, 0], config.quic_port)),
			http_bind_addr: SocketAddr::from(([0, 0, 0, 0], config.http_port)),
			authorization_uri: Arc::from(config.authorization_uri),
			log_level: config.log_level,
			max_idle_time: Duration::from_secs(15),
		}
	}

	/// `None` means logging is disabled entirely; `tracing` has no level
	/// below `ERROR`, so `Critical` collapses onto it.
	pub fn tracing_level(&self) -> Option<Level> {
		match self.log_level {
			LogLevel::Trace => Some(Level::TRACE),
			LogLevel::Debug => Some(Level::DEBUG),
			LogLevel::Info => Some(Level::INFO),
			LogLevel::Warn => Some(Level::WARN),
			LogLevel::Error | LogLevel::Critical => Some(Level::ERROR),
			LogLevel::None => None,
		}
	}
}
