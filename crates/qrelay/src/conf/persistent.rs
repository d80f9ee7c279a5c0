use educe::Educe;
use figment::{
	Figment,
	providers::{Env, Format, Json},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Educe, PartialEq, Eq)]
#[educe(Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
	Trace,
	#[educe(Default)]
	Debug,
	Info,
	Warn,
	Error,
	Critical,
	None,
}

#[derive(Debug, Deserialize, Serialize, Educe)]
#[educe(Default)]
pub struct PersistentConfig {
	#[educe(Default = 9443)]
	pub quic_port: u16,

	#[educe(Default = 8080)]
	pub http_port: u16,

	#[educe(Default = "http://127.0.0.1:8080/auth/allow-all")]
	#[serde(alias = "auth_uri")]
	pub authorization_uri: String,

	#[educe(Default = LogLevel::Info)]
	pub log_level: LogLevel,
}

impl PersistentConfig {
	/// Loads from a JSON config file if `config_path` (or `./config.json`)
	/// exists, else falls back to `RTC_SERVER_*` environment variables.
	/// Failure to produce a complete config is always fatal to the caller.
	pub fn load(config_path: Option<String>) -> eyre::Result<Self> {
		let mut figment = Figment::new();

		let default_path = std::path::Path::new("config.json");
		if let Some(path) = &config_path {
			figment = figment.merge(Json::file(path));
		} else if default_path.exists() {
			figment = figment.merge(Json::file(default_path));
		}

		figment = figment.merge(Env::prefixed("RTC_SERVER_"));

		let config: PersistentConfig = figment.extract()?;
		Ok(config)
	}
}
