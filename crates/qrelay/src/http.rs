//! HTTP introspection server (C5) plus the `/auth/allow-all` testing stub.
//!
//! Every handler here is a pure read over the registry; none of them may
//! hold a lock across more than one snapshot call.
use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::{get, post}};
use qrelay_core::{ClientId, ClientInfo, StoreInfo};
use serde::Serialize;
use std::collections::HashMap;

use crate::conf::Config;

#[derive(Clone)]
pub struct AppState {
	pub registry: Arc<qrelay_server::ClientRegistry>,
	pub config:   Arc<Config>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppInfo {
	pub environment: &'static str,
	pub version:     &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllInfo {
	pub app:     AppInfo,
	pub config:  Arc<Config>,
	pub store:   StoreInfo,
	pub clients: HashMap<ClientId, ClientInfo>,
}

fn app_info() -> AppInfo {
	AppInfo {
		environment: if cfg!(debug_assertions) { "debug" } else { "release" },
		version:     env!("CARGO_PKG_VERSION"),
	}
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/auth/allow-all", post(allow_all_handler))
		.route("/info/app", get(app_info_handler))
		.route("/info/config", get(config_handler))
		.route("/info/store", get(store_info_handler))
		.route("/info/clients", get(client_infos_handler))
		.route("/info", get(all_info_handler))
		.with_state(state)
}

/// Testing stub for the authorization callout: always accepts.
async fn allow_all_handler() -> StatusCode {
	StatusCode::OK
}

async fn app_info_handler() -> Json<AppInfo> {
	Json(app_info())
}

async fn config_handler(State(state): State<AppState>) -> Json<Arc<Config>> {
	Json(state.config)
}

async fn store_info_handler(State(state): State<AppState>) -> Json<StoreInfo> {
	Json(state.registry.store_info().await)
}

async fn client_infos_handler(State(state): State<AppState>) -> Json<HashMap<ClientId, ClientInfo>> {
	Json(state.registry.client_infos().await)
}

async fn all_info_handler(State(state): State<AppState>) -> Json<AllInfo> {
	Json(AllInfo {
		app:     app_info(),
		config:  state.config.clone(),
		store:   state.registry.store_info().await,
		clients: state.registry.client_infos().await,
	})
}
