//! Authorization callout (C6).
use std::time::Duration;

use serde::Serialize;

const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct AuthorizationRequest<'a> {
	#[serde(rename = "Username")]
	username: &'a str,
	#[serde(rename = "Password")]
	password: &'a str,
	#[serde(rename = "RemoteAddress")]
	remote_address: &'a str,
}

/// POSTs the client's credentials to `uri` and treats any 2xx response as
/// acceptance. A non-2xx response, a network error, and exceeding the
/// timeout are all rejections; there is no retry and nothing is cached.
pub async fn authorize(http: &reqwest::Client, uri: &str, username: &str, password: &str, remote_address: &str) -> bool {
	let body = AuthorizationRequest { username, password, remote_address };

	match http.post(uri).json(&body).timeout(TIMEOUT).send().await {
		Ok(response) => response.status().is_success(),
		Err(_) => false,
	}
}
