//! Shared reqwest plumbing for the service clients.

use super::types::ClientError;

use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Build the HTTP client used by every service client.
pub(crate) fn build_http_client(timeout: Duration) -> Result<Client, ClientError> {
	Ok(Client::builder().timeout(timeout).build()?)
}

/// Parse a base URL and make sure it ends with a slash so `join` appends paths.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
	let normalized = if raw.ends_with('/') {
		raw.to_string()
	} else {
		format!("{}/", raw)
	};
	Url::parse(&normalized).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", raw, e)))
}

pub(crate) fn join(base: &Url, path: &str) -> Result<Url, ClientError> {
	base.join(path.trim_start_matches('/'))
		.map_err(|e| ClientError::InvalidUrl(format!("{}{}: {}", base, path, e)))
}

/// Map a response status to a `ClientError` and decode the JSON body.
///
/// Rejected credentials surface as [`ClientError::Unauthorized`]; any other non-success
/// status keeps the response body for the log.
pub(crate) async fn decode_response<T: DeserializeOwned>(
	response: Response,
) -> Result<T, ClientError> {
	let status = response.status();
	if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
		return Err(ClientError::Unauthorized { status });
	}

	if !status.is_success() {
		let body = response.text().await.unwrap_or_default();
		return Err(ClientError::Status { status, body });
	}

	let text = response.text().await?;
	debug!("Response body: {}", text);
	Ok(serde_json::from_str(&text)?)
}
