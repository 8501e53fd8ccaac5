/// Backend client — the single point of entry for calls to the account and
/// GitHub-import backend.
///
/// The backend speaks JSON over HTTP. Payloads are treated as opaque
/// `serde_json::Value`s: this service only adds the bearer token, forwards,
/// and relays the reply. Non-2xx replies become `AppError::Upstream`, which
/// keeps the backend's status and surfaces its message in the common error shape.
use std::time::Duration;

use anyhow::Context;
use axum::http::StatusCode;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::errors::AppError;

pub mod handlers;
pub mod token;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build backend HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POSTs `body` to `<base_url>/<path>` and returns the decoded JSON reply.
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, AppError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!("Backend POST {url}");

        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        let payload = decode_body(&text);

        if !status.is_success() {
            warn!("Backend {path} returned {status}");
            return Err(AppError::Upstream {
                // reqwest and axum depend on different `http` majors.
                status: StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
                body: payload,
            });
        }

        Ok(payload)
    }
}

/// Empty bodies decode to `null`; non-JSON bodies are wrapped as `{ "error": text }`.
fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| json!({ "error": text }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_body_json() {
        assert_eq!(decode_body("{\"ok\":true}"), json!({ "ok": true }));
    }

    #[test]
    fn test_decode_body_plain_text() {
        assert_eq!(
            decode_body("Bad Gateway"),
            json!({ "error": "Bad Gateway" })
        );
    }

    #[test]
    fn test_decode_body_empty() {
        assert_eq!(decode_body("  "), Value::Null);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = BackendClient::new("http://backend:5000/").unwrap();
        assert_eq!(client.base_url(), "http://backend:5000");
    }
}
