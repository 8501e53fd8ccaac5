//! Compile client — how the editor reaches the compile endpoint.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::compile::handlers::PDF_DATA_URL_PREFIX;

const DEFAULT_FAILURE: &str = "LaTeX compilation failed";
const INVALID_RESPONSE: &str = "Invalid response from compilation API";

/// A compiled document as the editor holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// PDF bytes delivered in the compile response.
    Inline(Bytes),
    /// URL the preview loads the PDF from.
    Remote(String),
}

/// A failed compile, as the user should see it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CompileError {
    pub message: String,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait CompileClient: Send + Sync {
    async fn compile(&self, source: &str) -> Result<Artifact, CompileError>;
}

/// `CompileClient` over HTTP against `POST <base_url>/api/v1/latex/compile`.
#[derive(Clone)]
pub struct HttpCompileClient {
    client: Client,
    base_url: String,
}

impl HttpCompileClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CompileClient for HttpCompileClient {
    async fn compile(&self, source: &str) -> Result<Artifact, CompileError> {
        let url = format!("{}/api/v1/latex/compile", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "latex": source }))
            .send()
            .await
            .map_err(|e| {
                debug!("Compile request failed: {e}");
                CompileError::new("Unable to reach the compilation service")
            })?;

        let ok = response.status().is_success();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        decode_response(ok, &body, &self.base_url)
    }
}

/// Maps a compile-endpoint reply to the client contract. Relative `pdfUrl`s
/// are resolved against `base_url`.
pub(crate) fn decode_response(
    ok: bool,
    body: &Value,
    base_url: &str,
) -> Result<Artifact, CompileError> {
    if !ok || body["success"] != Value::Bool(true) {
        let message = body["error"]
            .as_str()
            .or_else(|| body["message"].as_str())
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(if ok { INVALID_RESPONSE } else { DEFAULT_FAILURE });
        return Err(CompileError::new(message));
    }

    if let Some(pdf) = body["pdf"].as_str() {
        let encoded = pdf.strip_prefix(PDF_DATA_URL_PREFIX).unwrap_or(pdf);
        return STANDARD
            .decode(encoded)
            .map(|bytes| Artifact::Inline(Bytes::from(bytes)))
            .map_err(|_| CompileError::new(INVALID_RESPONSE));
    }

    if let Some(url) = body["pdfUrl"].as_str() {
        let url = if url.starts_with('/') {
            format!("{base_url}{url}")
        } else {
            url.to_string()
        };
        return Ok(Artifact::Remote(url));
    }

    Err(CompileError::new(INVALID_RESPONSE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tempfile::TempDir;

    use crate::backend::BackendClient;
    use crate::compile::testing::{Script, ScriptedInvoker};
    use crate::config::Config;
    use crate::routes::build_router;
    use crate::state::AppState;

    const BASE: &str = "http://localhost:8080";

    #[test]
    fn test_inline_pdf_decoded() {
        let body = json!({ "success": true, "pdf": "data:application/pdf;base64,JVBERi0xLjc=" });
        assert_eq!(
            decode_response(true, &body, BASE).unwrap(),
            Artifact::Inline(Bytes::from_static(b"%PDF-1.7"))
        );
    }

    #[test]
    fn test_relative_url_resolved() {
        let body = json!({ "success": true, "pdfUrl": "/api/v1/latex/artifacts/abc" });
        assert_eq!(
            decode_response(true, &body, BASE).unwrap(),
            Artifact::Remote("http://localhost:8080/api/v1/latex/artifacts/abc".to_string())
        );
    }

    #[test]
    fn test_error_field_surfaced() {
        let body = json!({ "success": false, "error": "! Undefined control sequence." });
        assert_eq!(
            decode_response(false, &body, BASE).unwrap_err().message,
            "! Undefined control sequence."
        );
    }

    #[test]
    fn test_message_field_surfaced() {
        let body = json!({ "message": "Compilation service unavailable" });
        assert_eq!(
            decode_response(false, &body, BASE).unwrap_err().message,
            "Compilation service unavailable"
        );
    }

    #[test]
    fn test_unreadable_error_body_gets_default() {
        assert_eq!(
            decode_response(false, &Value::Null, BASE).unwrap_err().message,
            DEFAULT_FAILURE
        );
    }

    #[test]
    fn test_success_without_artifact_is_invalid() {
        let body = json!({ "success": true });
        assert_eq!(
            decode_response(true, &body, BASE).unwrap_err().message,
            INVALID_RESPONSE
        );
    }

    async fn serve(invoker: ScriptedInvoker, root: &TempDir) -> String {
        let config = Config::for_tests(root.path());
        let backend = BackendClient::new(&config.backend_api_url).unwrap();
        let app = build_router(AppState::new(config, Arc::new(invoker), backend));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_http_client_against_router() {
        let root = TempDir::new().unwrap();
        let base = serve(ScriptedInvoker::new(Script::EchoSource), &root).await;
        let client = HttpCompileClient::new(Client::new(), base);

        assert_eq!(
            client.compile("\\documentclass{article}").await.unwrap(),
            Artifact::Inline(Bytes::from_static(b"\\documentclass{article}"))
        );
        assert_eq!(
            client.compile("   ").await.unwrap_err().message,
            "No LaTeX content provided"
        );
    }

    #[tokio::test]
    async fn test_http_client_surfaces_compiler_errors() {
        let root = TempDir::new().unwrap();
        let log = "! LaTeX Error: Missing \\begin{document}.\n";
        let base = serve(ScriptedInvoker::new(Script::Reject(log)), &root).await;
        let client = HttpCompileClient::new(Client::new(), base);

        assert_eq!(
            client.compile("Hello").await.unwrap_err().message,
            "! LaTeX Error: Missing \\begin{document}."
        );
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let client = HttpCompileClient::new(Client::new(), "http://127.0.0.1:9");
        assert_eq!(
            client.compile("x").await.unwrap_err().message,
            "Unable to reach the compilation service"
        );
    }

    #[test]
    fn test_corrupt_base64_is_invalid() {
        let body = json!({ "success": true, "pdf": "data:application/pdf;base64,%%%" });
        assert_eq!(
            decode_response(true, &body, BASE).unwrap_err().message,
            INVALID_RESPONSE
        );
    }
}
