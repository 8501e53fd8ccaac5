//! Axum route handlers for the compile API.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::compile::{ArtifactDelivery, CompilationResult};
use crate::errors::AppError;
use crate::state::AppState;

pub const PDF_DATA_URL_PREFIX: &str = "data:application/pdf;base64,";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

/// Both field names are in use by editor clients.
#[derive(Debug, Deserialize)]
pub struct CompileRequest {
    #[serde(default, alias = "latexCode")]
    pub latex: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
}

impl CompileResponse {
    fn inline(artifact: &[u8]) -> Self {
        Self {
            success: true,
            pdf: Some(format!("{PDF_DATA_URL_PREFIX}{}", STANDARD.encode(artifact))),
            pdf_url: None,
        }
    }

    fn reference(workspace_id: Uuid) -> Self {
        Self {
            success: true,
            pdf: None,
            pdf_url: Some(artifact_url(workspace_id)),
        }
    }
}

pub fn artifact_url(workspace_id: Uuid) -> String {
    format!("/api/v1/latex/artifacts/{workspace_id}")
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/latex/compile (also mounted at POST /api)
///
/// Compiles the submitted LaTeX. A document the toolchain rejects is a 500
/// carrying the log summary; a missing or blank body is a 400.
pub async fn handle_compile(
    State(state): State<AppState>,
    payload: Result<Json<CompileRequest>, JsonRejection>,
) -> Result<Json<CompileResponse>, AppError> {
    let Json(request) =
        payload.map_err(|e| AppError::Validation(format!("Invalid request body: {e}")))?;
    let source = request
        .latex
        .ok_or_else(|| AppError::Validation("No LaTeX content provided".to_string()))?;

    debug!(source_len = source.len(), "Received LaTeX for compilation");

    match state.compiler.compile(&source).await? {
        CompilationResult::Success {
            workspace_id,
            artifact,
        } => Ok(Json(match state.compiler.delivery() {
            ArtifactDelivery::Inline => CompileResponse::inline(&artifact),
            ArtifactDelivery::Reference => CompileResponse::reference(workspace_id),
        })),
        CompilationResult::Failure { message } => Err(AppError::Compilation(message)),
    }
}

/// GET /api/v1/latex/artifacts/:id
///
/// Serves the raw PDF of a reference-delivered compile.
pub async fn handle_get_artifact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let workspace_id = Uuid::parse_str(&id)
        .map_err(|_| AppError::NotFound(format!("Artifact {id} not found")))?;

    let bytes = state.compiler.artifact(workspace_id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (header::CONTENT_DISPOSITION, "inline; filename=\"resume.pdf\""),
        ],
        bytes,
    ))
}
