//! Compile service — one request's trip through the pipeline:
//! validate → create workspace → write source → invoke → read PDF or
//! summarize log → apply retention.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use bytes::Bytes;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::compile::diagnostics::{summarize_log_file, GENERIC_FAILURE};
use crate::compile::invoker::{CompilerInvoker, InvocationOutcome, InvokerError};
use crate::compile::workspace::{CompilationWorkspace, RetentionPolicy, WorkspaceManager};
use crate::compile::ArtifactDelivery;
use crate::errors::AppError;

pub const TIMEOUT_FAILURE: &str = "compilation timed out";

/// Outcome of a valid compile request. Exactly one variant applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompilationResult {
    Success { workspace_id: Uuid, artifact: Bytes },
    /// The document could not be compiled; `message` is safe to show the user.
    Failure { message: String },
}

/// Stateless across requests: every call owns its own workspace.
#[derive(Clone)]
pub struct CompileService {
    invoker: Arc<dyn CompilerInvoker>,
    workspaces: WorkspaceManager,
    retention: RetentionPolicy,
    delivery: ArtifactDelivery,
}

impl CompileService {
    pub fn new(
        invoker: Arc<dyn CompilerInvoker>,
        workspaces: WorkspaceManager,
        retention: RetentionPolicy,
        delivery: ArtifactDelivery,
    ) -> Self {
        Self {
            invoker,
            workspaces,
            retention,
            delivery,
        }
    }

    pub fn delivery(&self) -> ArtifactDelivery {
        self.delivery
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Compiles `source`. Blank input is rejected before any workspace exists.
    pub async fn compile(&self, source: &str) -> Result<CompilationResult, AppError> {
        if source.trim().is_empty() {
            return Err(AppError::Validation(
                "No LaTeX content provided".to_string(),
            ));
        }

        let started = Instant::now();
        let workspace = self
            .workspaces
            .create()
            .await
            .context("Failed to create compilation workspace")?;

        let result = self.run(&workspace, source).await;

        // Everything the response needs has been read into memory by now.
        if self.discard_after(&result) {
            if let Err(e) = self.workspaces.remove(&workspace).await {
                warn!(workspace_id = %workspace.id(), "Failed to remove workspace: {e}");
            }
        }

        info!(
            workspace_id = %workspace.id(),
            engine = self.invoker.name(),
            source_len = source.len(),
            outcome = outcome_label(&result),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Compilation finished"
        );
        result
    }

    /// Loads a previously produced PDF for reference-style delivery.
    pub async fn artifact(&self, workspace_id: Uuid) -> Result<Bytes, AppError> {
        let not_found = || AppError::NotFound(format!("Artifact {workspace_id} not found"));

        let workspace = self.workspaces.open(workspace_id).await.ok_or_else(not_found)?;
        let bytes = match tokio::fs::read(workspace.artifact_path()).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => {
                return Err(AppError::Internal(
                    anyhow::Error::new(e).context("Failed to read compiled artifact"),
                ))
            }
        };

        if self.retention == RetentionPolicy::DeleteAfterResponse {
            if let Err(e) = self.workspaces.remove(&workspace).await {
                warn!(workspace_id = %workspace_id, "Failed to remove workspace: {e}");
            }
        }

        Ok(Bytes::from(bytes))
    }

    async fn run(
        &self,
        workspace: &CompilationWorkspace,
        source: &str,
    ) -> Result<CompilationResult, AppError> {
        workspace
            .write_source(source)
            .await
            .context("Failed to write LaTeX source")?;

        match self.invoker.invoke(workspace).await {
            Ok(InvocationOutcome::Produced(path)) => {
                let bytes = tokio::fs::read(&path)
                    .await
                    .context("Failed to read compiled artifact")?;
                if bytes.is_empty() {
                    warn!(workspace_id = %workspace.id(), "Toolchain produced an empty PDF");
                    return Ok(CompilationResult::Failure {
                        message: GENERIC_FAILURE.to_string(),
                    });
                }
                Ok(CompilationResult::Success {
                    workspace_id: workspace.id(),
                    artifact: Bytes::from(bytes),
                })
            }
            Ok(InvocationOutcome::Rejected) => Ok(CompilationResult::Failure {
                message: summarize_log_file(&workspace.log_path()).await,
            }),
            Err(InvokerError::ToolchainMissing(engine)) => {
                error!("LaTeX toolchain '{engine}' is not available");
                Ok(CompilationResult::Failure {
                    message: GENERIC_FAILURE.to_string(),
                })
            }
            Err(InvokerError::TimedOut(limit)) => {
                warn!(workspace_id = %workspace.id(), "Compilation exceeded {limit:?}");
                Ok(CompilationResult::Failure {
                    message: TIMEOUT_FAILURE.to_string(),
                })
            }
            Err(e @ InvokerError::Io(_)) => Err(AppError::Internal(
                anyhow::Error::new(e).context("LaTeX toolchain invocation failed"),
            )),
        }
    }

    fn discard_after(&self, result: &Result<CompilationResult, AppError>) -> bool {
        if self.retention != RetentionPolicy::DeleteAfterResponse {
            return false;
        }
        // A referenced artifact must survive until it is fetched.
        let awaiting_fetch = self.delivery == ArtifactDelivery::Reference
            && matches!(result, Ok(CompilationResult::Success { .. }));
        !awaiting_fetch
    }
}

fn outcome_label(result: &Result<CompilationResult, AppError>) -> &'static str {
    match result {
        Ok(CompilationResult::Success { .. }) => "success",
        Ok(CompilationResult::Failure { .. }) => "failure",
        Err(_) => "error",
    }
}
