//! Compiler invocation — runs the LaTeX toolchain inside a workspace.
//!
//! `CompilerInvoker` is the seam between the request pipeline and the external
//! program. `LatexInvoker` is the production implementation; tests substitute
//! scripted invokers so the pipeline can be exercised without TeX installed.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::compile::workspace::{CompilationWorkspace, SOURCE_FILE};
use crate::config::Config;

/// The expected result of running the toolchain on a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutcome {
    /// The toolchain exited cleanly and wrote a PDF at this path.
    Produced(PathBuf),
    /// The toolchain rejected the document. The workspace log explains why.
    Rejected,
}

/// Failures that are not about the document itself.
#[derive(Debug, Error)]
pub enum InvokerError {
    #[error("LaTeX toolchain '{0}' is not installed or not on PATH")]
    ToolchainMissing(String),

    #[error("LaTeX toolchain did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("Failed to run LaTeX toolchain: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait CompilerInvoker: Send + Sync {
    /// Identifies the toolchain in logs (e.g. "pdflatex").
    fn name(&self) -> &str;

    /// Compiles `workspace`'s source file in place. The workspace log must
    /// exist afterwards whenever `Ok` is returned.
    async fn invoke(
        &self,
        workspace: &CompilationWorkspace,
    ) -> Result<InvocationOutcome, InvokerError>;
}

/// Single-pass batch-mode run of a TeX engine (`pdflatex` by default).
pub struct LatexInvoker {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl LatexInvoker {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: vec![
                "-interaction=nonstopmode".to_string(),
                "-halt-on-error".to_string(),
                "-no-shell-escape".to_string(),
                SOURCE_FILE.to_string(),
            ],
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.latex_engine.clone(), config.compile_timeout)
    }

    /// Replaces the default argument list, for engines with a different CLI.
    /// The program still runs with the workspace as its working directory.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

#[async_trait]
impl CompilerInvoker for LatexInvoker {
    fn name(&self) -> &str {
        &self.program
    }

    async fn invoke(
        &self,
        workspace: &CompilationWorkspace,
    ) -> Result<InvocationOutcome, InvokerError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(workspace.dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the wait future on timeout drops the child, which kills it.
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    InvokerError::ToolchainMissing(self.program.clone())
                }
                _ => InvokerError::Io(e),
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                warn!(
                    workspace_id = %workspace.id(),
                    "{} killed after {:?}", self.program, self.timeout
                );
                return Err(InvokerError::TimedOut(self.timeout));
            }
        };

        // Engines that die before opening their log still print to the terminal.
        let log_path = workspace.log_path();
        if !tokio::fs::try_exists(&log_path).await.unwrap_or(false) {
            let mut captured = output.stdout.clone();
            captured.extend_from_slice(&output.stderr);
            tokio::fs::write(&log_path, captured).await?;
        }

        let artifact = workspace.artifact_path();
        let produced = tokio::fs::try_exists(&artifact).await.unwrap_or(false);

        debug!(
            workspace_id = %workspace.id(),
            status = ?output.status.code(),
            produced,
            "{} finished", self.program
        );

        if output.status.success() && produced {
            Ok(InvocationOutcome::Produced(artifact))
        } else {
            Ok(InvocationOutcome::Rejected)
        }
    }
}
