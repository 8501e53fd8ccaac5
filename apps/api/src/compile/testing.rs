//! Scripted invokers for exercising the pipeline without a TeX installation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::compile::invoker::{CompilerInvoker, InvocationOutcome, InvokerError};
use crate::compile::workspace::CompilationWorkspace;

#[derive(Debug, Clone)]
pub enum Script {
    /// Copies the source into the artifact, so each PDF identifies its request.
    EchoSource,
    /// Writes the given log and rejects the document.
    Reject(&'static str),
    /// Rejects without writing any log.
    RejectWithoutLog,
    Missing,
    TimeOut,
    BrokenPipe,
}

pub struct ScriptedInvoker {
    script: Script,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl ScriptedInvoker {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared counter of `invoke` calls, readable after the invoker is moved.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl CompilerInvoker for ScriptedInvoker {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(
        &self,
        workspace: &CompilationWorkspace,
    ) -> Result<InvocationOutcome, InvokerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.script {
            Script::EchoSource => {
                let source = tokio::fs::read(workspace.source_path()).await?;
                tokio::fs::write(workspace.artifact_path(), source).await?;
                tokio::fs::write(workspace.log_path(), "Output written on document.pdf").await?;
                Ok(InvocationOutcome::Produced(workspace.artifact_path()))
            }
            Script::Reject(log) => {
                tokio::fs::write(workspace.log_path(), log).await?;
                Ok(InvocationOutcome::Rejected)
            }
            Script::RejectWithoutLog => Ok(InvocationOutcome::Rejected),
            Script::Missing => Err(InvokerError::ToolchainMissing("pdflatex".to_string())),
            Script::TimeOut => Err(InvokerError::TimedOut(Duration::from_secs(30))),
            Script::BrokenPipe => Err(InvokerError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "pipe closed at /var/lib/tailor/secret",
            ))),
        }
    }
}
