// LaTeX -> PDF compilation pipeline.
// workspace: per-request scratch directories. invoker: runs the toolchain.
// diagnostics: turns a failed run's log into a short message. service: ties
// them together. handlers: the HTTP surface.

use std::str::FromStr;

use anyhow::bail;

pub mod diagnostics;
pub mod handlers;
pub mod invoker;
pub mod service;
pub mod workspace;

#[cfg(test)]
pub(crate) mod testing;

pub use invoker::{CompilerInvoker, InvocationOutcome, InvokerError, LatexInvoker};
pub use service::{CompilationResult, CompileService};
pub use workspace::{CompilationWorkspace, RetentionPolicy, WorkspaceManager};

/// How a successful compile hands the PDF back to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactDelivery {
    /// `{ pdf: "data:application/pdf;base64,..." }` in the compile response.
    Inline,
    /// `{ pdfUrl: "/api/v1/latex/artifacts/<id>" }`, fetched separately.
    Reference,
}

impl FromStr for ArtifactDelivery {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(ArtifactDelivery::Inline),
            "reference" | "url" => Ok(ArtifactDelivery::Reference),
            other => bail!("ARTIFACT_DELIVERY must be 'inline' or 'reference', got '{other}'"),
        }
    }
}
