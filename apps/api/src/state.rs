use std::sync::Arc;

use crate::backend::BackendClient;
use crate::compile::{CompileService, CompilerInvoker, WorkspaceManager};
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// LaTeX pipeline. The invoker inside is pluggable; production uses `LatexInvoker`.
    pub compiler: CompileService,
    /// Account / GitHub-import backend that the `/api/auth` and `/api/github/*`
    /// routes proxy to.
    pub backend: BackendClient,
}

impl AppState {
    pub fn new(
        config: Config,
        invoker: Arc<dyn CompilerInvoker>,
        backend: BackendClient,
    ) -> Self {
        let compiler = CompileService::new(
            invoker,
            WorkspaceManager::new(config.workspace_root.clone()),
            config.retention,
            config.artifact_delivery,
        );
        Self {
            config,
            compiler,
            backend,
        }
    }
}
