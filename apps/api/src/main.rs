use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tailor_api::backend::BackendClient;
use tailor_api::compile::workspace::spawn_sweeper;
use tailor_api::compile::{CompilerInvoker, LatexInvoker};
use tailor_api::config::Config;
use tailor_api::routes::build_router;
use tailor_api::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ResumeTailor API v{}", env!("CARGO_PKG_VERSION"));

    // Compiler: single-pass batch run, bounded by COMPILE_TIMEOUT_SECS
    let invoker: Arc<dyn CompilerInvoker> = Arc::new(LatexInvoker::from_config(&config));
    info!(
        "LaTeX engine: {} (timeout {:?}), workspaces under {:?}",
        invoker.name(),
        config.compile_timeout,
        config.workspace_root
    );

    let backend = BackendClient::new(&config.backend_api_url)?;
    info!("Backend client initialized ({})", backend.base_url());

    let state = AppState::new(config.clone(), invoker, backend);

    match config.sweep_age() {
        Some(max_age) => {
            spawn_sweeper(state.compiler.workspaces().clone(), max_age);
            info!("Workspace sweep enabled (max age {max_age:?})");
        }
        None => info!("Workspaces are removed once their response is built"),
    }

    // Build router
    // TODO: restrict CORS origins to the editor's host once it has a fixed one
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
