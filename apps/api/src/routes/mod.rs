pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::backend::handlers as backend;
use crate::compile::handlers as compile;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Compile API. `/api` and `/api/` are what the editor posts to.
        .route("/api", post(compile::handle_compile))
        .route("/api/", post(compile::handle_compile))
        .route("/api/v1/latex/compile", post(compile::handle_compile))
        .route(
            "/api/v1/latex/artifacts/:id",
            get(compile::handle_get_artifact),
        )
        // Backend proxies
        .route("/api/auth", post(backend::handle_auth))
        .route("/api/github/projects", post(backend::handle_list_projects))
        .route(
            "/api/github/projects/view",
            get(backend::handle_view_projects),
        )
        .route(
            "/api/github/projects/import",
            post(backend::handle_import_projects),
        )
        .route(
            "/api/github/selection/get",
            get(backend::handle_get_selection),
        )
        .route(
            "/api/github/selection/set",
            post(backend::handle_set_selection),
        )
        .route("/api/github/connect", post(backend::handle_connect_github))
        .route("/api/gemini/connect", post(backend::handle_connect_gemini))
        .with_state(state)
}
