//! Axum route handlers that proxy account and GitHub-import calls to the backend.

use axum::{extract::State, http::HeaderMap, Json};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::backend::token::{cookie_token, BearerToken, TokenKind};
use crate::errors::AppError;
use crate::state::AppState;

/// Actions `/api/auth` forwards; anything else is refused rather than
/// letting a client address arbitrary backend paths.
const AUTH_ACTIONS: &[&str] = &["login", "signup", "refresh", "logout"];

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

/// Filters for the project list. Accepts the editor's camelCase names.
#[derive(Debug, Default, Deserialize)]
pub struct ProjectFilters {
    #[serde(default, alias = "minStars")]
    pub min_stars: u32,
    #[serde(default, alias = "isArchived")]
    pub is_archived: bool,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    #[serde(default)]
    pub repos: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SelectionUpdate {
    pub data: Value,
}

#[derive(Debug, Deserialize)]
pub struct GithubConnectRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct GeminiConnectRequest {
    #[serde(alias = "geminiToken")]
    pub gemini_token: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/auth
///
/// Body `{ action, ...fields }`; the fields are posted to `<backend>/<action>`.
/// A `refresh` without `refresh_token` in the body uses the `refresh_token` cookie.
pub async fn handle_auth(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let Value::Object(mut fields) = body else {
        return Err(AppError::Validation("Request body must be a JSON object".to_string()));
    };
    let action = match fields.remove("action") {
        Some(Value::String(action)) => action,
        _ => return Err(AppError::Validation("Missing auth action".to_string())),
    };
    if !AUTH_ACTIONS.contains(&action.as_str()) {
        return Err(AppError::Validation(format!("Unsupported auth action '{action}'")));
    }
    if action == "refresh" && !fields.contains_key("refresh_token") {
        if let Some(token) = cookie_token(&headers, TokenKind::Refresh) {
            fields.insert("refresh_token".to_string(), Value::String(token));
        }
    }

    let result = state.backend.post(&action, &Value::Object(fields)).await?;
    Ok(Json(result))
}

/// POST /api/github/projects
pub async fn handle_list_projects(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Json(filters): Json<ProjectFilters>,
) -> Result<Json<Value>, AppError> {
    debug!(
        "Listing GitHub projects (min_stars={}, archived={})",
        filters.min_stars, filters.is_archived
    );
    let body = json!({
        "token": token,
        "min_stars": filters.min_stars,
        "is_archived": filters.is_archived,
        "include": filters.include,
        "exclude": filters.exclude,
    });
    Ok(Json(state.backend.post("github/projects/list", &body).await?))
}

/// GET /api/github/projects/view
pub async fn handle_view_projects(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Json<Value>, AppError> {
    let body = json!({ "token": token });
    Ok(Json(state.backend.post("github/projects/view", &body).await?))
}

/// GET /api/github/selection/get
pub async fn handle_get_selection(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Json<Value>, AppError> {
    let body = json!({ "token": token });
    Ok(Json(state.backend.post("github/selection/get", &body).await?))
}

/// POST /api/github/selection/set
pub async fn handle_set_selection(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Json(update): Json<SelectionUpdate>,
) -> Result<Json<Value>, AppError> {
    let body = json!({ "token": token, "data": update.data });
    state.backend.post("github/selection/set", &body).await?;
    Ok(Json(json!({ "success": true })))
}

/// POST /api/github/projects/import
///
/// Only repositories marked `true` in the saved selection are imported.
pub async fn handle_import_projects(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Json(request): Json<ImportRequest>,
) -> Result<Json<Value>, AppError> {
    let selection = state
        .backend
        .post("github/selection/get", &json!({ "token": token }))
        .await?;

    let saved = match selection.get("data") {
        Some(Value::Object(map)) if !map.is_empty() => map,
        _ => {
            return Err(AppError::Validation(
                "No project selection found. Please select projects to import before proceeding"
                    .to_string(),
            ))
        }
    };

    let repos = filter_selected(&request.repos, saved);
    if repos.is_empty() {
        return Err(AppError::Validation(
            "No projects selected to import. Please select at least one project".to_string(),
        ));
    }

    info!("Importing {} of {} requested repos", repos.len(), request.repos.len());
    let body = json!({ "token": token, "repos": repos });
    Ok(Json(state.backend.post("github/projects/import", &body).await?))
}

/// POST /api/github/connect
pub async fn handle_connect_github(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Json(request): Json<GithubConnectRequest>,
) -> Result<Json<Value>, AppError> {
    store_user_token(&state, &token, &request.token, "github").await?;
    Ok(Json(json!({ "success": true })))
}

/// POST /api/gemini/connect
pub async fn handle_connect_gemini(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Json(request): Json<GeminiConnectRequest>,
) -> Result<Json<Value>, AppError> {
    let result = store_user_token(&state, &token, &request.gemini_token, "gemini").await?;
    Ok(Json(result))
}

async fn store_user_token(
    state: &AppState,
    session_token: &str,
    value: &str,
    column: &str,
) -> Result<Value, AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{column} token cannot be empty")));
    }
    let body = json!({ "token": session_token, "value": value, "column": column });
    let result = state.backend.post("user_to_token/update", &body).await?;

    // The backend reports some failures as 200 with an `error` field.
    if let Some(err) = result.get("error").and_then(Value::as_str) {
        return Err(AppError::Validation(err.to_string()));
    }
    Ok(result)
}

/// Keeps the requested repos whose selection entry is exactly `true`, in request order.
fn filter_selected(requested: &[String], selection: &Map<String, Value>) -> Vec<String> {
    requested
        .iter()
        .filter(|repo| selection.get(repo.as_str()) == Some(&Value::Bool(true)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_filter_selected_keeps_true_only() {
        let saved = selection(json!({ "a": true, "b": false, "c": "true", "d": true }));
        let requested: Vec<String> = ["d", "a", "b", "c", "z"].map(String::from).to_vec();
        assert_eq!(filter_selected(&requested, &saved), vec!["d", "a"]);
    }

    #[test]
    fn test_filter_selected_empty_request() {
        let saved = selection(json!({ "a": true }));
        assert!(filter_selected(&[], &saved).is_empty());
    }

    #[test]
    fn test_project_filters_accept_camel_case() {
        let filters: ProjectFilters =
            serde_json::from_value(json!({ "minStars": 5, "isArchived": true })).unwrap();
        assert_eq!(filters.min_stars, 5);
        assert!(filters.is_archived);
        assert!(filters.include.is_empty());
    }

    #[test]
    fn test_project_filters_default_when_empty() {
        let filters: ProjectFilters = serde_json::from_value(json!({})).unwrap();
        assert_eq!(filters.min_stars, 0);
        assert!(!filters.is_archived);
    }
}
