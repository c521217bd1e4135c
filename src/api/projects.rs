use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use super::{ApiError, AppState};

pub async fn list(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let projects = state.db.list_projects()?;
    Ok(Json(json!({ "projects": projects })))
}
