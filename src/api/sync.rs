use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

use super::{ApiError, AppState};

/// Pull the configured account's repositories and upsert each one as a
/// project. Deliberately not one transaction: a failure midway leaves the
/// processed prefix committed, and the response reports only the aggregate
/// count.
pub async fn sync_github(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let github = state
        .github
        .as_ref()
        .ok_or_else(|| ApiError::internal("GITHUB_TOKEN not configured"))?;

    let repos = github.list_repos().await?;
    let mut synced = 0usize;
    for repo in &repos {
        state.db.upsert_synced_project(repo)?;
        synced += 1;
    }

    info!(synced, "synced repositories from GitHub");
    Ok(Json(json!({
        "success": true,
        "synced": synced,
        "message": format!("Synced {synced} repositories"),
    })))
}
