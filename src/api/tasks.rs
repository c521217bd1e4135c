use axum::extract::{Query, State};
use axum::Json;
use fleetdeck_core::models::{
    CreateTaskInput, TaskFilter, TaskPriority, TaskStatus, UpdateTaskInput,
};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use super::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct TaskListQuery {
    status: Option<String>,
    agent: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    title: Option<String>,
    description: Option<String>,
    priority: Option<String>,
    assigned_to: Option<String>,
    project_id: Option<String>,
    issue_number: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    id: Option<String>,
    status: Option<String>,
    // absent = leave alone, null = unassign, string = reassign
    #[serde(default, deserialize_with = "double_option")]
    assigned_to: Option<Option<String>>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

fn parse_status(raw: &str) -> Result<TaskStatus, ApiError> {
    TaskStatus::from_str(raw)
        .ok_or_else(|| ApiError::bad_request(format!("unknown task status: {raw}")))
}

fn parse_priority(raw: &str) -> Result<TaskPriority, ApiError> {
    TaskPriority::from_str(raw)
        .ok_or_else(|| ApiError::bad_request(format!("unknown task priority: {raw}")))
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<Value>, ApiError> {
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let filter = TaskFilter { status, assigned_to: query.agent };
    let tasks = state.db.list_tasks(&filter)?;
    Ok(Json(json!({ "tasks": tasks })))
}

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateTaskRequest>,
) -> Result<Json<Value>, ApiError> {
    let title = request
        .title
        .as_deref()
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request("title is required"))?;
    let priority = request
        .priority
        .as_deref()
        .map(parse_priority)
        .transpose()?
        .unwrap_or(TaskPriority::Medium);

    if let Some(agent_id) = &request.assigned_to {
        state
            .db
            .get_agent(agent_id)?
            .ok_or_else(|| ApiError::not_found("assigned agent not found"))?;
    }
    if let Some(project_id) = &request.project_id {
        state
            .db
            .get_project(project_id)?
            .ok_or_else(|| ApiError::not_found("project not found"))?;
    }

    let task = state.db.create_task(&CreateTaskInput {
        title,
        description: request.description,
        priority,
        assigned_to: request.assigned_to,
        project_id: request.project_id,
        issue_number: request.issue_number,
    })?;
    Ok(Json(json!({ "success": true, "task": task })))
}

pub async fn update(
    State(state): State<AppState>,
    Json(request): Json<UpdateTaskRequest>,
) -> Result<Json<Value>, ApiError> {
    let id = request
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("task id is required"))?;
    let status = request.status.as_deref().map(parse_status).transpose()?;
    if status.is_none() && request.assigned_to.is_none() {
        return Err(ApiError::bad_request("nothing to update"));
    }

    if let Some(Some(agent_id)) = &request.assigned_to {
        state
            .db
            .get_agent(agent_id)?
            .ok_or_else(|| ApiError::not_found("assigned agent not found"))?;
    }

    let updated = state
        .db
        .update_task(&id, &UpdateTaskInput { status, assigned_to: request.assigned_to })?;
    if !updated {
        return Err(ApiError::not_found("task not found"));
    }
    Ok(Json(json!({ "success": true })))
}
