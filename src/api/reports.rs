use axum::extract::{Query, State};
use axum::Json;
use fleetdeck_core::models::{CreateReportInput, ReportFilter, ReportStatus, ReportType};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct ReportListQuery {
    status: Option<String>,
    agent: Option<String>,
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateReportRequest {
    agent_id: Option<String>,
    task_id: Option<String>,
    #[serde(rename = "type")]
    report_type: Option<String>,
    title: Option<String>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MarkStatusRequest {
    id: Option<String>,
    status: Option<String>,
}

fn parse_status(raw: &str) -> Result<ReportStatus, ApiError> {
    ReportStatus::from_str(raw)
        .ok_or_else(|| ApiError::bad_request(format!("unknown report status: {raw}")))
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ReportListQuery>,
) -> Result<Json<Value>, ApiError> {
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let filter = ReportFilter {
        status,
        agent_id: query.agent,
        limit: query.limit.unwrap_or(50),
    };
    let reports = state.db.list_reports(&filter)?;
    Ok(Json(json!({ "reports": reports })))
}

/// Agents submit reports here. A `completion` report carrying a task id
/// also advances that task to `review` (done in one transaction with the
/// report insert and its audit log entry).
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateReportRequest>,
) -> Result<Json<Value>, ApiError> {
    let agent_id = request.agent_id.filter(|value| !value.is_empty());
    let type_raw = request.report_type.filter(|value| !value.is_empty());
    let title = request.title.filter(|value| !value.is_empty());

    let mut missing = Vec::new();
    if agent_id.is_none() {
        missing.push("agent_id");
    }
    if type_raw.is_none() {
        missing.push("type");
    }
    if title.is_none() {
        missing.push("title");
    }
    let (Some(agent_id), Some(type_raw), Some(title)) = (agent_id, type_raw, title) else {
        return Err(ApiError::bad_request(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    };

    let report_type = ReportType::from_str(&type_raw)
        .ok_or_else(|| ApiError::bad_request(format!("unknown report type: {type_raw}")))?;

    state
        .db
        .get_agent(&agent_id)?
        .ok_or_else(|| ApiError::not_found("agent not found"))?;
    if let Some(task_id) = &request.task_id {
        state
            .db
            .get_task(task_id)?
            .ok_or_else(|| ApiError::not_found("task not found"))?;
    }

    let report = state.db.create_report(&CreateReportInput {
        agent_id,
        task_id: request.task_id,
        report_type,
        title,
        content: request.content,
    })?;
    Ok(Json(json!({ "success": true, "report": report })))
}

pub async fn mark_status(
    State(state): State<AppState>,
    Json(request): Json<MarkStatusRequest>,
) -> Result<Json<Value>, ApiError> {
    let (id, status_raw) = match (request.id, request.status) {
        (Some(id), Some(status)) if !id.is_empty() && !status.is_empty() => (id, status),
        _ => return Err(ApiError::bad_request("Missing id or status")),
    };
    let status = parse_status(&status_raw)?;

    if !state.db.set_report_status(&id, status)? {
        return Err(ApiError::not_found("report not found"));
    }
    Ok(Json(json!({ "success": true })))
}
