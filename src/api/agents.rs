use axum::extract::{Query, State};
use axum::Json;
use fleetdeck_core::models::{AgentStatus, CreateAgentInput};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use super::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateAgentRequest {
    name: Option<String>,
    task: Option<String>,
    model: Option<String>,
    metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct TerminateQuery {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    agent_id: Option<String>,
    message: Option<String>,
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let agents = state.db.list_agents()?;
    Ok(Json(json!({ "agents": agents })))
}

/// Create an agent, and when it comes with an initial task and the gateway
/// is configured, run the two-phase spawn: the row is reserved as `pending`
/// inside the create transaction and settled to `working` or `error` once
/// the gateway answers. A spawn failure keeps the row, in `error`, and
/// surfaces the upstream message.
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateAgentRequest>,
) -> Result<Json<Value>, ApiError> {
    let name = request
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request("name is required"))?;

    let input = CreateAgentInput {
        name,
        task: request.task,
        model: request.model,
        metadata: request.metadata,
    };
    let reserve = state.gateway.is_some() && input.task.is_some();
    let (mut agent, task) = state.db.create_agent(&input, reserve)?;

    if let (Some(gateway), Some(task_text)) = (state.gateway.as_ref(), input.task.as_deref()) {
        match gateway.spawn_session(&agent.name, task_text, &agent.id).await {
            Ok(session) => {
                state
                    .db
                    .settle_agent_spawn(&agent.id, AgentStatus::Working, Some(&session.session_key))?;
                info!(agent = %agent.id, session = %session.session_key, "remote session spawned");
                agent.status = AgentStatus::Working;
                agent.session_key = Some(session.session_key);
            }
            Err(err) => {
                state.db.settle_agent_spawn(&agent.id, AgentStatus::Error, None)?;
                error!(agent = %agent.id, "remote spawn failed: {}", err.message);
                return Err(err);
            }
        }
    }

    Ok(Json(json!({ "success": true, "agent": agent, "task": task })))
}

pub async fn terminate(
    State(state): State<AppState>,
    Query(query): Query<TerminateQuery>,
) -> Result<Json<Value>, ApiError> {
    let id = query
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("agent id is required"))?;

    if !state.db.terminate_agent(&id)? {
        return Err(ApiError::not_found("agent not found"));
    }
    info!(agent = %id, "agent terminated");
    Ok(Json(json!({ "success": true })))
}

/// Relay a message into an agent's remote session.
pub async fn message(
    State(state): State<AppState>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<Value>, ApiError> {
    let agent_id = request
        .agent_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("agent_id is required"))?;
    let text = request
        .message
        .filter(|message| !message.is_empty())
        .ok_or_else(|| ApiError::bad_request("message is required"))?;

    let gateway = state
        .gateway
        .as_ref()
        .ok_or_else(|| ApiError::internal("session gateway not configured"))?;
    let agent = state
        .db
        .get_agent(&agent_id)?
        .ok_or_else(|| ApiError::not_found("agent not found"))?;
    let session_key = agent
        .session_key
        .ok_or_else(|| ApiError::bad_request("agent has no remote session"))?;

    gateway.send_message(&session_key, &text).await?;
    Ok(Json(json!({ "success": true })))
}

/// Pass-through of the gateway's session list, for reviewing sessions that
/// outlive their agent rows.
pub async fn sessions(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let gateway = state
        .gateway
        .as_ref()
        .ok_or_else(|| ApiError::internal("session gateway not configured"))?;
    Ok(Json(gateway.list_sessions().await?))
}
