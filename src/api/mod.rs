mod agents;
mod projects;
mod reports;
mod sync;
mod tasks;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use fleetdeck_core::db::{Database, StorageError};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::gateway::GatewayClient;
use crate::github::GithubClient;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub github: Option<GithubClient>,
    pub gateway: Option<GatewayClient>,
}

impl AppState {
    pub fn new(db: Database, config: &Config) -> Self {
        Self {
            db,
            github: config.github_token.clone().map(GithubClient::new),
            gateway: config.gateway.clone().map(GatewayClient::new),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/agents",
            get(agents::list).post(agents::create).delete(agents::terminate),
        )
        .route("/agents/message", post(agents::message))
        .route("/tasks", get(tasks::list).post(tasks::create).patch(tasks::update))
        .route(
            "/reports",
            get(reports::list).post(reports::create).patch(reports::mark_status),
        )
        .route("/projects", get(projects::list))
        .route("/sessions", get(agents::sessions))
        .route("/sync-github", post(sync::sync_github))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    error: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, message: message.into() }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        tracing::error!("storage error: {err}");
        Self::internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiErrorBody { error: self.message })).into_response()
    }
}
