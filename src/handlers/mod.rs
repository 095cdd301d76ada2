use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::models::config::AppConfig;
use crate::models::feeds::Page;
use crate::models::timestamp;
use crate::services::api::DashboardApi;
use crate::services::chat::{ChatError, ChatSession};
use crate::services::coordinator::ActionError;
use crate::services::dashboard::{Dashboard, DashboardSettings};

#[derive(Clone)]
pub struct AppState {
    pub api: Arc<dyn DashboardApi>,
    pub settings: DashboardSettings,
    pub view: Arc<RwLock<Arc<Dashboard>>>,
    pub chat: Arc<ChatSession>,
}

impl AppState {
    /// Mounts the configured start page.
    pub fn new(api: Arc<dyn DashboardApi>, config: &AppConfig) -> Self {
        let settings = DashboardSettings {
            cadences: config.cadences.clone(),
            history: config.history.clone(),
        };
        let view = Dashboard::mount(config.server.start_page, Arc::clone(&api), settings.clone());

        Self {
            api,
            settings,
            view: Arc::new(RwLock::new(view)),
            chat: Arc::new(ChatSession::new(config.chat.session_id.clone())),
        }
    }

    pub fn current(&self) -> Arc<Dashboard> {
        self.view.read().clone()
    }

    /// Unmounts the current view before the next one starts polling.
    pub fn navigate(&self, page: Page) -> Arc<Dashboard> {
        let mut view = self.view.write();
        view.unmount();
        *view = Dashboard::mount(page, Arc::clone(&self.api), self.settings.clone());
        view.clone()
    }

    pub fn shutdown(&self) {
        self.view.read().unmount();
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/view", get(current_view))
        .route("/api/navigate", post(navigate))
        .route("/api/actions/analysis", post(trigger_analysis))
        .route("/api/actions/refresh-all", post(refresh_all))
        .route("/api/actions/switch-db", post(switch_database))
        .route("/api/recommendations/select", post(select_recommendation))
        .route(
            "/api/chat",
            get(chat_history).post(send_chat).delete(clear_chat),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        let status = match &self {
            ActionError::Busy(_) => StatusCode::CONFLICT,
            ActionError::Failed { .. } => StatusCode::BAD_GATEWAY,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = match &self {
            ChatError::EmptyMessage => StatusCode::BAD_REQUEST,
            ChatError::Busy | ChatError::SessionCleared => StatusCode::CONFLICT,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn current_view(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.current().view(Utc::now()))
}

#[derive(Deserialize)]
struct NavigateRequest {
    page: Page,
}

async fn navigate(
    State(state): State<AppState>,
    Json(req): Json<NavigateRequest>,
) -> impl IntoResponse {
    info!(page = ?req.page, "navigating");
    Json(state.navigate(req.page).view(Utc::now()))
}

async fn trigger_analysis(State(state): State<AppState>) -> Response {
    match state.current().trigger_analysis().await {
        Ok(response) => Json(response).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn refresh_all(State(state): State<AppState>) -> Response {
    match state.current().refresh_all().await {
        Ok(()) => Json(json!({ "status": "ok" })).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Deserialize)]
struct SwitchDatabaseRequest {
    database: String,
}

async fn switch_database(
    State(state): State<AppState>,
    Json(req): Json<SwitchDatabaseRequest>,
) -> Response {
    let database = req.database.trim();
    if database.is_empty() {
        return bad_request("database is required");
    }

    match state.current().switch_database(database).await {
        Ok(()) => Json(json!({ "status": "ok", "database": database })).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Deserialize)]
struct SelectRecommendationRequest {
    timestamp: String,
}

async fn select_recommendation(
    State(state): State<AppState>,
    Json(req): Json<SelectRecommendationRequest>,
) -> Response {
    let Some(at) = timestamp::parse(&req.timestamp) else {
        return bad_request("invalid timestamp");
    };

    if state.current().select_recommendation(at) {
        Json(json!({ "selected": at.to_rfc3339() })).into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "recommendation not found" })),
        )
            .into_response()
    }
}

async fn chat_history(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "session_id": state.chat.session_id(),
        "awaiting_reply": state.chat.is_awaiting_reply(),
        "messages": state.chat.messages(),
    }))
}

#[derive(Deserialize)]
struct ChatInput {
    message: String,
}

async fn send_chat(State(state): State<AppState>, Json(input): Json<ChatInput>) -> Response {
    match state.chat.send(state.api.as_ref(), &input.message).await {
        Ok(reply) => Json(reply).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn clear_chat(State(state): State<AppState>) -> impl IntoResponse {
    let remote_cleared = state.chat.clear_history(state.api.as_ref()).await;
    Json(json!({ "cleared": true, "remote_cleared": remote_cleared }))
}
