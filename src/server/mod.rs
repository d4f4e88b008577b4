
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

use crate::agent::{ChatAgent, ChatOutcome};
use crate::config::Config;
use crate::grounding::Language;
use crate::retrieval::RetrievalService;

/// Shared handler state; services are constructed once at startup and
/// passed by handle
pub struct AppState {
    pub retrieval: Arc<RetrievalService>,
    pub chat: Arc<ChatAgent>,
}

/// Request body for POST /api/chat
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default)]
    pub selected_text: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub language: Language,
}

#[derive(Debug, Serialize)]
pub struct ClearConversationResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ActiveConversationsResponse {
    pub conversations: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub vector_index_connected: bool,
    pub collection_exists: bool,
    pub chunk_count: u64,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    #[inline]
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

/// Build the HTTP router over the shared application state
#[inline]
pub fn router(state: Arc<AppState>, config: &Config) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/chat", post(chat))
        .route("/api/chat/:conversation_id", delete(clear_conversation))
        .route("/api/conversations", get(list_conversations))
        .route("/api/health", get(health))
        .with_state(state)
        .layer(cors_layer(config))
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .server
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/api/health",
    }))
}

/// Process a chat query and return a grounded response with citations
async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatOutcome>, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".to_string()));
    }

    let outcome = state
        .chat
        .chat(
            &request.query,
            request.selected_text.as_deref(),
            request.conversation_id,
            request.language,
        )
        .await
        .map_err(|e| {
            error!("Chat request failed: {}", e);
            ApiError::Internal(format!("Error processing chat request: {}", e))
        })?;

    Ok(Json(outcome))
}

/// Clear the session history for one conversation
async fn clear_conversation(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Result<Json<ClearConversationResponse>, ApiError> {
    let cleared = state
        .chat
        .clear_conversation(&conversation_id)
        .await
        .map_err(|e| {
            error!("Clear conversation failed: {}", e);
            ApiError::Internal(format!("Error clearing conversation: {}", e))
        })?;

    let message = if cleared {
        format!("Conversation {} cleared successfully", conversation_id)
    } else {
        format!("Conversation {} not found", conversation_id)
    };

    Ok(Json(ClearConversationResponse {
        success: cleared,
        message,
    }))
}

async fn list_conversations(
    State(state): State<Arc<AppState>>,
) -> Json<ActiveConversationsResponse> {
    let conversations = state.chat.active_conversations().await;
    let count = conversations.len();

    Json(ActiveConversationsResponse {
        conversations,
        count,
    })
}

/// Health check; degrades to "unhealthy" with zero counts rather than failing
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    match state.retrieval.ping().await {
        Ok(()) => {
            let collection_exists = state.retrieval.collection_exists().await;
            let chunk_count = if collection_exists {
                state.retrieval.chunk_count().await
            } else {
                0
            };

            Json(HealthResponse {
                status: "healthy".to_string(),
                vector_index_connected: true,
                collection_exists,
                chunk_count,
            })
        }
        Err(e) => Json(HealthResponse {
            status: format!("unhealthy: {}", e),
            vector_index_connected: false,
            collection_exists: false,
            chunk_count: 0,
        }),
    }
}
