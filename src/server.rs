//! JSON HTTP API over a shared [`ChatApp`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/documents` | Upload base64-encoded documents and rebuild the index |
//! | `POST` | `/sessions/{id}/messages` | Run one conversational turn |
//! | `GET`  | `/sessions/{id}` | Session transcript |
//! | `GET`  | `/sessions` | Known session ids |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "utterance must not be empty" } }
//! ```
//!
//! Pipeline failures add a `stage` field naming the step that failed.
//! Error codes: `bad_request` (400), `not_found` (404), `index_build` (502),
//! `embedding_service` (502), `language_model_service` (502).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use chrono::{DateTime, Utc};
use docchat_core::models::Transcript;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::app::{ChatApp, UploadReport};
use crate::config::Config;
use crate::conversation::TurnOutcome;
use crate::error::ChatError;
use crate::ingest::UploadedDocument;
use crate::progress::NoProgress;

/// Uploads of several PDFs easily exceed axum's 2 MB default.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Starts the HTTP server on `[server].bind` with providers from `config`.
///
/// Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let app = Arc::new(ChatApp::from_config(config)?);
    let listener = TcpListener::bind(&config.server.bind).await?;
    info!(addr = %listener.local_addr()?, "docchat server listening");
    serve(app, listener).await
}

/// Serve `app` on an already-bound listener.
pub async fn serve(app: Arc<ChatApp>, listener: TcpListener) -> anyhow::Result<()> {
    axum::serve(listener, router(app)).await?;
    Ok(())
}

/// The route table, without binding a socket.
pub fn router(app: Arc<ChatApp>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/documents", post(handle_upload))
        .route("/sessions", get(handle_list_sessions))
        .route("/sessions/{id}", get(handle_get_session))
        .route("/sessions/{id}/messages", post(handle_message))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(app)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<String>,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
    stage: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
                stage: self.stage,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
        stage: None,
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
        stage: None,
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        let (status, code) = match &err {
            ChatError::EmptyUtterance => (StatusCode::BAD_REQUEST, "bad_request"),
            ChatError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ChatError::IndexBuild(_)
            | ChatError::EmbeddingService { .. }
            | ChatError::LanguageModelService { .. } => (StatusCode::BAD_GATEWAY, err.code()),
        };
        if status.is_server_error() {
            error!(code, error = %err, "request failed");
        }
        AppError {
            status,
            code: code.to_string(),
            message: err.to_string(),
            stage: err.stage().map(|s| s.to_string()),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /documents ============

#[derive(Deserialize)]
struct UploadRequest {
    documents: Vec<DocumentPayload>,
}

#[derive(Deserialize)]
struct DocumentPayload {
    name: String,
    #[serde(default)]
    content_type: Option<String>,
    data_base64: String,
}

/// Decodes every document first, so a malformed payload rejects the
/// whole request before any indexing happens.
async fn handle_upload(
    State(app): State<Arc<ChatApp>>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<UploadReport>, AppError> {
    if req.documents.is_empty() {
        return Err(bad_request("documents must not be empty"));
    }

    let mut docs = Vec::with_capacity(req.documents.len());
    for payload in req.documents {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.data_base64.trim())
            .map_err(|e| bad_request(format!("{}: invalid base64: {}", payload.name, e)))?;
        docs.push(UploadedDocument {
            name: payload.name,
            content_type: payload.content_type,
            bytes,
        });
    }

    let report = app.upload(&docs, &NoProgress).await?;
    Ok(Json(report))
}

// ============ POST /sessions/{id}/messages ============

#[derive(Deserialize)]
struct MessageRequest {
    utterance: String,
}

async fn handle_message(
    State(app): State<Arc<ChatApp>>,
    Path(id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<TurnOutcome>, AppError> {
    if id.trim().is_empty() {
        return Err(bad_request("session id must not be empty"));
    }
    let outcome = app.converse(&id, &req.utterance).await?;
    Ok(Json(outcome))
}

// ============ GET /sessions/{id} ============

#[derive(Serialize)]
struct SessionResponse {
    id: String,
    transcript: Transcript,
    created_at: DateTime<Utc>,
    last_active_at: DateTime<Utc>,
}

async fn handle_get_session(
    State(app): State<Arc<ChatApp>>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = app
        .sessions()
        .session(&id)
        .ok_or_else(|| not_found(format!("session not found: {}", id)))?;
    Ok(Json(SessionResponse {
        id: session.id,
        transcript: session.transcript,
        created_at: session.created_at,
        last_active_at: session.last_active_at,
    }))
}

// ============ GET /sessions ============

#[derive(Serialize)]
struct SessionListResponse {
    sessions: Vec<String>,
}

async fn handle_list_sessions(State(app): State<Arc<ChatApp>>) -> Json<SessionListResponse> {
    Json(SessionListResponse {
        sessions: app.sessions().session_ids(),
    })
}
