//! HTTP API route handlers

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::server::AppState;
use finchat::{save_token, AskRequest, AskResponse, Error, ErrorKind, HubClient, LoginRequest, UploadRequest};

/// Error body returned by every handler: `{error, kind, message}`
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::DocumentParse | ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::NotReady => StatusCode::CONFLICT,
        ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
        ErrorKind::EmbeddingModel | ErrorKind::GenerationModel => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::VectorStore | ErrorKind::Config | ErrorKind::Io => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = status_for(kind);
        if status.is_server_error() {
            warn!(kind = kind.as_str(), "request failed: {}", self.0);
        }
        (
            status,
            Json(json!({
                "error": self.0.user_message(),
                "kind": kind,
                "message": self.0.to_string()
            })),
        )
            .into_response()
    }
}

type ApiResult = std::result::Result<(StatusCode, Json<serde_json::Value>), ApiError>;

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let api = create_api_routes(state);

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api", api)
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(100 * 1024 * 1024)) // 100MB limit
}

/// Create API routes
fn create_api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/status", get(handle_status))
        .route("/login", post(handle_login))
        .route("/upload", post(handle_upload))
        .route("/process", post(handle_process))
        .route("/ask", post(handle_ask))
        .route("/history", get(handle_history))
        .route("/session", delete(handle_reset))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Route Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn handle_status(State(state): State<Arc<AppState>>) -> ApiResult {
    let chain = state.chain.lock().await;
    let chunks = chain.indexed_chunks().await?;

    Ok((StatusCode::OK, Json(json!({
        "status": chain.status().as_str(),
        "ready": chain.is_ready(),
        "indexed_chunks": chunks,
        "pending_uploads": chain.pending_uploads().iter().map(|u| u.name.as_str()).collect::<Vec<_>>(),
        "history_len": chain.history().len(),
        "models": {
            "embedder": chain.embedder_name(),
            "generator": chain.generator_name(),
            "store": chain.store_name()
        }
    }))))
}

async fn handle_login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult {
    let client = HubClient::new(&state.config.hub)?;
    let identity = client.login(&payload.token).await?;

    let saved_to = if payload.save {
        Some(save_token(&payload.token)?.display().to_string())
    } else {
        None
    };

    Ok((StatusCode::OK, Json(json!({
        "message": "Connected to Hugging Face",
        "user": identity,
        "saved_to": saved_to
    }))))
}

async fn handle_upload(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UploadRequest>,
) -> ApiResult {
    let uploads = payload
        .documents
        .into_iter()
        .map(|doc| doc.decode())
        .collect::<finchat::Result<Vec<_>>>()?;

    let mut chain = state.chain.lock().await;
    let staged = chain.upload_documents(uploads)?;

    Ok((StatusCode::OK, Json(json!({
        "staged": staged,
        "names": chain.pending_uploads().iter().map(|u| u.name.as_str()).collect::<Vec<_>>()
    }))))
}

async fn handle_process(State(state): State<Arc<AppState>>) -> ApiResult {
    let mut chain = state.chain.lock().await;
    let report = chain.process_documents().await?;

    Ok((StatusCode::OK, Json(json!({
        "status": chain.status().as_str(),
        "report": report
    }))))
}

async fn handle_ask(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AskRequest>,
) -> ApiResult {
    let mut chain = state.chain.lock().await;
    let answer = chain.ask(&payload.question).await?;

    let response = AskResponse {
        question: payload.question,
        answer: answer.text,
        sources: answer.sources,
        history_len: chain.history().len(),
    };
    Ok((StatusCode::OK, Json(json!(response))))
}

async fn handle_history(State(state): State<Arc<AppState>>) -> ApiResult {
    let chain = state.chain.lock().await;
    Ok((StatusCode::OK, Json(json!({ "history": chain.history() }))))
}

async fn handle_reset(State(state): State<Arc<AppState>>) -> ApiResult {
    let mut chain = state.chain.lock().await;
    chain.reset().await?;
    Ok((StatusCode::OK, Json(json!({ "status": chain.status().as_str() }))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::NotReady), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::DocumentParse), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::Authentication), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(ErrorKind::GenerationModel), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for(ErrorKind::VectorStore), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_api_error_response_status() {
        let response = ApiError::from(Error::NotReady).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = ApiError::from(Error::InvalidInput("empty question".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
