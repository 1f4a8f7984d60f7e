//! HTTP endpoints: `POST /process` (multipart upload, or a `text` field sent
//! as multipart or urlencoded form) and `GET /health`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Form, FromRequest, Multipart, Request, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{Instrument, debug, error, info, info_span};
use uuid::Uuid;

use crate::error::InputError;
use crate::ingest::{UploadedFile, resolve_content};
use crate::pipeline::classifier::Classifier;
use crate::pipeline::types::ClassificationResult;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<Classifier>,
}

/// Build the router with CORS and the upload size limit applied.
pub fn app_routes(classifier: Arc<Classifier>, max_upload_bytes: usize) -> Router {
    let state = AppState { classifier };

    Router::new()
        .route("/health", get(health))
        .route("/process", post(process_email))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
}

// ── Errors ──────────────────────────────────────────────────────────────

/// Errors surfaced to HTTP callers.
#[derive(Debug)]
pub enum ApiError {
    /// Bad input, 400 with the message in `detail`.
    Input(InputError),
    /// Worker failure, 500.
    Internal(String),
}

impl From<InputError> for ApiError {
    fn from(e: InputError) -> Self {
        Self::Input(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::Input(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            Self::Internal(reason) => {
                error!(reason = %reason, "Request failed internally");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "email-triage",
        "model": state.classifier.model_name(),
    }))
}

// ── Process ─────────────────────────────────────────────────────────────

async fn process_email(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<ClassificationResult>, ApiError> {
    let request_id = Uuid::new_v4();
    let span = info_span!("process", %request_id);

    async move {
        let (file, text) = read_input(request, &state).await?;

        info!(
            filename = file.as_ref().map(|f| f.filename.as_str()).unwrap_or("-"),
            has_text = text.is_some(),
            "Email received"
        );

        // PDF extraction is CPU-bound.
        let resolved = tokio::task::spawn_blocking(move || resolve_content(file, text))
            .await
            .map_err(|e| ApiError::Internal(format!("content extraction task failed: {e}")))?
            .inspect_err(|e| debug!(error = %e, "Rejected input"))?;

        let result = state
            .classifier
            .classify(&resolved.text, resolved.filename)
            .await?;

        Ok::<_, ApiError>(Json(result))
    }
    .instrument(span)
    .await
}

/// Dispatch on the body's content type. Bodies that are not forms carry no
/// input.
async fn read_input(
    request: Request,
    state: &AppState,
) -> Result<(Option<UploadedFile>, Option<String>), InputError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| InputError::InvalidUpload(e.to_string()))?;
        read_multipart(multipart).await
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(mut fields) = Form::<HashMap<String, String>>::from_request(request, state)
            .await
            .map_err(|e| InputError::InvalidUpload(e.to_string()))?;
        Ok((None, fields.remove("text")))
    } else {
        debug!(content_type = %content_type, "Request body is not a form");
        Ok((None, None))
    }
}

/// Pull the `file` and `text` parts out of the form. Other parts are ignored.
async fn read_multipart(
    mut multipart: Multipart,
) -> Result<(Option<UploadedFile>, Option<String>), InputError> {
    let mut file = None;
    let mut text = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| InputError::InvalidUpload(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| InputError::InvalidUpload(e.to_string()))?;
                // Browsers send an empty, unnamed part when no file was picked.
                if filename.as_deref().unwrap_or("").is_empty() && bytes.is_empty() {
                    continue;
                }
                file = Some(UploadedFile::new(filename, bytes.to_vec()));
            }
            Some("text") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| InputError::InvalidUpload(e.to_string()))?;
                text = Some(value);
            }
            _ => {}
        }
    }

    Ok((file, text))
}
