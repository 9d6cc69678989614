//! HTTP gateway.
//!
//! Masters accept `POST /upload` and serve `GET /{id}`; slaves only serve.
//! Handlers talk to the store through the [`Store`] trait.

use std::io::Cursor;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Path, Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use picostore::Store;
use serde::Serialize;
use tower::ServiceExt;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;

use crate::config::{NodeMode, DEFAULT_MAX_UPLOAD_BYTES};
use crate::error::ApiError;

/// Header carrying the upload secret, as an alternative to the form field.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Form field carrying the upload secret.
pub const API_KEY_FIELD: &str = "apiKey";

/// Form field carrying the file.
pub const FILE_FIELD: &str = "file";

/// Shared state for web handlers
#[derive(Clone)]
pub struct WebState {
    pub store: Arc<dyn Store>,
    pub mode: NodeMode,
    pub max_upload_bytes: usize,
}

impl WebState {
    pub fn new(store: Arc<dyn Store>, mode: NodeMode) -> Self {
        Self {
            store,
            mode,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    status: &'static str,
    file: String,
}

struct UploadedFile {
    bytes: Bytes,
    mime_type: Option<String>,
}

pub fn router(state: WebState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/{id}", get(download));

    if state.mode.is_master() {
        router = router.route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(state.max_upload_bytes)),
        );
    }

    router
        .layer(cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([Method::POST])
        .allow_headers([header::ORIGIN])
        .expose_headers([header::CONTENT_LENGTH])
        .allow_credentials(true)
}

async fn health(State(state): State<WebState>) -> Result<Json<serde_json::Value>, ApiError> {
    let stats = state.store.stats()?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "mode": state.mode.name(),
        "version": env!("CARGO_PKG_VERSION"),
        "files": stats,
    })))
}

/// Serve a stored file by id.
///
/// Range, `If-Modified-Since` and friends are handled by [`ServeFile`]; the
/// content type comes from the recorded mime type when there is one.
#[tracing::instrument(name = "http.download", skip(state, request))]
async fn download(
    State(state): State<WebState>,
    Path(id): Path<String>,
    request: Request,
) -> Result<Response, ApiError> {
    let descriptor = state.store.describe(&id)?;
    let path = state.store.file_path(&id)?;

    let recorded = descriptor
        .mime_type
        .as_deref()
        .and_then(|m| m.parse::<mime_guess::Mime>().ok());
    let service = match recorded {
        Some(mime) => ServeFile::new_with_mime(&path, &mime),
        // guesses from the path, then application/octet-stream
        None => ServeFile::new(&path),
    };

    let response = service
        .oneshot(request)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    if response.status() == StatusCode::NOT_FOUND {
        // catalog replicated ahead of the bytes
        tracing::warn!(%id, path = %path.display(), "catalog entry without file");
        return Err(ApiError::NotFound);
    }

    Ok(response.map(Body::new))
}

/// Accept a multipart upload and hand the file to the store.
///
/// The secret may come from the `apiKey` form field or the `X-Api-Key`
/// header; the form field wins. A body that is not multipart is treated as
/// an empty form, so a missing secret still answers 401 before anything else.
#[tracing::instrument(name = "http.upload", skip_all)]
async fn upload(
    State(state): State<WebState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let NodeMode::Master { upload_key } = &state.mode else {
        return Err(ApiError::NotFound);
    };

    let header_key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let (form_key, file) = match multipart {
        Ok(multipart) => read_form(multipart).await?,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "upload body is not multipart");
            (None, None)
        }
    };

    let supplied = form_key.or(header_key).unwrap_or_default();
    if !constant_time_eq(&supplied, upload_key) {
        return Err(ApiError::Unauthorized("Api key is required"));
    }

    let Some(file) = file else {
        return Err(ApiError::BadRequest("File is required".to_string()));
    };

    let size = file.bytes.len();
    let store = state.store.clone();
    let id = tokio::task::spawn_blocking(move || {
        store.store_file_as(&mut Cursor::new(file.bytes), file.mime_type.as_deref())
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    tracing::info!(%id, size, "file uploaded");

    Ok(Json(UploadResponse {
        status: "ok",
        file: id.into_inner(),
    })
    .into_response())
}

async fn read_form(mut multipart: Multipart) -> Result<(Option<String>, Option<UploadedFile>), ApiError> {
    let mut api_key = None;
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(ApiError::Multipart)?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(API_KEY_FIELD) => {
                let value = field
                    .text()
                    .await
                    .map_err(ApiError::Multipart)?;
                api_key = Some(value);
            }
            Some(FILE_FIELD) if file.is_none() => {
                let mime_type = field
                    .content_type()
                    .map(str::to_owned)
                    .or_else(|| {
                        field
                            .file_name()
                            .and_then(|name| mime_guess::from_path(name).first())
                            .map(|m| m.to_string())
                    });
                let bytes = field
                    .bytes()
                    .await
                    .map_err(ApiError::Multipart)?;
                file = Some(UploadedFile { bytes, mime_type });
            }
            _ => {}
        }
    }

    Ok((api_key, file))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
