//! Registration and proxied-fetch endpoints.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::Response;
use ferry_core::{NewRegistration, Registration};
use serde::Serialize;

/// Response for a successful create.
#[derive(Debug, Serialize)]
pub struct CreateResponse {
    pub message: &'static str,
    /// The stored record, echoed verbatim as confirmation.
    pub file: Registration,
}

/// Response for a successful delete.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: &'static str,
}

/// POST /file - register a remote file under an identifier.
pub async fn create_file(
    State(state): State<AppState>,
    Json(input): Json<NewRegistration>,
) -> ApiResult<Json<CreateResponse>> {
    let stored = state.lifecycle.create(input).await?;
    Ok(Json(CreateResponse {
        message: "File uploaded",
        file: stored,
    }))
}

/// DELETE /file/{id} - remove a registration.
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    state.lifecycle.delete(&id).await?;
    Ok(Json(DeleteResponse { message: "DELETED" }))
}

/// GET /file/{id} - fetch the registered upstream resource.
///
/// The upstream transfer is fully accumulated before the first response
/// byte is sent, so a mid-transfer failure still maps to a clean error
/// page instead of a truncated body.
pub async fn fetch_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let record = state.lifecycle.resolve_for_read(&id).await?;
    let fetched = state.fetcher.fetch(&record).await?;

    let mut builder = Response::builder().header(CONTENT_TYPE, fetched.content_type);
    if let Some(name) = fetched.download_name {
        builder = builder.header(
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{name}\""),
        );
    }

    builder
        .body(Body::from(fetched.body))
        .map_err(|e| crate::error::ApiError::DownloadError(e.to_string()))
}
