//! API error types and their outward mapping.
//!
//! Every failure is translated at the handler boundary into one response;
//! nothing propagates further and nothing is retried. Mutation failures
//! answer with the JSON message codes of the API; fetch-path failures
//! answer with the localized HTML page.

use crate::fetch::FetchError;
use crate::lifecycle::{CreateError, DeleteError, ResolveError};
use crate::pages::{PageCode, render_error_page};
use axum::Json;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// JSON body for mutation failures.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Stable message code for programmatic handling.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("registration already exists: {0}")]
    AlreadyExists(String),

    #[error("create failed: {0}")]
    CreateFailed(String),

    #[error("delete failed: {0}")]
    DeleteFailed(String),

    #[error("registration not found: {0}")]
    NotFound(String),

    #[error("registration expired: {0}")]
    Expired(String),

    #[error("upstream resource unavailable: {0}")]
    UpstreamNotFound(String),

    #[error("download failed: {0}")]
    DownloadError(String),
}

impl ApiError {
    /// Get the outward message code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::CreateFailed(_) => "CREATE_ERROR",
            Self::DeleteFailed(_) => "DELETE_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Expired(_) => "EXPIRED",
            Self::UpstreamNotFound(_) => "NOT_FOUND",
            Self::DownloadError(_) => "DOWNLOAD_ERROR",
        }
    }

    /// Get the HTTP status code for this error.
    ///
    /// Expired, missing, and upstream-missing all collapse into 404
    /// ("resource unavailable"); every other failure is a 400 ("request
    /// could not be completed"). The distinction lives in the body only.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) | Self::Expired(_) | Self::UpstreamNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::AlreadyExists(_)
            | Self::CreateFailed(_)
            | Self::DeleteFailed(_)
            | Self::DownloadError(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// The localized page code, for errors rendered on the fetch path.
    fn page_code(&self) -> Option<PageCode> {
        match self {
            Self::NotFound(_) | Self::UpstreamNotFound(_) => Some(PageCode::NotFound),
            Self::Expired(_) => Some(PageCode::Expired),
            Self::DownloadError(_) => Some(PageCode::DownloadError),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self.page_code() {
            Some(code) => (
                status,
                [(CONTENT_TYPE, "text/html; charset=utf-8")],
                render_error_page(code),
            )
                .into_response(),
            None => {
                let body = ErrorResponse {
                    message: self.code().to_string(),
                };
                (status, Json(body)).into_response()
            }
        }
    }
}

impl From<CreateError> for ApiError {
    fn from(e: CreateError) -> Self {
        match e {
            CreateError::AlreadyExists(id) => Self::AlreadyExists(id),
            CreateError::Failed(reason) => Self::CreateFailed(reason),
        }
    }
}

impl From<DeleteError> for ApiError {
    fn from(e: DeleteError) -> Self {
        Self::DeleteFailed(e.to_string())
    }
}

impl From<ResolveError> for ApiError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::NotFound(id) => Self::NotFound(id),
            ResolveError::Expired(id) => Self::Expired(id),
            // A local storage fault while initiating the read collapses
            // into the download-error class, like every other local fault.
            ResolveError::Storage(e) => Self::DownloadError(e.to_string()),
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::UpstreamStatus(status) => Self::UpstreamNotFound(status.to_string()),
            FetchError::Download(reason) => Self::DownloadError(reason),
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_class_maps_to_404() {
        for e in [
            ApiError::NotFound("x".into()),
            ApiError::Expired("x".into()),
            ApiError::UpstreamNotFound("500".into()),
        ] {
            assert_eq!(e.status_code(), StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn incomplete_class_maps_to_400() {
        for e in [
            ApiError::AlreadyExists("x".into()),
            ApiError::CreateFailed("x".into()),
            ApiError::DeleteFailed("x".into()),
            ApiError::DownloadError("x".into()),
        ] {
            assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn fetch_errors_render_pages_and_mutations_render_json() {
        assert!(ApiError::Expired("x".into()).page_code().is_some());
        assert!(ApiError::DownloadError("x".into()).page_code().is_some());
        assert!(ApiError::AlreadyExists("x".into()).page_code().is_none());
        assert!(ApiError::DeleteFailed("x".into()).page_code().is_none());
    }
}
