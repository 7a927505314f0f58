//! Error envelopes.
//!
//! Application routes fail with [`ApiError`], rendered by the
//! [`error_envelope`] middleware as `{message, stack}`. Proxy routes fail
//! with [`ProxyError`], rendered locally as `{error, details}`.

use std::any::Any;
use std::error::Error as StdError;
use std::sync::Arc;

use axum::Json;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

use scholara_core::CoreError;
use scholara_ingest::IngestError;
use scholara_store::StoreError;

use crate::state::AppState;

/// Error details left in response extensions for [`error_envelope`].
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub message: String,
    /// Cause chain, outermost first.
    pub causes: Vec<String>,
}

impl ErrorReport {
    fn stack(&self) -> String {
        let mut stack = format!("Error: {}", self.message);
        for cause in &self.causes {
            stack.push_str("\n    caused by: ");
            stack.push_str(cause);
        }
        stack
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub stack: Option<String>,
}

/// A failed request on an application route.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    report: ErrorReport,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            report: ErrorReport {
                message: message.into(),
                causes: Vec::new(),
            },
        }
    }

    /// Attach `err` and its sources as the cause chain.
    pub fn with_source(mut self, err: &(dyn StdError + 'static)) -> Self {
        let mut current = Some(err);
        while let Some(e) = current {
            self.report.causes.push(e.to_string());
            current = e.source();
        }
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.report.message
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn server_configuration(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn internal_message(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// A 500 with a generic message and `err` as the cause.
    pub fn internal(message: impl Into<String>, err: &(dyn StdError + 'static)) -> Self {
        Self::internal_message(message).with_source(err)
    }
}

/// The default success status reaching the error stage means the failing
/// code never chose a status; report it as a server error.
pub fn resolve_status(current: StatusCode) -> StatusCode {
    if current == StatusCode::OK {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        current
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = resolve_status(self.status);
        // Stack withheld until the middleware knows the environment
        let body = ErrorBody {
            message: self.report.message.clone(),
            stack: None,
        };
        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(self.report);
        response
    }
}

/// Render any response carrying an [`ErrorReport`] as `{message, stack}`.
///
/// If the status is still `200` when an error arrives here it becomes
/// `500`; any other status already set is preserved. `stack` is `null` in
/// production.
pub async fn error_envelope(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    render_error(response, state.config.environment.is_production())
}

pub fn render_error(mut response: Response, production: bool) -> Response {
    let Some(report) = response.extensions_mut().remove::<ErrorReport>() else {
        return response;
    };
    let status = resolve_status(response.status());
    if status.is_server_error() {
        tracing::error!(status = status.as_u16(), error = %report.stack(), "request failed");
    } else {
        tracing::debug!(status = status.as_u16(), message = %report.message, "request rejected");
    }
    let body = ErrorBody {
        stack: (!production).then(|| report.stack()),
        message: report.message,
    };
    (status, Json(body)).into_response()
}

/// Response for a panicking handler, rendered by [`error_envelope`].
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    let mut error = ApiError::internal_message("Internal server error");
    error.report.causes.push(format!("panic: {detail}"));
    error.into_response()
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::DuplicateSubject(_)
            | StoreError::DuplicateEmail(_)
            | StoreError::AdminExists => StatusCode::CONFLICT,
            StoreError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            StoreError::UnknownSubject(_) => StatusCode::BAD_REQUEST,
            StoreError::Database(_) => {
                return ApiError::internal("Internal server error", &err);
            }
        };
        ApiError::new(status, err.to_string())
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::UnsupportedFileType(mime) => ApiError::new(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                format!("Unsupported file type: {mime}. Upload a PDF, DOCX, or text file."),
            ),
            other => ApiError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "Could not extract text from the uploaded file",
            )
            .with_source(&other),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        if matches!(err, CoreError::UnknownRole(_)) {
            ApiError::internal("Internal server error", &err)
        } else {
            ApiError::bad_request(err.to_string())
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            // Well-formed JSON of the wrong shape is invalid input
            JsonRejection::JsonDataError(e) => ApiError::bad_request(e.body_text()),
            other => ApiError::new(other.status(), other.body_text()),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::new(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::new(rejection.status(), rejection.body_text())
    }
}

// ── Proxy errors ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ProxyErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// A failed proxy request, rendered as `{error, details}`.
#[derive(Debug)]
pub enum ProxyError {
    /// Missing or malformed caller input; no outbound call was made.
    Validation(String),
    /// Server-held credentials are missing.
    ServerConfiguration(String),
    /// The upstream answered with a non-success status.
    Upstream {
        status: StatusCode,
        error: &'static str,
        details: Value,
    },
    /// The upstream could not be reached or answered garbage.
    Transport(String),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ProxyError::Validation(message) => (
                StatusCode::BAD_REQUEST,
                ProxyErrorBody {
                    error: message,
                    details: None,
                },
            ),
            ProxyError::ServerConfiguration(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ProxyErrorBody {
                    error: "Server configuration error".into(),
                    details: Some(Value::String(details)),
                },
            ),
            ProxyError::Upstream {
                status,
                error,
                details,
            } => (
                status,
                ProxyErrorBody {
                    error: error.into(),
                    details: Some(details),
                },
            ),
            ProxyError::Transport(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ProxyErrorBody {
                    error: "Failed to reach upstream service".into(),
                    details: Some(Value::String(details)),
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

/// Upstream body as JSON when it parses, otherwise as a string.
pub fn body_details(body: &[u8]) -> Value {
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn resolve_status_promotes_default_success_only() {
        assert_eq!(
            resolve_status(StatusCode::OK),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(resolve_status(StatusCode::NOT_FOUND), StatusCode::NOT_FOUND);
        assert_eq!(resolve_status(StatusCode::CREATED), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn render_includes_stack_outside_production() {
        let err = std::io::Error::other("disk on fire");
        let response = ApiError::internal("Server error fetching subjects", &err).into_response();
        let rendered = render_error(response, false);
        assert_eq!(rendered.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(rendered).await;
        assert_eq!(json["message"], "Server error fetching subjects");
        assert!(json["stack"].as_str().unwrap().contains("disk on fire"));
    }

    #[tokio::test]
    async fn render_hides_stack_in_production() {
        let response = ApiError::not_found("Resource not found").into_response();
        let rendered = render_error(response, true);
        assert_eq!(rendered.status(), StatusCode::NOT_FOUND);
        let json = body_json(rendered).await;
        assert_eq!(json["message"], "Resource not found");
        assert!(json["stack"].is_null());
    }

    #[tokio::test]
    async fn overwritten_success_status_becomes_500() {
        let response = (StatusCode::OK, ApiError::bad_request("boom")).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let rendered = render_error(response, false);
        assert_eq!(rendered.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn responses_without_report_pass_through() {
        let response = (StatusCode::ACCEPTED, "fine").into_response();
        assert_eq!(render_error(response, false).status(), StatusCode::ACCEPTED);
    }

    #[test]
    fn store_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(StoreError::DuplicateSubject("x".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(StoreError::ResourceNotFound("x".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(StoreError::UnknownSubject("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn unsupported_file_type_is_415() {
        let err = ApiError::from(IngestError::UnsupportedFileType("image/png".into()));
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(err.message().contains("image/png"));
    }

    #[tokio::test]
    async fn upstream_error_relays_status_and_details() {
        let response = ProxyError::Upstream {
            status: StatusCode::FORBIDDEN,
            error: "Search API error",
            details: body_details(br#"{"error":{"code":403}}"#),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Search API error");
        assert_eq!(json["details"]["error"]["code"], 403);
    }

    #[test]
    fn non_json_upstream_body_becomes_string() {
        assert_eq!(body_details(b"<html>"), Value::String("<html>".into()));
    }
}
