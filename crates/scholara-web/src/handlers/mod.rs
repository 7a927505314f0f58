pub mod analytics;
pub mod auth;
pub mod gemini;
pub mod resources;
pub mod search;
pub mod subjects;
pub mod user;

use axum::http::Uri;

use crate::error::ApiError;

/// Fallback for unmatched routes.
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("Not found - {}", uri.path()))
}
