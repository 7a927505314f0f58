use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use scholara_core::Subject;

use crate::auth::AdminUser;
use crate::error::ApiError;
use crate::models::CreateSubjectRequest;
use crate::state::AppState;

/// `GET /api/subjects`: every subject in insertion order.
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Subject>>, ApiError> {
    let subjects = state
        .store()?
        .subjects()
        .map_err(|e| ApiError::internal("Server error fetching subjects", &e))?;
    Ok(Json(subjects))
}

/// `POST /api/subjects`: admin-only creation.
pub async fn create(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    payload: Result<Json<CreateSubjectRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Subject>), ApiError> {
    let Json(req) = payload?;
    let subject = Subject::new(req.value, req.label, req.category).normalized()?;
    state.store()?.add_subject(&subject)?;
    tracing::info!(subject = %subject.value, admin = %admin.id, "subject created");
    Ok((StatusCode::CREATED, Json(subject)))
}
