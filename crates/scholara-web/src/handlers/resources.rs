use std::sync::Arc;

use axum::Json;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use scholara_core::{
    NewResource, RatingSummary, Resource, ResourceSummary, optional_text, validate_rating,
};
use scholara_ingest::{IngestError, effective_mime};

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::models::{RateRequest, ResourceParams};
use crate::state::AppState;
use crate::upload::parse_resource_form;

/// `POST /api/resources`: accept an upload, extract its text, store it.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<ResourceSummary>), ApiError> {
    let form = parse_resource_form(multipart?, state.config.max_upload_bytes).await?;

    if !state.store()?.subject_exists(&form.subject)? {
        return Err(ApiError::bad_request(format!(
            "Unknown subject '{}'",
            form.subject
        )));
    }

    let file = form.file;
    let mime = effective_mime(file.content_type.as_deref(), &file.filename, &file.data)
        .ok_or_else(|| {
            IngestError::UnsupportedFileType(
                file.content_type
                    .clone()
                    .unwrap_or_else(|| "application/octet-stream".into()),
            )
        })?;

    let size_bytes = file.data.len() as u64;
    let data = file.data;
    let extract_mime = mime.clone();
    // PDF parsing is CPU-bound
    let extracted = tokio::task::spawn_blocking(move || {
        scholara_ingest::extract_text(&data, &extract_mime)
    })
    .await
    .map_err(|e| ApiError::internal("Text extraction failed", &e))??;

    let new_resource = NewResource {
        title: form.title,
        description: form.description,
        subject: form.subject,
        file_name: file.filename,
        mime_type: mime,
        size_bytes,
        text: extracted.text,
        uploader_id: user.id,
    };
    let resource = state.store()?.add_resource(&new_resource)?;
    tracing::info!(
        resource = %resource.id,
        subject = %resource.subject,
        mime_type = %resource.mime_type,
        size_bytes,
        "resource uploaded"
    );
    Ok((
        StatusCode::CREATED,
        Json(resource.summary(RatingSummary::default())),
    ))
}

/// `GET /api/resources?subject=&q=`
pub async fn list(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ResourceParams>, QueryRejection>,
) -> Result<Json<Vec<ResourceSummary>>, ApiError> {
    let Query(params) = params?;
    let subject = optional_text(params.subject.as_deref());
    let query = optional_text(params.q.as_deref());
    let resources = state
        .store()?
        .resources(subject.as_deref(), query.as_deref())?;
    Ok(Json(resources))
}

/// `GET /api/resources/{id}`
pub async fn detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Resource>, ApiError> {
    state
        .store()?
        .resource(&id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Resource not found"))
}

/// `POST /api/resources/{id}/ratings`: record or replace the caller's rating.
pub async fn rate(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<RateRequest>, JsonRejection>,
) -> Result<Json<RatingSummary>, ApiError> {
    let Json(req) = payload?;
    let rating = validate_rating(req.rating)?;
    let summary = state.store()?.rate_resource(&id, &user.id, rating)?;
    Ok(Json(summary))
}
