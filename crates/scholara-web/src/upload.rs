use axum::extract::Multipart;
use axum::extract::multipart::{Field, MultipartError};
use axum::http::StatusCode;

use crate::error::ApiError;

/// An uploaded file with its data and metadata.
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Parsed form fields from the resource upload form.
pub struct ResourceForm {
    pub file: UploadedFile,
    pub title: String,
    pub subject: String,
    pub description: Option<String>,
}

/// Parse the resource upload form.
///
/// Files larger than `max_bytes` are rejected with `413`. Unknown fields
/// are drained and ignored.
pub async fn parse_resource_form(
    mut multipart: Multipart,
    max_bytes: usize,
) -> Result<ResourceForm, ApiError> {
    let mut file: Option<UploadedFile> = None;
    let mut title: Option<String> = None;
    let mut subject: Option<String> = None;
    let mut description: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(field_error)? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = read_limited(field, max_bytes).await?;
                file = Some(UploadedFile {
                    filename,
                    content_type,
                    data,
                });
            }
            "title" => title = Some(field.text().await.map_err(field_error)?),
            "subject" => subject = Some(field.text().await.map_err(field_error)?),
            "description" => description = Some(field.text().await.map_err(field_error)?),
            _ => {
                // Ignore unknown fields
                field.bytes().await.map_err(field_error)?;
            }
        }
    }

    let file = file.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    if file.data.is_empty() {
        return Err(ApiError::bad_request("Uploaded file is empty"));
    }
    let title = scholara_core::optional_text(title.as_deref())
        .ok_or_else(|| ApiError::bad_request("title is required"))?;
    let subject = scholara_core::optional_text(subject.as_deref())
        .ok_or_else(|| ApiError::bad_request("subject is required"))?;

    Ok(ResourceForm {
        file,
        title,
        subject,
        description: scholara_core::optional_text(description.as_deref()),
    })
}

async fn read_limited(mut field: Field<'_>, max_bytes: usize) -> Result<Vec<u8>, ApiError> {
    let mut data = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(field_error)? {
        if data.len() + chunk.len() > max_bytes {
            return Err(too_large(max_bytes));
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

fn too_large(max_bytes: usize) -> ApiError {
    ApiError::new(
        StatusCode::PAYLOAD_TOO_LARGE,
        format!("File exceeds the {} MB upload limit", max_bytes / (1024 * 1024)),
    )
}

fn field_error(err: MultipartError) -> ApiError {
    ApiError::new(err.status(), format!("Failed to read form field: {}", err.body_text()))
}
