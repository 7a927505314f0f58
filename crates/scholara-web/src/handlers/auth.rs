use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use scholara_core::{NewUser, Role, normalize_email, optional_text};

use crate::error::ApiError;
use crate::models::{AuthResponse, RegisterRequest, SetupAdminRequest};
use crate::state::AppState;

/// `POST /api/auth/register`: create an account and issue its token.
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let Json(req) = payload?;
    let new_user = NewUser {
        name: optional_text(req.name.as_deref()),
        email: normalize_email(&req.email)?,
        profile_picture: optional_text(req.profile_picture.as_deref()),
        role: Role::User,
    };
    let (user, token) = state.store()?.create_user(&new_user)?;
    tracing::info!(user = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

/// `POST /api/auth/setup-admin`: one-time admin bootstrap guarded by
/// `ADMIN_SETUP_KEY`.
pub async fn setup_admin(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SetupAdminRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let Json(req) = payload?;
    let Some(expected) = state.config.admin_setup_key.as_deref() else {
        return Err(ApiError::server_configuration(
            "Admin setup is not configured on this server",
        ));
    };
    if !keys_match(expected, req.setup_key.trim()) {
        tracing::warn!("admin setup attempted with an invalid key");
        return Err(ApiError::forbidden("Invalid setup key"));
    }

    let new_user = NewUser {
        name: optional_text(req.name.as_deref()),
        email: normalize_email(&req.email)?,
        profile_picture: None,
        role: Role::Admin,
    };
    let (user, token) = state.store()?.setup_admin(&new_user)?;
    tracing::info!(user = %user.id, "admin account configured");
    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

/// Compare without short-circuiting on the first differing byte.
fn keys_match(expected: &str, given: &str) -> bool {
    let (a, b) = (expected.as_bytes(), given.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
