use std::sync::Arc;

use axum::Json;
use axum::extract::State;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::models::MeResponse;
use crate::state::AppState;

/// `GET /api/user/me`
pub async fn me(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<MeResponse>, ApiError> {
    let contribution_count = state.store()?.contribution_count(&user.id)?;
    Ok(Json(MeResponse {
        user,
        contribution_count,
    }))
}
