use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use scholara_core::{Contributor, SortOption, optional_text, rank_contributors};

use crate::error::ApiError;
use crate::models::ContributorParams;
use crate::state::AppState;

/// `GET /api/analytics/contributors?search=&sort=`
pub async fn contributors(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ContributorParams>, QueryRejection>,
) -> Result<Json<Vec<Contributor>>, ApiError> {
    let Query(params) = params?;
    let sort = match optional_text(params.sort.as_deref()) {
        Some(sort) => sort.parse::<SortOption>()?,
        None => SortOption::default(),
    };
    let search = optional_text(params.search.as_deref());

    let contributors = state.store()?.contributors()?;
    Ok(Json(rank_contributors(contributors, search.as_deref(), sort)))
}
