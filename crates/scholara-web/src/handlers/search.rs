use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};

use crate::error::{ProxyError, body_details};
use crate::models::{SearchParams, SearchResponse, UpstreamSearch};
use crate::state::AppState;

/// `GET /api/search-proxy?query=`: forward to the web search API and
/// reshape its items.
pub async fn search_proxy(
    State(state): State<Arc<AppState>>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchResponse>, ProxyError> {
    let Query(params) = params.map_err(|e| ProxyError::Validation(e.body_text()))?;
    let query = params
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ProxyError::Validation("Query parameter is required".into()))?;

    let config = &state.config;
    let (Some(key), Some(cx)) = (&config.google_search_api_key, &config.google_cse_id) else {
        tracing::error!("search proxy called without GOOGLE_SEARCH_API_KEY/GOOGLE_CSE_ID");
        return Err(ProxyError::ServerConfiguration(
            "Search API key or engine ID is not configured".into(),
        ));
    };

    let response = state
        .client
        .get(&config.search_url)
        .query(&[("key", key.as_str()), ("cx", cx.as_str()), ("q", query)])
        .send()
        .await
        .map_err(|e| transport("search", e))?;

    let status = response.status();
    let body = response.bytes().await.map_err(|e| transport("search", e))?;
    if !status.is_success() {
        tracing::warn!(status = status.as_u16(), "search API returned an error");
        return Err(ProxyError::Upstream {
            status,
            error: "Search API error",
            details: body_details(&body),
        });
    }

    let upstream: UpstreamSearch = serde_json::from_slice(&body)
        .map_err(|e| ProxyError::Transport(format!("invalid search API response: {e}")))?;
    let results: Vec<_> = upstream.items.into_iter().map(Into::into).collect();
    tracing::debug!(results = results.len(), "search proxied");
    Ok(Json(SearchResponse { results }))
}

pub(crate) fn transport(service: &str, err: reqwest::Error) -> ProxyError {
    tracing::error!(service, error = %err, "upstream request failed");
    ProxyError::Transport(err.to_string())
}
