use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::Response;
use serde_json::Value;

use super::search::transport;
use crate::error::ProxyError;
use crate::state::AppState;

/// `POST /api/gemini-proxy`: forward the caller's JSON body to the
/// generative AI endpoint and relay the reply unchanged.
pub async fn gemini_proxy(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Response, ProxyError> {
    let config = &state.config;
    let Some(key) = &config.gemini_api_key else {
        tracing::error!("AI proxy called without GEMINI_API_KEY");
        return Err(ProxyError::ServerConfiguration(
            "AI API key is not configured".into(),
        ));
    };

    let upstream = state
        .client
        .post(&config.gemini_url)
        .query(&[("key", key.as_str())])
        .json(&body)
        .send()
        .await
        .map_err(|e| transport("gemini", e))?;

    let status = upstream.status();
    let content_type = upstream.headers().get(CONTENT_TYPE).cloned();
    let bytes = upstream.bytes().await.map_err(|e| transport("gemini", e))?;
    if status.is_success() {
        tracing::debug!(bytes = bytes.len(), "AI request proxied");
    } else {
        tracing::warn!(status = status.as_u16(), "AI API returned an error");
    }

    let mut response = Response::builder().status(status);
    if let Some(content_type) = content_type {
        response = response.header(CONTENT_TYPE, content_type);
    }
    response
        .body(Body::from(bytes))
        .map_err(|e| ProxyError::Transport(e.to_string()))
}
