use scholara_core::User;
use serde::{Deserialize, Serialize};

// ── Requests ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateSubjectRequest {
    pub value: String,
    pub label: String,
    pub category: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: String,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupAdminRequest {
    pub name: Option<String>,
    pub email: String,
    pub setup_key: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContributorParams {
    pub search: Option<String>,
    pub sort: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResourceParams {
    pub subject: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub rating: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
}

// ── Responses ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user: User,
    pub contribution_count: u64,
}

/// One search hit, reshaped from the upstream item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub url: String,
    pub source_title: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

// ── Upstream search payload ─────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct UpstreamSearch {
    #[serde(default)]
    pub items: Vec<UpstreamItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamItem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub display_link: Option<String>,
}

impl From<UpstreamItem> for SearchResult {
    fn from(item: UpstreamItem) -> Self {
        SearchResult {
            title: item.title.unwrap_or_default(),
            snippet: item.snippet.unwrap_or_default(),
            url: item.link.unwrap_or_default(),
            source_title: item.display_link.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_items_reshape_with_blank_defaults() {
        let upstream: UpstreamSearch = serde_json::from_str(
            r#"{"items":[
                {"title":"Entropy","snippet":"s","link":"https://a","displayLink":"a.org","kind":"x"},
                {"title":"Only title"}
            ]}"#,
        )
        .unwrap();
        let results: Vec<SearchResult> = upstream.items.into_iter().map(Into::into).collect();
        assert_eq!(results[0].url, "https://a");
        assert_eq!(results[0].source_title, "a.org");
        assert_eq!(results[1].snippet, "");
        assert_eq!(results[1].url, "");
    }

    #[test]
    fn missing_items_is_empty() {
        let upstream: UpstreamSearch =
            serde_json::from_str(r#"{"searchInformation":{}}"#).unwrap();
        assert!(upstream.items.is_empty());
    }

    #[test]
    fn setup_key_is_camel_case() {
        let req: SetupAdminRequest =
            serde_json::from_str(r#"{"email":"a@b.c","setupKey":"k"}"#).unwrap();
        assert_eq!(req.setup_key, "k");
        assert!(req.name.is_none());
    }
}
