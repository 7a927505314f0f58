use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod backend;
pub mod config_file;
pub mod contributors;

// Re-export for convenience
pub use backend::{BackendError, PdfBackend};
pub use contributors::{SortOption, rank_contributors};

/// Lowest and highest accepted star rating.
pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("unknown sort option: {0}")]
    UnknownSortOption(String),
    #[error("unknown role: {0}")]
    UnknownRole(String),
}

/// A category/tag used to classify uploaded resources.
///
/// `value` is the stable key used by filters and is unique across the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub value: String,
    pub label: String,
    pub category: String,
}

impl Subject {
    pub fn new(
        value: impl Into<String>,
        label: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            category: category.into(),
        }
    }

    /// Trim every field and reject blanks.
    pub fn normalized(self) -> Result<Self, CoreError> {
        let value = required("value", &self.value)?;
        let label = required("label", &self.label)?;
        let category = required("category", &self.category)?;
        Ok(Self {
            value,
            label,
            category,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(CoreError::UnknownRole(other.to_string())),
        }
    }
}

/// A registered account. The API token is kept by the store and never
/// serialized with the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    pub profile_picture: Option<String>,
    pub role: Role,
    pub created_at: u64,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Fields for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: Option<String>,
    pub email: String,
    pub profile_picture: Option<String>,
    pub role: Role,
}

/// A user ranked by the number of resources they have uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contributor {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub profile_picture: Option<String>,
    pub contribution_count: u64,
}

/// An uploaded study resource including its extracted text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub subject: String,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub text: String,
    pub uploader_id: String,
    pub created_at: u64,
}

impl Resource {
    /// Listing view of this resource with the given rating aggregate.
    pub fn summary(&self, ratings: RatingSummary) -> ResourceSummary {
        ResourceSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            subject: self.subject.clone(),
            file_name: self.file_name.clone(),
            mime_type: self.mime_type.clone(),
            size_bytes: self.size_bytes,
            word_count: word_count(&self.text),
            uploader_id: self.uploader_id.clone(),
            created_at: self.created_at,
            average_rating: ratings.average_rating,
            rating_count: ratings.rating_count,
        }
    }
}

/// Fields for storing a new resource.
#[derive(Debug, Clone)]
pub struct NewResource {
    pub title: String,
    pub description: Option<String>,
    pub subject: String,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub text: String,
    pub uploader_id: String,
}

/// Listing view of a resource: no text body, plus rating aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSummary {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub subject: String,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub word_count: usize,
    pub uploader_id: String,
    pub created_at: u64,
    pub average_rating: Option<f64>,
    pub rating_count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub average_rating: Option<f64>,
    pub rating_count: u64,
}

/// Count whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Check a star rating is within `MIN_RATING..=MAX_RATING`.
pub fn validate_rating(rating: i64) -> Result<u8, CoreError> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(rating as u8)
    } else {
        Err(CoreError::Validation(format!(
            "rating must be between {MIN_RATING} and {MAX_RATING}"
        )))
    }
}

/// Trim and lowercase an e-mail address, rejecting obviously malformed input.
pub fn normalize_email(email: &str) -> Result<String, CoreError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(CoreError::Validation("a valid email is required".into()))
    }
}

/// Trim an optional free-text field; blank becomes `None`.
pub fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn required(field: &str, value: &str) -> Result<String, CoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(CoreError::Validation(format!("{field} is required")))
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_normalized_trims_fields() {
        let subject = Subject::new("  cs101 ", " Intro to CS", "Computer Science ")
            .normalized()
            .unwrap();
        assert_eq!(subject, Subject::new("cs101", "Intro to CS", "Computer Science"));
    }

    #[test]
    fn subject_normalized_rejects_blank_value() {
        let err = Subject::new("   ", "Label", "Cat").normalized().unwrap_err();
        assert!(err.to_string().contains("value"));
    }

    #[test]
    fn rating_bounds() {
        assert_eq!(validate_rating(1).unwrap(), 1);
        assert_eq!(validate_rating(5).unwrap(), 5);
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
    }

    #[test]
    fn email_normalization() {
        assert_eq!(
            normalize_email("  Ada@Example.ORG ").unwrap(),
            "ada@example.org"
        );
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@example.org").is_err());
        assert!(normalize_email("a b@example.org").is_err());
    }

    #[test]
    fn role_round_trip() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(Role::User.to_string(), "user");
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn user_serializes_camel_case_without_token() {
        let user = User {
            id: "u1".into(),
            name: Some("Ada".into()),
            email: "ada@example.org".into(),
            profile_picture: None,
            role: Role::Admin,
            created_at: 10,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["profilePicture"], serde_json::Value::Null);
        assert_eq!(json["role"], "admin");
        assert!(json.get("token").is_none());
    }

    #[test]
    fn word_count_ignores_extra_whitespace() {
        assert_eq!(word_count("  lecture\tnotes\n\nweek 3 "), 4);
        assert_eq!(word_count(""), 0);
    }
}
