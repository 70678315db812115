// src/models/category.rs

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const DEFAULT_COLOR: &str = "#6366F1";
pub const DEFAULT_ICON: &str = "📚";

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid slug pattern"));

/// A quiz category. `question_count` is derived from the catalog and
/// recomputed whenever the category's question set changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub question_count: usize,
}

/// DTO for creating a category.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 50), custom(function = validate_slug))]
    pub id: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "name & slug required"))]
    pub name: String,
    #[serde(default)]
    #[validate(custom(function = validate_slug))]
    pub slug: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(length(max = 20))]
    pub color: Option<String>,
    #[validate(length(max = 20))]
    pub icon: Option<String>,
}

/// DTO for updating a category. The id never changes.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(custom(function = validate_slug))]
    pub slug: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(length(max = 20))]
    pub color: Option<String>,
    #[validate(length(max = 20))]
    pub icon: Option<String>,
}

fn validate_slug(slug: &str) -> Result<(), validator::ValidationError> {
    if slug.is_empty() {
        return Err(validator::ValidationError::new("name & slug required"));
    }
    if slug.len() > 50 || !SLUG_RE.is_match(slug) {
        return Err(validator::ValidationError::new("invalid_slug"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_rules() {
        assert!(validate_slug("world-history").is_ok());
        assert!(validate_slug("science").is_ok());
        assert!(validate_slug("").is_err());
        assert!(validate_slug("World History").is_err());
        assert!(validate_slug("trailing-").is_err());
    }

    #[test]
    fn create_requires_name_and_slug() {
        let req: CreateCategoryRequest = serde_json::from_str(r#"{"name": "History"}"#).unwrap();
        assert!(req.validate().is_err());

        let req: CreateCategoryRequest =
            serde_json::from_str(r#"{"name": "History", "slug": "history"}"#).unwrap();
        assert!(req.validate().is_ok());
    }
}
