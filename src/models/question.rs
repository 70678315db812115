// src/models/question.rs

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use url::Url;
use validator::Validate;

/// Answering mode of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    /// Exactly one correct option.
    Single,
    /// One or more correct options.
    Multi,
}

/// Per-question difficulty. There is no "mixed" at item level; that only
/// exists as a session filter (see [`Difficulty::parse_filter`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Legacy compatibility shim for persisted/imported values.
    ///
    /// * `"med"` was the old spelling of medium.
    /// * `"max"` was exposed by an older admin UI and means hard.
    /// * Anything unknown or missing falls back to medium.
    pub fn normalize(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("easy") => Difficulty::Easy,
            Some("medium") | Some("med") => Difficulty::Medium,
            Some("hard") | Some("max") => Difficulty::Hard,
            _ => Difficulty::Medium,
        }
    }

    /// Parses a session-level filter. `None` means "no filter" (mixed).
    pub fn parse_filter(raw: Option<&str>) -> Option<Self> {
        match raw.map(str::trim) {
            None | Some("") | Some("mixed") => None,
            other => Some(Self::normalize(other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// Every deserialization path (request bodies, seed files, stored attempts)
/// goes through the normalization shim.
impl<'de> Deserialize<'de> for Difficulty {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(Difficulty::normalize(raw.as_deref()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: String,
    pub text: String,
}

/// A question as held by the catalog, including its answer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,

    pub text: String,

    #[serde(rename = "type")]
    pub question_type: QuestionType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    /// Canonical option order.
    pub options: Vec<QuestionOption>,

    /// Canonical correct option ids. Never sent to the quiz taker.
    #[serde(default)]
    pub correct_option_ids: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,

    #[serde(default)]
    pub difficulty: Difficulty,
}

impl Question {
    pub fn option(&self, id: &str) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.id == id)
    }

    /// Text of the option with `id`, or the id itself when it is unknown.
    pub fn option_text_or_id(&self, id: &str) -> String {
        self.option(id)
            .map(|o| o.text.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Checks the answer-key invariants: unique option ids, correct ids that
    /// reference real options, and a correct-count matching the type.
    pub fn check_answer_key(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for option in &self.options {
            if !seen.insert(option.id.as_str()) {
                return Err(format!("Duplicate option id '{}'", option.id));
            }
        }

        for id in &self.correct_option_ids {
            if !seen.contains(id.as_str()) {
                return Err(format!("Correct option '{}' is not an option", id));
            }
        }

        let distinct: HashSet<&str> = self.correct_option_ids.iter().map(String::as_str).collect();
        match self.question_type {
            QuestionType::Single if distinct.len() != 1 => Err(
                "A single-choice question needs exactly one correct option".to_string(),
            ),
            QuestionType::Multi if distinct.is_empty() => Err(
                "A multi-choice question needs at least one correct option".to_string(),
            ),
            _ => Ok(()),
        }
    }
}

/// DTO for sending a question to the quiz taker (no answer key, no explanation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub options: Vec<QuestionOption>,
}

impl PublicQuestion {
    /// Projects `question` with the given presentation order of its options.
    pub fn project(question: &Question, options: Vec<QuestionOption>) -> Self {
        Self {
            id: question.id.clone(),
            text: question.text.clone(),
            question_type: question.question_type,
            image_url: question.image_url.clone(),
            options,
        }
    }

    pub fn option(&self, id: &str) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.id == id)
    }
}

/// Option as submitted by the admin form. Ids are reassigned on create.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OptionInput {
    #[serde(default)]
    pub id: Option<String>,
    #[validate(length(min = 1, max = 500))]
    #[serde(default)]
    pub text: Option<String>,
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[validate(length(max = 500), custom(function = validate_url_string))]
    pub image_url: Option<String>,
    #[validate(length(min = 2, max = 10), nested)]
    pub options: Vec<OptionInput>,
    #[serde(default)]
    pub correct_option_ids: Vec<String>,
    #[validate(length(max = 2000))]
    pub explanation: Option<String>,
    pub difficulty: Option<String>,
}

/// DTO for updating a question. Fields are optional.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub text: Option<String>,
    #[serde(rename = "type")]
    pub question_type: Option<QuestionType>,
    #[validate(length(max = 500), custom(function = validate_url_string))]
    pub image_url: Option<String>,
    #[validate(length(min = 2, max = 10), nested)]
    pub options: Option<Vec<OptionInput>>,
    pub correct_option_ids: Option<Vec<String>>,
    #[validate(length(max = 2000))]
    pub explanation: Option<String>,
    pub difficulty: Option<String>,
}

/// Validates that a string is a correctly formatted URL.
fn validate_url_string(url: &str) -> Result<(), validator::ValidationError> {
    if Url::parse(url).is_err() {
        return Err(validator::ValidationError::new("invalid_url"));
    }
    Ok(())
}

/// Position-based id assigned to the option at `index` on create.
pub fn positional_option_id(index: usize) -> String {
    format!("opt-{}", index + 1)
}

/// Maps the correct-answer references an admin form may send onto the
/// positional option ids: `opt-*` verbatim, `tmp-N` (0-based form rows),
/// `pos-N` (1-based positions) and bare 0-based indexes.
pub fn canonical_option_ref(raw: &str) -> String {
    if raw.starts_with("opt-") {
        return raw.to_string();
    }
    if let Some(rest) = raw.strip_prefix("tmp-") {
        if let Ok(index) = rest.parse::<usize>() {
            return positional_option_id(index);
        }
    }
    if let Some(rest) = raw.strip_prefix("pos-") {
        return format!("opt-{}", rest);
    }
    if let Ok(index) = raw.trim().parse::<usize>() {
        return positional_option_id(index);
    }
    raw.to_string()
}
