// src/models/attempt.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::{
    category::Category,
    question::{Difficulty, PublicQuestion, Question},
};

/// `questionId -> chosen option ids` (client-space ids until remapped).
pub type AnswerMap = HashMap<String, Vec<String>>;

/// One quiz attempt as held by the attempt store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: String,
    pub category_id: String,
    /// Snapshot of the category at creation time.
    pub category: Category,
    /// Requested (clamped) question count; may exceed `questions.len()`
    /// when the pool is smaller.
    pub num_questions: usize,
    /// `None` means mixed.
    pub difficulty: Option<Difficulty>,
    pub time_limit_sec: i64,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub user_name: String,
    /// Answer-bearing questions in presentation order. Immutable.
    pub questions: Vec<Question>,
    /// Client projection built at creation time.
    pub projected: Vec<PublicQuestion>,
    #[serde(default)]
    pub answers: AnswerMap,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub result: Option<SubmitResult>,
}

impl Attempt {
    /// Shallow merge: last write per question id wins, other entries untouched.
    pub fn merge_answers(&mut self, incoming: AnswerMap) {
        self.answers.extend(incoming);
    }
}

/// One answer as sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub question_id: String,
    #[serde(default, deserialize_with = "lenient_option_ids")]
    pub chosen_option_ids: Vec<String>,
}

/// Scalars are stringified; anything that is not an array selects nothing.
fn option_ids(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.into_iter().map(scalar_string).collect(),
        _ => Vec::new(),
    }
}

fn scalar_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_string(Value::deserialize(deserializer)?))
}

fn lenient_option_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(option_ids(Value::deserialize(deserializer)?))
}

/// Clients send answers either as a list of entries or as a plain map.
///
/// Decoding never fails on shape: malformed list items are skipped, map
/// values that are not arrays become empty selections, and any other value
/// is an empty map.
#[derive(Debug, Clone)]
pub enum AnswersPayload {
    List(Vec<AnswerEntry>),
    Map(AnswerMap),
}

impl<'de> Deserialize<'de> for AnswersPayload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => AnswersPayload::List(
                items
                    .into_iter()
                    .filter_map(|item| serde_json::from_value(item).ok())
                    .collect(),
            ),
            Value::Object(map) => AnswersPayload::Map(
                map.into_iter()
                    .map(|(question_id, ids)| (question_id, option_ids(ids)))
                    .collect(),
            ),
            _ => AnswersPayload::Map(AnswerMap::new()),
        })
    }
}

impl AnswersPayload {
    pub fn into_map(self) -> AnswerMap {
        match self {
            AnswersPayload::List(entries) => entries
                .into_iter()
                .filter(|e| !e.question_id.is_empty())
                .map(|e| (e.question_id, e.chosen_option_ids))
                .collect(),
            AnswersPayload::Map(map) => map,
        }
    }
}

/// Builds the list form sent by the client library.
pub fn answer_entries(answers: &AnswerMap) -> Vec<AnswerEntry> {
    let mut entries: Vec<AnswerEntry> = answers
        .iter()
        .map(|(question_id, ids)| AnswerEntry {
            question_id: question_id.clone(),
            chosen_option_ids: ids.clone(),
        })
        .collect();
    entries.sort_by(|a, b| a.question_id.cmp(&b.question_id));
    entries
}

/// DTO for starting an attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub category_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_questions: Option<i64>,
    /// `"easy" | "medium" | "hard" | "mixed"`; absent means mixed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(
        default,
        alias = "timeLimitMinutes",
        skip_serializing_if = "Option::is_none"
    )]
    pub time_limit_min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

/// Session payload returned on create and on every (refresh-safe) read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub attempt_id: String,
    pub category_id: String,
    pub category: Category,
    pub num_questions: usize,
    /// Requested filter, `"mixed"` when none.
    pub difficulty: String,
    /// Timestamps stay in wire form so a malformed value degrades the
    /// countdown instead of failing the whole response.
    pub start_at: String,
    pub end_at: String,
    pub time_limit_sec: i64,
    /// Server clock at response time, for client drift calibration.
    pub server_now: String,
    pub questions: Vec<PublicQuestion>,
    #[serde(default)]
    pub current_answers: AnswerMap,
    #[serde(default)]
    pub is_completed: bool,
}

/// DTO for autosave requests.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveProgressRequest {
    #[serde(default)]
    pub answers: Option<AnswersPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveProgressResponse {
    pub saved: bool,
    pub server_now: String,
}

/// DTO for submission; `answers` is the last-chance sync.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub answers: Option<AnswersPayload>,
}

/// Per-question grading classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Correct,
    Incorrect,
    Unselected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownEntry {
    pub question_id: String,
    pub is_correct: bool,
    pub outcome: Outcome,
    /// Chosen ids remapped to canonical space.
    pub user_answer_ids: Vec<String>,
    pub correct_answer_ids: Vec<String>,
    pub user_answer_texts: Vec<String>,
    pub correct_answer_texts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Graded result of an attempt. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResult {
    pub score: u32,
    pub correct_count: usize,
    pub incorrect_count: usize,
    pub unselected_count: usize,
    pub total: usize,
    pub time_taken_sec: i64,
    pub breakdown: Vec<BreakdownEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentile: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_accept_list_form() {
        let req: SaveProgressRequest = serde_json::from_str(
            r#"{"answers": [{"questionId": "q1", "chosenOptionIds": ["a"]}, {"questionId": "q2"}]}"#,
        )
        .unwrap();
        let map = req.answers.unwrap().into_map();
        assert_eq!(map["q1"], vec!["a"]);
        assert!(map["q2"].is_empty());
    }

    #[test]
    fn answers_accept_map_form() {
        let req: SubmitRequest =
            serde_json::from_str(r#"{"answers": {"q1": ["a", "b"]}}"#).unwrap();
        let map = req.answers.unwrap().into_map();
        assert_eq!(map["q1"], vec!["a", "b"]);
    }

    #[test]
    fn non_array_selections_become_empty() {
        let req: SaveProgressRequest =
            serde_json::from_str(r#"{"answers": {"q1": "a", "q2": ["b"], "q3": null}}"#).unwrap();
        let map = req.answers.unwrap().into_map();
        assert!(map["q1"].is_empty());
        assert_eq!(map["q2"], vec!["b"]);
        assert!(map["q3"].is_empty());
    }

    #[test]
    fn list_entries_are_coerced() {
        let req: SubmitRequest = serde_json::from_str(
            r#"{"answers": [
                {"questionId": "q1", "chosenOptionIds": "a"},
                {"questionId": 7, "chosenOptionIds": [1, "b"]},
                "junk"
            ]}"#,
        )
        .unwrap();
        let map = req.answers.unwrap().into_map();
        assert_eq!(map.len(), 2);
        assert!(map["q1"].is_empty());
        assert_eq!(map["7"], vec!["1", "b"]);
    }

    #[test]
    fn scalar_answers_are_an_empty_map() {
        let req: SaveProgressRequest = serde_json::from_str(r#"{"answers": "everything"}"#).unwrap();
        assert!(req.answers.unwrap().into_map().is_empty());
    }

    #[test]
    fn missing_answers_is_none() {
        let req: SubmitRequest = serde_json::from_str("{}").unwrap();
        assert!(req.answers.is_none());
    }

    #[test]
    fn malformed_session_timestamps_still_decode() {
        let view: SessionView = serde_json::from_value(serde_json::json!({
            "attemptId": "a1",
            "categoryId": "c",
            "category": {"id": "c", "name": "C", "slug": "c"},
            "numQuestions": 0,
            "difficulty": "mixed",
            "startAt": "2026-01-01T12:00:00.000Z",
            "endAt": "later",
            "timeLimitSec": 300,
            "serverNow": "not-a-date",
            "questions": [],
        }))
        .unwrap();
        assert_eq!(view.server_now, "not-a-date");
        assert_eq!(view.end_at, "later");
    }

    #[test]
    fn time_limit_minutes_alias() {
        let req: CreateSessionRequest =
            serde_json::from_str(r#"{"categoryId": "c", "timeLimitMinutes": 20}"#).unwrap();
        assert_eq!(req.time_limit_min, Some(20));
    }
}
