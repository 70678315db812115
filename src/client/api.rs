// src/client/api.rs

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::{
    client::{
        error::{ClientError, ClientResult},
        retry::{RetryPolicy, retry_with},
    },
    models::{
        attempt::{
            AnswerMap, CreateSessionRequest, SaveProgressResponse, SessionView, SubmitResult,
            answer_entries,
        },
        leaderboard::{LeaderboardEntry, LeaderboardParams},
    },
};

/// Timeout for ordinary calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout for submission; grading may land on a cold backend.
pub const LONG_TIMEOUT: Duration = Duration::from_secs(300);

/// The calls a quiz runtime makes once an attempt exists.
#[async_trait]
pub trait QuizBackend: Send + Sync {
    async fn get_session(&self, attempt_id: &str) -> ClientResult<SessionView>;

    async fn save_progress(&self, attempt_id: &str, answers: &AnswerMap) -> ClientResult<SaveProgressResponse>;

    async fn submit(&self, attempt_id: &str, answers: Option<&AnswerMap>) -> ClientResult<SubmitResult>;
}

/// HTTP client for the quiz API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
    submit_retry: RetryPolicy,
}

fn answers_body(answers: &AnswerMap) -> Value {
    json!({ "answers": answer_entries(answers) })
}

impl ApiClient {
    /// `base_url` is the server root, e.g. `http://localhost:3000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
            submit_retry: RetryPolicy::submission(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy, submit_retry: RetryPolicy) -> Self {
        self.retry = retry;
        self.submit_retry = submit_retry;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> ClientResult<T> {
        let mut request = self.http.request(method, self.url(path)).timeout(timeout);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let message = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| status.to_string());
        Err(ClientError::from_status(status.as_u16(), message))
    }

    /// Starts an attempt. Not retried: a repeated create would open a
    /// second attempt.
    pub async fn create_session(&self, req: &CreateSessionRequest) -> ClientResult<SessionView> {
        let body = serde_json::to_value(req).map_err(|e| ClientError::Validation(e.to_string()))?;
        self.call(Method::POST, "/quiz-sessions", Some(&body), DEFAULT_TIMEOUT)
            .await
    }

    pub async fn leaderboard(&self, params: &LeaderboardParams) -> ClientResult<Vec<LeaderboardEntry>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(category_id) = &params.category_id {
            query.push(("categoryId", category_id.clone()));
        }
        if let Some(range) = params.range {
            query.push(("range", range.as_str().to_string()));
        }
        if let Some(limit) = params.limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(offset) = params.offset {
            query.push(("offset", offset.to_string()));
        }
        let path = if query.is_empty() {
            "/leaderboard".to_string()
        } else {
            let encoded: Vec<String> = query
                .iter()
                .map(|(k, v)| format!("{}={}", k, url::form_urlencoded::byte_serialize(v.as_bytes()).collect::<String>()))
                .collect();
            format!("/leaderboard?{}", encoded.join("&"))
        };

        retry_with(&self.retry, ClientError::is_retryable, || {
            self.call(Method::GET, &path, None, DEFAULT_TIMEOUT)
        })
        .await
    }
}

#[async_trait]
impl QuizBackend for ApiClient {
    async fn get_session(&self, attempt_id: &str) -> ClientResult<SessionView> {
        let path = format!("/quiz-sessions/{}", attempt_id);
        retry_with(&self.retry, ClientError::is_retryable, || {
            self.call(Method::GET, &path, None, DEFAULT_TIMEOUT)
        })
        .await
    }

    async fn save_progress(&self, attempt_id: &str, answers: &AnswerMap) -> ClientResult<SaveProgressResponse> {
        let path = format!("/quiz-sessions/{}/progress", attempt_id);
        let body = answers_body(answers);
        retry_with(&self.retry, ClientError::is_retryable, || {
            self.call(Method::PATCH, &path, Some(&body), DEFAULT_TIMEOUT)
        })
        .await
    }

    async fn submit(&self, attempt_id: &str, answers: Option<&AnswerMap>) -> ClientResult<SubmitResult> {
        let path = format!("/quiz-sessions/{}/submit", attempt_id);
        let body = answers.map(answers_body).unwrap_or_else(|| json!({}));
        retry_with(&self.submit_retry, ClientError::is_retryable, || {
            self.call(Method::POST, &path, Some(&body), LONG_TIMEOUT)
        })
        .await
    }
}
