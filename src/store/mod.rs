// src/store/mod.rs

//! Attempt persistence.
//!
//! The service only ever talks to [`AttemptStore`]; the backing map is
//! injected through `AppState`, never referenced as ambient state.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::{
        attempt::{AnswerMap, Attempt, SubmitResult},
        leaderboard::LeaderboardEntry,
    },
};

pub use memory::MemoryAttemptStore;
pub use sqlite::SqliteAttemptStore;

/// Outcome of marking an attempt completed.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// This call completed the attempt and stored its result.
    Fresh(SubmitResult),
    /// The attempt was already completed; its original result is returned.
    Existing(SubmitResult),
}

#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Stores a freshly created attempt.
    async fn insert(&self, attempt: Attempt) -> AppResult<()>;

    async fn find(&self, id: &str) -> AppResult<Option<Attempt>>;

    /// Shallow-merges `answers` into the attempt's answer map.
    /// Returns `false` when the attempt does not exist. Accepted even after
    /// completion; a trailing autosave may race the submission.
    async fn merge_answers(&self, id: &str, answers: AnswerMap) -> AppResult<bool>;

    /// Marks the attempt completed with `result`. First writer wins.
    /// Returns `None` when the attempt does not exist.
    async fn complete(&self, id: &str, result: SubmitResult) -> AppResult<Option<Completion>>;

    /// Like [`complete`](Self::complete), and records `entry` on the
    /// leaderboard in the same step when this call is the one that
    /// completes the attempt. Neither write is visible without the other.
    async fn complete_with_score(
        &self,
        id: &str,
        result: SubmitResult,
        entry: LeaderboardEntry,
    ) -> AppResult<Option<Completion>>;

    /// All recorded scores, optionally restricted to one category.
    async fn scores(&self, category_id: Option<&str>) -> AppResult<Vec<LeaderboardEntry>>;
}
