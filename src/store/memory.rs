// src/store/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    error::AppResult,
    models::{
        attempt::{AnswerMap, Attempt, SubmitResult},
        leaderboard::LeaderboardEntry,
    },
    store::{AttemptStore, Completion},
};

/// Process-local store keyed by attempt id.
#[derive(Debug, Default)]
pub struct MemoryAttemptStore {
    attempts: RwLock<HashMap<String, Attempt>>,
    scores: RwLock<Vec<LeaderboardEntry>>,
}

impl MemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn mark_completed(attempts: &mut HashMap<String, Attempt>, id: &str, result: SubmitResult) -> Option<Completion> {
    let attempt = attempts.get_mut(id)?;

    if attempt.completed {
        if let Some(existing) = &attempt.result {
            return Some(Completion::Existing(existing.clone()));
        }
    }

    attempt.completed = true;
    attempt.result = Some(result.clone());
    Some(Completion::Fresh(result))
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn insert(&self, attempt: Attempt) -> AppResult<()> {
        self.attempts.write().await.insert(attempt.id.clone(), attempt);
        Ok(())
    }

    async fn find(&self, id: &str) -> AppResult<Option<Attempt>> {
        Ok(self.attempts.read().await.get(id).cloned())
    }

    async fn merge_answers(&self, id: &str, answers: AnswerMap) -> AppResult<bool> {
        let mut attempts = self.attempts.write().await;
        match attempts.get_mut(id) {
            Some(attempt) => {
                attempt.merge_answers(answers);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn complete(&self, id: &str, result: SubmitResult) -> AppResult<Option<Completion>> {
        let mut attempts = self.attempts.write().await;
        Ok(mark_completed(&mut attempts, id, result))
    }

    async fn complete_with_score(
        &self,
        id: &str,
        result: SubmitResult,
        entry: LeaderboardEntry,
    ) -> AppResult<Option<Completion>> {
        // attempts lock held across the push
        let mut attempts = self.attempts.write().await;
        let completion = mark_completed(&mut attempts, id, result);
        if let Some(Completion::Fresh(_)) = &completion {
            self.scores.write().await.push(entry);
        }
        Ok(completion)
    }

    async fn scores(&self, category_id: Option<&str>) -> AppResult<Vec<LeaderboardEntry>> {
        let scores = self.scores.read().await;
        Ok(scores
            .iter()
            .filter(|e| category_id.is_none_or(|c| e.category_id == c))
            .cloned()
            .collect())
    }
}
