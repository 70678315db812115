// src/store/sqlite.rs

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use sqlx::{
    FromRow, SqliteConnection, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use crate::{
    error::{AppError, AppResult},
    models::{
        attempt::{AnswerMap, Attempt, SubmitResult},
        leaderboard::LeaderboardEntry,
    },
    store::{AttemptStore, Completion},
};

/// SQLite-backed store. Attempts are kept as JSON documents; the answer map
/// lives in its own column so merges are a single `json_patch` update.
#[derive(Debug, Clone)]
pub struct SqliteAttemptStore {
    pool: SqlitePool,
}

#[derive(FromRow)]
struct AttemptRow {
    record: String,
    answers: String,
    completed: bool,
    result: Option<String>,
}

#[derive(FromRow)]
struct ScoreRow {
    id: String,
    attempt_id: String,
    user_name: String,
    category_id: String,
    score: i64,
    time_sec: i64,
    submitted_at: String,
}

impl TryFrom<ScoreRow> for LeaderboardEntry {
    type Error = AppError;

    fn try_from(row: ScoreRow) -> Result<Self, Self::Error> {
        let submitted_at = DateTime::parse_from_rfc3339(&row.submitted_at)
            .map_err(|e| AppError::Internal(format!("Corrupt submitted_at: {}", e)))?
            .with_timezone(&Utc);
        Ok(LeaderboardEntry {
            id: row.id,
            attempt_id: row.attempt_id,
            user_name: row.user_name,
            category_id: row.category_id,
            score: u32::try_from(row.score).unwrap_or(0),
            time_sec: row.time_sec,
            submitted_at,
            rank: 0,
        })
    }
}

fn encode<T: Serialize>(value: &T) -> AppResult<String> {
    serde_json::to_string(value).map_err(|e| AppError::Internal(e.to_string()))
}

fn decode<T: DeserializeOwned>(raw: &str) -> AppResult<T> {
    serde_json::from_str(raw).map_err(|e| AppError::Internal(format!("Corrupt attempt data: {}", e)))
}

impl SqliteAttemptStore {
    /// Opens (creating if missing) the database at `url`.
    ///
    /// In-memory databases are per-connection, so they get a single pinned
    /// connection.
    pub async fn connect(url: &str) -> AppResult<Self> {
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        let pool_options = SqlitePoolOptions::new().acquire_timeout(Duration::from_secs(3));
        let pool_options = if in_memory {
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Result of an attempt the guarded update did not touch.
    async fn existing_completion(&self, id: &str) -> AppResult<Option<Completion>> {
        let existing: Option<Option<String>> =
            sqlx::query_scalar("SELECT result FROM quiz_attempts WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match existing {
            None => Ok(None),
            Some(Some(raw)) => Ok(Some(Completion::Existing(decode(&raw)?))),
            Some(None) => Err(AppError::Internal(format!(
                "Attempt {} is completed without a result",
                id
            ))),
        }
    }
}

/// Guarded completion; `false` when the attempt is missing or already done.
async fn mark_completed(conn: &mut SqliteConnection, id: &str, result: &SubmitResult) -> AppResult<bool> {
    let done = sqlx::query(
        "UPDATE quiz_attempts SET completed = 1, result = ? WHERE id = ? AND completed = 0",
    )
    .bind(encode(result)?)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(done.rows_affected() > 0)
}

async fn insert_score(conn: &mut SqliteConnection, entry: &LeaderboardEntry) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO leaderboard_entries
            (id, attempt_id, user_name, category_id, score, time_sec, submitted_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.attempt_id)
    .bind(&entry.user_name)
    .bind(&entry.category_id)
    .bind(i64::from(entry.score))
    .bind(entry.time_sec)
    .bind(entry.submitted_at.to_rfc3339())
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl AttemptStore for SqliteAttemptStore {
    async fn insert(&self, attempt: Attempt) -> AppResult<()> {
        let result = attempt.result.as_ref().map(encode).transpose()?;
        sqlx::query(
            r#"
            INSERT INTO quiz_attempts (id, record, answers, completed, result, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&attempt.id)
        .bind(encode(&attempt)?)
        .bind(encode(&attempt.answers)?)
        .bind(attempt.completed)
        .bind(result)
        .bind(attempt.start_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, id: &str) -> AppResult<Option<Attempt>> {
        let row = sqlx::query_as::<_, AttemptRow>(
            "SELECT record, answers, completed, result FROM quiz_attempts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut attempt: Attempt = decode(&row.record)?;
        attempt.answers = decode(&row.answers)?;
        attempt.completed = row.completed;
        attempt.result = row.result.as_deref().map(decode).transpose()?;
        Ok(Some(attempt))
    }

    async fn merge_answers(&self, id: &str, answers: AnswerMap) -> AppResult<bool> {
        // RFC 7396 merge: top-level keys replace, untouched keys stay.
        let done = sqlx::query("UPDATE quiz_attempts SET answers = json_patch(answers, ?) WHERE id = ?")
            .bind(encode(&answers)?)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn complete(&self, id: &str, result: SubmitResult) -> AppResult<Option<Completion>> {
        let mut conn = self.pool.acquire().await?;
        if mark_completed(&mut conn, id, &result).await? {
            return Ok(Some(Completion::Fresh(result)));
        }
        drop(conn);
        self.existing_completion(id).await
    }

    async fn complete_with_score(
        &self,
        id: &str,
        result: SubmitResult,
        entry: LeaderboardEntry,
    ) -> AppResult<Option<Completion>> {
        let mut tx = self.pool.begin().await?;
        if !mark_completed(&mut tx, id, &result).await? {
            tx.rollback().await?;
            return self.existing_completion(id).await;
        }
        if let Err(e) = insert_score(&mut tx, &entry).await {
            tx.rollback().await?;
            return Err(e);
        }
        tx.commit().await?;
        Ok(Some(Completion::Fresh(result)))
    }

    async fn scores(&self, category_id: Option<&str>) -> AppResult<Vec<LeaderboardEntry>> {
        const COLUMNS: &str =
            "SELECT id, attempt_id, user_name, category_id, score, time_sec, submitted_at FROM leaderboard_entries";

        let rows = match category_id {
            Some(category_id) => {
                sqlx::query_as::<_, ScoreRow>(&format!("{} WHERE category_id = ?", COLUMNS))
                    .bind(category_id)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as::<_, ScoreRow>(COLUMNS)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(LeaderboardEntry::try_from).collect()
    }
}
