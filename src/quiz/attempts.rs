// src/quiz/attempts.rs

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::{
    catalog::Catalog,
    error::{AppError, AppResult},
    models::{
        attempt::{AnswerMap, Attempt, CreateSessionRequest, SaveProgressResponse, SessionView, SubmitResult},
        leaderboard::{LeaderboardEntry, LeaderboardParams},
        question::{Difficulty, PublicQuestion, Question},
    },
    quiz::{
        leaderboard,
        scoring::score_attempt,
        shuffle::{option_seed, select_random, shuffle_seeded},
    },
    store::{AttemptStore, Completion},
    utils::time::format_timestamp,
};

pub const DEFAULT_NUM_QUESTIONS: i64 = 10;
pub const MIN_NUM_QUESTIONS: i64 = 1;
pub const MAX_NUM_QUESTIONS: i64 = 50;

pub const DEFAULT_TIME_LIMIT_MIN: i64 = 15;
pub const MIN_TIME_LIMIT_MIN: i64 = 5;
pub const MAX_TIME_LIMIT_MIN: i64 = 60;

const ANONYMOUS: &str = "Anonymous";

/// Candidate questions for a filter. An empty filtered pool falls back to
/// the whole category instead of producing an empty attempt.
pub fn candidate_pool(all: &[Question], filter: Option<Difficulty>) -> Vec<Question> {
    let Some(difficulty) = filter else {
        return all.to_vec();
    };
    let filtered: Vec<Question> = all
        .iter()
        .filter(|q| q.difficulty == difficulty)
        .cloned()
        .collect();
    if filtered.is_empty() {
        all.to_vec()
    } else {
        filtered
    }
}

/// Client projection: answer key stripped, options in the per-attempt
/// seeded order. Pure, so re-deriving it always gives the same view.
pub fn project_questions(attempt_id: &str, questions: &[Question]) -> Vec<PublicQuestion> {
    questions
        .iter()
        .map(|q| {
            let options = shuffle_seeded(&q.options, &option_seed(attempt_id, &q.id));
            PublicQuestion::project(q, options)
        })
        .collect()
}

fn session_view(attempt: &Attempt, questions: Vec<PublicQuestion>, server_now: DateTime<Utc>) -> SessionView {
    SessionView {
        attempt_id: attempt.id.clone(),
        category_id: attempt.category_id.clone(),
        category: attempt.category.clone(),
        num_questions: attempt.num_questions,
        difficulty: attempt
            .difficulty
            .map_or("mixed", |d| d.as_str())
            .to_string(),
        start_at: format_timestamp(attempt.start_at),
        end_at: format_timestamp(attempt.end_at),
        time_limit_sec: attempt.time_limit_sec,
        server_now: format_timestamp(server_now),
        questions,
        current_answers: attempt.answers.clone(),
        is_completed: attempt.completed,
    }
}

/// Attempt lifecycle: create, refresh-safe read, autosave merge, submit.
#[derive(Clone)]
pub struct AttemptService {
    catalog: Arc<Catalog>,
    store: Arc<dyn AttemptStore>,
    // placement reads the board that completion writes
    ranking: Arc<Mutex<()>>,
}

impl AttemptService {
    pub fn new(catalog: Arc<Catalog>, store: Arc<dyn AttemptStore>) -> Self {
        Self {
            catalog,
            store,
            ranking: Arc::new(Mutex::new(())),
        }
    }

    pub async fn create(&self, req: CreateSessionRequest) -> AppResult<SessionView> {
        let category_id = req.category_id.trim();
        if category_id.is_empty() {
            return Err(AppError::Validation("categoryId is required".to_string()));
        }

        let category = self
            .catalog
            .category(category_id)
            .await
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

        let num_questions = req
            .num_questions
            .unwrap_or(DEFAULT_NUM_QUESTIONS)
            .clamp(MIN_NUM_QUESTIONS, MAX_NUM_QUESTIONS) as usize;
        let time_limit_min = req
            .time_limit_min
            .unwrap_or(DEFAULT_TIME_LIMIT_MIN)
            .clamp(MIN_TIME_LIMIT_MIN, MAX_TIME_LIMIT_MIN);
        let time_limit_sec = time_limit_min * 60;
        let difficulty = Difficulty::parse_filter(req.difficulty.as_deref());

        let all = self.catalog.questions(&category.id).await?;
        let pool = candidate_pool(&all, difficulty);
        let questions = select_random(&pool, num_questions, &mut rand::rng());

        let id = uuid::Uuid::new_v4().to_string();
        let projected = project_questions(&id, &questions);
        let start_at = Utc::now();

        let attempt = Attempt {
            id,
            category_id: category.id.clone(),
            category,
            num_questions,
            difficulty,
            time_limit_sec,
            start_at,
            end_at: start_at + Duration::seconds(time_limit_sec),
            user_name: req
                .user_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| ANONYMOUS.to_string()),
            questions,
            projected: projected.clone(),
            answers: AnswerMap::new(),
            completed: false,
            result: None,
        };

        self.store.insert(attempt.clone()).await?;
        tracing::info!(
            "Attempt {} created: category={} questions={} limit={}s",
            attempt.id,
            attempt.category_id,
            attempt.questions.len(),
            attempt.time_limit_sec
        );

        Ok(session_view(&attempt, projected, start_at))
    }

    /// Same question and option order on every call; only `serverNow` moves.
    pub async fn get(&self, id: &str) -> AppResult<SessionView> {
        let attempt = self.find(id).await?;
        let projected = project_questions(&attempt.id, &attempt.questions);
        Ok(session_view(&attempt, projected, Utc::now()))
    }

    pub async fn merge_answers(&self, id: &str, answers: AnswerMap) -> AppResult<SaveProgressResponse> {
        let count = answers.len();
        if !self.store.merge_answers(id, answers).await? {
            return Err(AppError::NotFound("Session not found".to_string()));
        }
        tracing::debug!("Attempt {}: merged {} answers", id, count);
        Ok(SaveProgressResponse {
            saved: true,
            server_now: format_timestamp(Utc::now()),
        })
    }

    /// Marks the attempt completed with `result`; first completion wins.
    pub async fn complete(&self, id: &str, result: SubmitResult) -> AppResult<Completion> {
        self.store
            .complete(id, result)
            .await?
            .ok_or_else(|| AppError::NotFound("Session not found".to_string()))
    }

    /// Grades the attempt. `final_answers` is merged first so the last
    /// debounce window is never lost. Resubmitting a completed attempt
    /// returns the stored result unchanged. Placement and completion are
    /// serialized per service, so concurrent submissions in a category see
    /// each other's leaderboard rows.
    pub async fn submit(&self, id: &str, final_answers: Option<AnswerMap>) -> AppResult<SubmitResult> {
        if let Some(answers) = final_answers {
            if !self.store.merge_answers(id, answers).await? {
                return Err(AppError::NotFound("Session not found".to_string()));
            }
        }

        let attempt = self.find(id).await?;
        if let (true, Some(result)) = (attempt.completed, &attempt.result) {
            tracing::info!("Attempt {} already submitted, returning stored result", id);
            return Ok(result.clone());
        }

        if attempt.questions.is_empty() && !attempt.projected.is_empty() {
            return Err(AppError::Internal(format!(
                "Scoring data not found for attempt {}",
                id
            )));
        }

        // rank, completion and the leaderboard row move together
        let _ranking = self.ranking.lock().await;
        let now = Utc::now();
        let mut result = score_attempt(
            &attempt.projected,
            &attempt.questions,
            &attempt.answers,
            attempt.start_at,
            now,
        );

        let entry = LeaderboardEntry {
            id: uuid::Uuid::new_v4().to_string(),
            attempt_id: attempt.id.clone(),
            user_name: attempt.user_name.clone(),
            category_id: attempt.category_id.clone(),
            score: result.score,
            time_sec: result.time_taken_sec,
            submitted_at: now,
            rank: 0,
        };
        let others = self.store.scores(Some(&attempt.category_id)).await?;
        let (rank, percentile) = leaderboard::placement(&others, &entry);
        result.rank = Some(rank);
        result.percentile = Some(percentile);

        let completion = self
            .store
            .complete_with_score(id, result, entry)
            .await?
            .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;
        match completion {
            Completion::Fresh(result) => {
                tracing::info!(
                    "Attempt {} submitted: score={} correct={}/{} rank={}",
                    id,
                    result.score,
                    result.correct_count,
                    result.total,
                    rank
                );
                Ok(result)
            }
            Completion::Existing(result) => Ok(result),
        }
    }

    pub async fn leaderboard(&self, params: &LeaderboardParams) -> AppResult<Vec<LeaderboardEntry>> {
        let entries = self.store.scores(params.category_id.as_deref()).await?;
        Ok(leaderboard::query(entries, params, Utc::now()))
    }

    async fn find(&self, id: &str) -> AppResult<Attempt> {
        self.store
            .find(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Session not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::CatalogSeed,
        models::{
            attempt::Outcome,
            category::Category,
            question::{QuestionOption, QuestionType},
        },
        store::MemoryAttemptStore,
        utils::time::parse_timestamp,
    };
    use std::collections::{HashMap, HashSet};

    fn question(id: &str, difficulty: Difficulty) -> Question {
        Question {
            id: id.into(),
            text: format!("Question {}", id),
            question_type: QuestionType::Single,
            image_url: None,
            options: (1..=4)
                .map(|i| QuestionOption {
                    id: format!("{}-o{}", id, i),
                    text: format!("Answer {} of {}", i, id),
                })
                .collect(),
            correct_option_ids: vec![format!("{}-o1", id)],
            explanation: Some("Because.".into()),
            difficulty,
        }
    }

    fn service_with(questions: Vec<Question>) -> AttemptService {
        let category = Category {
            id: "history".into(),
            name: "World History".into(),
            slug: "history".into(),
            description: None,
            color: None,
            icon: None,
            question_count: 0,
        };
        let mut by_category = HashMap::new();
        by_category.insert("history".to_string(), questions);
        let catalog = Catalog::from_seed(CatalogSeed {
            categories: vec![category],
            questions: by_category,
        });
        AttemptService::new(Arc::new(catalog), Arc::new(MemoryAttemptStore::new()))
    }

    fn medium_pool(n: usize) -> Vec<Question> {
        (1..=n).map(|i| question(&format!("q{}", i), Difficulty::Medium)).collect()
    }

    fn create_req(num: i64, minutes: i64, difficulty: Option<&str>) -> CreateSessionRequest {
        CreateSessionRequest {
            category_id: "history".into(),
            num_questions: Some(num),
            difficulty: difficulty.map(str::to_string),
            time_limit_min: Some(minutes),
            user_name: None,
        }
    }

    #[tokio::test]
    async fn end_to_end_partial_progress() {
        let service = service_with(medium_pool(10));
        let session = service.create(create_req(5, 10, None)).await.unwrap();

        assert_eq!(session.questions.len(), 5);
        assert_eq!(session.time_limit_sec, 600);
        let start = parse_timestamp(&session.start_at).unwrap();
        let end = parse_timestamp(&session.end_at).unwrap();
        assert_eq!(end - start, Duration::seconds(600));

        let mut answers = AnswerMap::new();
        for q in session.questions.iter().take(3) {
            answers.insert(q.id.clone(), vec![format!("{}-o1", q.id)]);
        }
        let ack = service.merge_answers(&session.attempt_id, answers).await.unwrap();
        assert!(ack.saved);

        let result = service.submit(&session.attempt_id, None).await.unwrap();
        assert_eq!(result.breakdown.len(), 5);
        assert_eq!(result.unselected_count, 2);
        assert_eq!(result.correct_count, 3);
        assert_eq!(result.score, 60);
        assert_eq!(result.rank, Some(1));
    }

    #[tokio::test]
    async fn refetch_is_stable() {
        let service = service_with(medium_pool(8));
        let created = service.create(create_req(8, 10, None)).await.unwrap();
        let first = service.get(&created.attempt_id).await.unwrap();
        let second = service.get(&created.attempt_id).await.unwrap();

        assert_eq!(first.questions, second.questions);
        assert_eq!(first.questions, created.questions);
        assert!(parse_timestamp(&second.server_now) >= parse_timestamp(&created.server_now));
    }

    #[tokio::test]
    async fn options_are_shuffled_but_complete() {
        let service = service_with(medium_pool(3));
        let session = service.create(create_req(3, 10, None)).await.unwrap();
        for q in &session.questions {
            let ids: Vec<&str> = q.options.iter().map(|o| o.id.as_str()).collect();
            let canonical: Vec<String> = (1..=4).map(|i| format!("{}-o{}", q.id, i)).collect();
            assert_ne!(ids, canonical.iter().map(String::as_str).collect::<Vec<_>>());
            let as_set: HashSet<&str> = ids.into_iter().collect();
            assert_eq!(as_set.len(), 4);
        }
    }

    #[tokio::test]
    async fn selection_has_no_duplicates() {
        let service = service_with(medium_pool(10));
        let session = service.create(create_req(10, 10, None)).await.unwrap();
        let ids: HashSet<&str> = session.questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids.len(), 10);
    }

    #[tokio::test]
    async fn difficulty_filter_falls_back_when_empty() {
        let service = service_with(medium_pool(4));
        let session = service.create(create_req(3, 10, Some("hard"))).await.unwrap();
        assert_eq!(session.questions.len(), 3);
        assert_eq!(session.difficulty, "hard");
    }

    #[tokio::test]
    async fn difficulty_filter_applies_when_possible() {
        let mut pool = medium_pool(4);
        pool.push(question("h1", Difficulty::Hard));
        pool.push(question("h2", Difficulty::Hard));
        let service = service_with(pool);

        let session = service.create(create_req(10, 10, Some("max"))).await.unwrap();
        let ids: HashSet<&str> = session.questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, HashSet::from(["h1", "h2"]));
    }

    #[tokio::test]
    async fn counts_and_limits_are_clamped() {
        let service = service_with(medium_pool(60));

        let session = service.create(create_req(0, 1, None)).await.unwrap();
        assert_eq!(session.questions.len(), 1);
        assert_eq!(session.time_limit_sec, 5 * 60);

        let session = service.create(create_req(500, 500, None)).await.unwrap();
        assert_eq!(session.questions.len(), 50);
        assert_eq!(session.time_limit_sec, 60 * 60);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let service = service_with(medium_pool(2));

        let mut req = create_req(1, 10, None);
        req.category_id = "nope".into();
        assert!(matches!(service.create(req).await, Err(AppError::NotFound(_))));

        assert!(matches!(service.get("missing").await, Err(AppError::NotFound(_))));
        assert!(matches!(
            service.merge_answers("missing", AnswerMap::new()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(service.submit("missing", None).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn missing_category_id_is_a_validation_error() {
        let service = service_with(medium_pool(2));
        let mut req = create_req(1, 10, None);
        req.category_id = "  ".into();
        assert!(matches!(service.create(req).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn final_answers_are_merged_before_grading() {
        let service = service_with(medium_pool(2));
        let session = service.create(create_req(2, 10, None)).await.unwrap();
        let first = &session.questions[0];

        let mut saved = AnswerMap::new();
        saved.insert(first.id.clone(), vec![format!("{}-o2", first.id)]);
        service.merge_answers(&session.attempt_id, saved).await.unwrap();

        let mut last = AnswerMap::new();
        last.insert(first.id.clone(), vec![format!("{}-o1", first.id)]);
        let result = service.submit(&session.attempt_id, Some(last)).await.unwrap();

        assert_eq!(result.breakdown[0].outcome, Outcome::Correct);
        assert_eq!(result.breakdown[1].outcome, Outcome::Unselected);
    }

    #[tokio::test]
    async fn resubmission_returns_stored_result() {
        let service = service_with(medium_pool(2));
        let session = service.create(create_req(2, 10, None)).await.unwrap();
        let first = service.submit(&session.attempt_id, None).await.unwrap();
        assert_eq!(first.score, 0);

        let mut late = AnswerMap::new();
        for q in &session.questions {
            late.insert(q.id.clone(), vec![format!("{}-o1", q.id)]);
        }
        let second = service.submit(&session.attempt_id, Some(late)).await.unwrap();
        assert_eq!(second, first);

        let view = service.get(&session.attempt_id).await.unwrap();
        assert!(view.is_completed);
        assert_eq!(view.current_answers.len(), 2);

        let board = service.leaderboard(&LeaderboardParams::default()).await.unwrap();
        assert_eq!(board.len(), 1);
    }

    #[tokio::test]
    async fn second_attempt_is_ranked_against_the_first() {
        let service = service_with(medium_pool(2));

        let weak = service.create(create_req(2, 10, None)).await.unwrap();
        service.submit(&weak.attempt_id, None).await.unwrap();

        let strong = service.create(create_req(2, 10, None)).await.unwrap();
        let mut answers = AnswerMap::new();
        for q in &strong.questions {
            answers.insert(q.id.clone(), vec![format!("{}-o1", q.id)]);
        }
        let result = service.submit(&strong.attempt_id, Some(answers)).await.unwrap();
        assert_eq!(result.score, 100);
        assert_eq!(result.rank, Some(1));
        assert_eq!(result.percentile, Some(100));

        let board = service.leaderboard(&LeaderboardParams::default()).await.unwrap();
        assert_eq!(board[0].attempt_id, strong.attempt_id);
        assert_eq!(board[1].rank, 2);
    }

    #[tokio::test]
    async fn completing_directly_freezes_the_result() {
        let service = service_with(medium_pool(3));
        let session = service.create(create_req(3, 10, None)).await.unwrap();
        let frozen = SubmitResult {
            score: 42,
            correct_count: 0,
            incorrect_count: 0,
            unselected_count: 3,
            total: 3,
            time_taken_sec: 5,
            breakdown: Vec::new(),
            rank: None,
            percentile: None,
        };

        let completion = service.complete(&session.attempt_id, frozen.clone()).await.unwrap();
        assert_eq!(completion, Completion::Fresh(frozen.clone()));
        assert!(service.get(&session.attempt_id).await.unwrap().is_completed);
        assert_eq!(service.submit(&session.attempt_id, None).await.unwrap(), frozen);
        assert!(matches!(
            service.complete("missing", frozen).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_submissions_get_distinct_ranks() {
        let service = service_with(medium_pool(2));
        let a = service.create(create_req(2, 10, None)).await.unwrap();
        let b = service.create(create_req(2, 10, None)).await.unwrap();

        let first = tokio::spawn({
            let service = service.clone();
            async move { service.submit(&a.attempt_id, None).await }
        });
        let second = tokio::spawn({
            let service = service.clone();
            async move { service.submit(&b.attempt_id, None).await }
        });

        let mut ranks = vec![
            first.await.unwrap().unwrap().rank.unwrap(),
            second.await.unwrap().unwrap().rank.unwrap(),
        ];
        ranks.sort_unstable();
        assert_eq!(ranks, vec![1, 2]);

        let board = service.leaderboard(&LeaderboardParams::default()).await.unwrap();
        assert_eq!(board.len(), 2);
    }

    #[tokio::test]
    async fn empty_category_yields_empty_attempt() {
        let service = service_with(Vec::new());
        let session = service.create(create_req(5, 10, None)).await.unwrap();
        assert!(session.questions.is_empty());

        let result = service.submit(&session.attempt_id, None).await.unwrap();
        assert_eq!(result.total, 0);
        assert_eq!(result.score, 0);
    }
}
