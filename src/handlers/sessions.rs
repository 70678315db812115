// src/handlers/sessions.rs

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::attempt::{CreateSessionRequest, SaveProgressRequest, SubmitRequest},
    quiz::AttemptService,
};

/// Starts a new attempt.
///
/// Picks the questions, shuffles each question's options with the
/// attempt-seeded order and returns the client projection (no answer key).
pub async fn create_session(
    State(attempts): State<AttemptService>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = attempts.create(req).await?;
    Ok(Json(session))
}

/// Refresh-safe read of an attempt, with a fresh `serverNow`.
pub async fn get_session(
    State(attempts): State<AttemptService>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(attempts.get(&id).await?))
}

/// Autosave endpoint. Merges per question; absent answers are a no-op merge.
pub async fn save_progress(
    State(attempts): State<AttemptService>,
    Path(id): Path<String>,
    Json(req): Json<SaveProgressRequest>,
) -> Result<impl IntoResponse, AppError> {
    let answers = req.answers.map(|a| a.into_map()).unwrap_or_default();
    Ok(Json(attempts.merge_answers(&id, answers).await?))
}

/// Grades the attempt. The body is optional, so it is read raw.
pub async fn submit_session(
    State(attempts): State<AttemptService>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let req: SubmitRequest = if body.iter().all(u8::is_ascii_whitespace) {
        SubmitRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };

    let result = attempts
        .submit(&id, req.answers.map(|a| a.into_map()))
        .await?;
    Ok(Json(result))
}
