// src/handlers/leaderboard.rs

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};

use crate::{error::AppError, models::leaderboard::LeaderboardParams, quiz::AttemptService};

/// Ranked, paged leaderboard.
///
/// * `categoryId` restricts to one category.
/// * `range` is one of `daily`, `weekly`, `monthly`, `all` (default).
/// * `limit` defaults to 50 and is clamped to 1..=100.
pub async fn get_leaderboard(
    State(attempts): State<AttemptService>,
    Query(params): Query<LeaderboardParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(attempts.leaderboard(&params).await?))
}
