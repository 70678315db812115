// src/quiz/leaderboard.rs

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::models::leaderboard::{LeaderboardEntry, LeaderboardParams};

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 100;

/// Higher score first, then faster time, then earlier submission.
fn compare(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    b.score
        .cmp(&a.score)
        .then(a.time_sec.cmp(&b.time_sec))
        .then(a.submitted_at.cmp(&b.submitted_at))
}

/// Sorts entries and assigns 1-based ranks.
pub fn rank_entries(mut entries: Vec<LeaderboardEntry>) -> Vec<LeaderboardEntry> {
    entries.sort_by(compare);
    for (index, entry) in entries.iter_mut().enumerate() {
        entry.rank = index + 1;
    }
    entries
}

/// Rank and percentile `candidate` would get among `others` of its category.
///
/// The percentile is the share of other entries ranked strictly below it.
pub fn placement(others: &[LeaderboardEntry], candidate: &LeaderboardEntry) -> (usize, u32) {
    let ahead = others
        .iter()
        .filter(|e| compare(e, candidate) == Ordering::Less)
        .count();
    let behind = others
        .iter()
        .filter(|e| compare(e, candidate) == Ordering::Greater)
        .count();

    let percentile = if others.is_empty() {
        100
    } else {
        ((behind as f64 / others.len() as f64) * 100.0).round() as u32
    };

    (ahead + 1, percentile)
}

/// Filters by range, ranks and pages a category's (or everyone's) entries.
pub fn query(
    entries: Vec<LeaderboardEntry>,
    params: &LeaderboardParams,
    now: DateTime<Utc>,
) -> Vec<LeaderboardEntry> {
    let since = params.range.unwrap_or_default().since(now);
    let filtered: Vec<LeaderboardEntry> = entries
        .into_iter()
        .filter(|e| match &params.category_id {
            Some(category_id) => &e.category_id == category_id,
            None => true,
        })
        .filter(|e| since.is_none_or(|s| e.submitted_at >= s))
        .collect();

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0);

    rank_entries(filtered)
        .into_iter()
        .skip(offset)
        .take(limit)
        .collect()
}
