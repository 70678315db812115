// src/models/leaderboard.rs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A scored attempt as shown on the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub id: String,
    pub attempt_id: String,
    pub user_name: String,
    pub category_id: String,
    pub score: u32,
    pub time_sec: i64,
    pub submitted_at: DateTime<Utc>,
    /// 1-based position, assigned when a listing is ranked.
    #[serde(default)]
    pub rank: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardRange {
    Daily,
    Weekly,
    Monthly,
    #[default]
    All,
}

impl LeaderboardRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaderboardRange::Daily => "daily",
            LeaderboardRange::Weekly => "weekly",
            LeaderboardRange::Monthly => "monthly",
            LeaderboardRange::All => "all",
        }
    }

    /// Lower bound on `submitted_at` for this range.
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            LeaderboardRange::Daily => Some(now - Duration::days(1)),
            LeaderboardRange::Weekly => Some(now - Duration::days(7)),
            LeaderboardRange::Monthly => Some(now - Duration::days(30)),
            LeaderboardRange::All => None,
        }
    }
}

/// Query parameters for the leaderboard listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<LeaderboardRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}
