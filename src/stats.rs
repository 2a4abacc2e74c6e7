//! Weekly statistics and leaderboards.
//!
//! Distances in this module are kilometres and speeds km/h, as the stats
//! endpoints report them (unlike the meters used for raw sessions).

use serde::{Deserialize, Serialize};

/// One day of `GET /user-stats/week/{userId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStat {
    pub day: String,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub average_speed: f64,
}

/// Response of `GET /user-stats/week/{userId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyStats {
    #[serde(default)]
    pub total_distance: f64,
    #[serde(default)]
    pub average_speed: f64,
    #[serde(default)]
    pub daily_stats: Vec<DailyStat>,
}

impl WeeklyStats {
    /// Day with the longest distance; first one wins ties.
    pub fn best_day(&self) -> Option<&DailyStat> {
        let mut best: Option<&DailyStat> = None;
        for day in &self.daily_stats {
            if best.is_none_or(|b| day.distance > b.distance) {
                best = Some(day);
            }
        }
        best
    }

    /// Days with any distance recorded.
    pub fn active_days(&self) -> usize {
        self.daily_stats.iter().filter(|d| d.distance > 0.0).count()
    }
}

/// Leaderboard period slug used in `/top-*/{period}` paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardPeriod {
    ThisWeek,
    ThisMonth,
    #[default]
    LastWeek,
    LastMonth,
}

impl LeaderboardPeriod {
    pub const ALL: [LeaderboardPeriod; 4] = [
        LeaderboardPeriod::ThisWeek,
        LeaderboardPeriod::ThisMonth,
        LeaderboardPeriod::LastWeek,
        LeaderboardPeriod::LastMonth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeaderboardPeriod::ThisWeek => "this_week",
            LeaderboardPeriod::ThisMonth => "this_month",
            LeaderboardPeriod::LastWeek => "last_week",
            LeaderboardPeriod::LastMonth => "last_month",
        }
    }

    /// Periods a user may pick. Running periods are admin-only.
    ///
    /// ```
    /// use route_viewer::stats::LeaderboardPeriod;
    ///
    /// let admins = [1, 2];
    /// assert_eq!(LeaderboardPeriod::available_for(1, &admins).len(), 4);
    /// assert_eq!(
    ///     LeaderboardPeriod::available_for(99, &admins),
    ///     vec![LeaderboardPeriod::LastWeek, LeaderboardPeriod::LastMonth],
    /// );
    /// ```
    pub fn available_for(user_id: i64, admin_ids: &[i64]) -> Vec<LeaderboardPeriod> {
        if admin_ids.contains(&user_id) {
            Self::ALL.to_vec()
        } else {
            vec![LeaderboardPeriod::LastWeek, LeaderboardPeriod::LastMonth]
        }
    }
}

/// Entry of `GET /top-users/{period}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopUser {
    pub user_id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub distance: f64,
}

/// Entry of `GET /top-sessions/{period}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopSession {
    pub session_id: crate::SessionId,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub distance: f64,
    /// Minutes
    #[serde(default)]
    pub duration: f64,
}

/// Entry of `GET /top-daily-distances/{period}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopDailyDistance {
    pub user_id: i64,
    #[serde(default)]
    pub username: String,
    pub date: String,
    #[serde(default)]
    pub distance: f64,
}

/// Response of `GET /total-category-by-distance/{period}`: distance ridden
/// north and south of the city's dividing line.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistanceComparison {
    #[serde(default)]
    pub north_distance: f64,
    #[serde(default)]
    pub south_distance: f64,
    #[serde(default)]
    pub percentage_in_north: f64,
    #[serde(default)]
    pub percentage_in_south: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TopSessionsEnvelope {
    #[serde(default)]
    pub top_sessions: Vec<TopSession>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TopDailyDistancesEnvelope {
    #[serde(default)]
    pub top_daily_distances: Vec<TopDailyDistance>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TotalDistanceEnvelope {
    #[serde(default)]
    pub total_distance: f64,
}

/// Everything the leaderboard view shows for one period.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Leaderboards {
    pub period: LeaderboardPeriod,
    pub top_users: Vec<TopUser>,
    pub top_sessions: Vec<TopSession>,
    pub top_daily_distances: Vec<TopDailyDistance>,
    pub total_distance: f64,
    pub comparison: Option<DistanceComparison>,
}

impl Leaderboards {
    pub fn is_empty(&self) -> bool {
        self.top_users.is_empty() && self.top_sessions.is_empty() && self.top_daily_distances.is_empty()
    }
}

/// Pair entries with their 1-based rank.
pub fn ranked<T>(entries: &[T]) -> impl Iterator<Item = (usize, &T)> {
    entries.iter().enumerate().map(|(i, e)| (i + 1, e))
}

/// Kilometres with two decimals, as list rows show them.
pub fn format_km(km: f64) -> String {
    format!("{:.2} km", km)
}
