use serde::{Deserialize, Serialize};

/// A player account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Telegram account id.
    pub id: i64,
    pub username: String,
    /// Cash balance in EUR. Non-negativity is enforced at spend
    /// authorization by the store's guarded debit.
    pub balance: f64,
    /// Cumulative eligible trading volume; gates the property market.
    pub trading_volume: f64,
    pub created_at: i64,
}

/// Per-season performance counters, reset when a season rolls over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonStats {
    pub user_id: i64,
    pub season_profit: f64,
    pub season_loss: f64,
    pub trades_count: i64,
    pub updated_at: i64,
}

impl SeasonStats {
    pub fn fresh(user_id: i64) -> Self {
        Self {
            user_id,
            season_profit: 0.0,
            season_loss: 0.0,
            trades_count: 0,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Leaderboard ranking criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardKind {
    /// Cash balance, descending.
    Wealth,
    /// Season profit, descending.
    Profit,
    /// Season loss, descending (wall of shame).
    Loss,
}

impl LeaderboardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaderboardKind::Wealth => "wealth",
            LeaderboardKind::Profit => "profit",
            LeaderboardKind::Loss => "loss",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "wealth" => Some(LeaderboardKind::Wealth),
            "profit" => Some(LeaderboardKind::Profit),
            "loss" => Some(LeaderboardKind::Loss),
            _ => None,
        }
    }
}

/// One leaderboard row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub username: String,
    pub value: f64,
}
