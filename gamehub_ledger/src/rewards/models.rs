//! Reward points data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::ledger::{LedgerError, UserId};

/// Game ID type
pub type GameId = i64;

/// Catalog snapshot of a game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub developer_id: UserId,
    pub name: String,
    /// Points feature toggle
    pub support_points: bool,
}

/// Player action that earns points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PointActionType {
    DownloadGame,
    WriteReview,
}

impl PointActionType {
    /// Points awarded when the caller does not pass an explicit amount
    pub fn default_points(self) -> i64 {
        match self {
            PointActionType::DownloadGame => 10,
            PointActionType::WriteReview => 20,
        }
    }
}

impl std::fmt::Display for PointActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PointActionType::DownloadGame => write!(f, "DOWNLOAD_GAME"),
            PointActionType::WriteReview => write!(f, "WRITE_REVIEW"),
        }
    }
}

impl FromStr for PointActionType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DOWNLOAD_GAME" => Ok(PointActionType::DownloadGame),
            "WRITE_REVIEW" => Ok(PointActionType::WriteReview),
            other => Err(LedgerError::validation(format!(
                "invalid action type {other}"
            ))),
        }
    }
}

/// Immutable award record; at most one per (player, game, action)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointTransaction {
    pub id: i64,
    pub player_id: UserId,
    pub game_id: GameId,
    pub action_type: PointActionType,
    pub points: i64,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a new award record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewPointTransaction {
    pub player_id: UserId,
    pub game_id: GameId,
    pub action_type: PointActionType,
    pub points: i64,
}

/// Accumulated points of one player with one developer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerDeveloperPoints {
    pub player_id: UserId,
    pub developer_id: UserId,
    pub total_points: i64,
    pub last_updated: DateTime<Utc>,
}

/// One leaderboard row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// 1-based position
    pub rank: u32,
    pub player_id: UserId,
    pub player_email: String,
    pub total_points: i64,
    pub last_updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_points() {
        assert_eq!(PointActionType::DownloadGame.default_points(), 10);
        assert_eq!(PointActionType::WriteReview.default_points(), 20);
    }

    #[test]
    fn test_action_type_parse() {
        assert_eq!(
            "download_game".parse::<PointActionType>().unwrap(),
            PointActionType::DownloadGame
        );
        assert_eq!(
            PointActionType::WriteReview.to_string(),
            "WRITE_REVIEW"
        );
        assert!(matches!(
            "SHARE_GAME".parse::<PointActionType>(),
            Err(LedgerError::Validation(_))
        ));
    }
}
