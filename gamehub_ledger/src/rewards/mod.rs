//! Reward points earned by players with developers.

pub mod manager;
pub mod models;

pub use manager::RewardManager;
pub use models::{
    Game, GameId, LeaderboardEntry, NewPointTransaction, PlayerDeveloperPoints, PointActionType,
    PointTransaction,
};
