//! Points award engine.
//!
//! A player earns points with a game's developer for a qualifying action,
//! at most once per (player, game, action). The existence check here gives
//! a clean error on the common path; the store's uniqueness constraint
//! catches the concurrent case and reports the same error.

use super::models::{
    GameId, LeaderboardEntry, NewPointTransaction, PlayerDeveloperPoints, PointActionType,
    PointTransaction,
};
use crate::db::{AccountStore, PointsStore};
use crate::ledger::{
    LedgerContext, LedgerError, LedgerEvent, LedgerResult, Page, PageRequest, PointsLedger, Role,
    UnitOfWork, UserId,
};

/// Reward manager
#[derive(Clone)]
pub struct RewardManager {
    ctx: LedgerContext,
}

impl RewardManager {
    /// Create a new reward manager
    pub fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    /// Award points for an action on a game
    ///
    /// # Arguments
    ///
    /// * `uow` - Open unit of work
    /// * `player_id` - Player earning the points
    /// * `game_id` - Game the action was taken on
    /// * `action` - Qualifying action
    /// * `points` - Explicit amount, or the action's default when `None`
    ///
    /// # Returns
    ///
    /// * `LedgerResult<PointTransaction>` - The award record
    ///
    /// # Errors
    ///
    /// * `LedgerError::Validation` - Points disabled for the game, game owner
    ///   is not a developer, or negative points
    /// * `LedgerError::AlreadyAwarded` - Action already rewarded
    /// * `LedgerError::NotFound` - Unknown player or game
    pub async fn award_in(
        &self,
        uow: &mut UnitOfWork,
        player_id: UserId,
        game_id: GameId,
        action: PointActionType,
        points: Option<i64>,
    ) -> LedgerResult<PointTransaction> {
        let result = async {
            uow.store()
                .find_user(player_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("User", player_id))?;

            let game = uow
                .store()
                .find_game(game_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("Game", game_id))?;

            if !game.support_points {
                return Err(LedgerError::validation(format!(
                    "game {game_id} does not support points"
                )));
            }

            let developer = uow
                .store()
                .find_user(game.developer_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("User", game.developer_id))?;
            if developer.role != Role::Developer {
                return Err(LedgerError::validation(format!(
                    "game {game_id} is not owned by a developer"
                )));
            }

            let points = points.unwrap_or_else(|| action.default_points());
            if points < 0 {
                return Err(LedgerError::validation(format!(
                    "points cannot be negative, got {points}"
                )));
            }

            if uow
                .store()
                .point_award_exists(player_id, game_id, action)
                .await?
            {
                log::debug!(
                    "Player {} already awarded {} on game {}",
                    player_id,
                    action,
                    game_id
                );
                return Err(already_awarded(player_id, game_id, action));
            }

            let record = uow
                .store()
                .insert_point_transaction(&NewPointTransaction {
                    player_id,
                    game_id,
                    action_type: action,
                    points,
                })
                .await?;

            let totals = PointsLedger::award(uow, player_id, developer.id, points).await?;

            log::info!(
                "Awarded {} points to player {} for {} on game {} (total {} with developer {})",
                points,
                player_id,
                action,
                game_id,
                totals.total_points,
                developer.id
            );
            uow.record(LedgerEvent::PointsAwarded {
                player_id,
                game_id,
                developer_id: developer.id,
                action: action.to_string(),
                points,
                total_points: totals.total_points,
            });

            Ok(record)
        }
        .await;
        uow.guard(result)
    }

    /// Award in its own unit of work
    pub async fn award(
        &self,
        player_id: UserId,
        game_id: GameId,
        action: PointActionType,
        points: Option<i64>,
    ) -> LedgerResult<PointTransaction> {
        let mut uow = self.ctx.begin().await?;
        let result = self
            .award_in(&mut uow, player_id, game_id, action, points)
            .await;
        uow.finish(result).await
    }

    /// Award for a path where points are a bonus, not the outcome.
    ///
    /// A duplicate award or a game without points yields `Ok(None)` after
    /// logging. Any other failure, including a game whose owner is not a
    /// developer, still propagates.
    pub async fn award_best_effort(
        &self,
        player_id: UserId,
        game_id: GameId,
        action: PointActionType,
    ) -> LedgerResult<Option<PointTransaction>> {
        let mut uow = self.ctx.begin().await?;
        let result = async {
            let game = uow.store().find_game(game_id).await?;
            if game.is_some_and(|g| !g.support_points) {
                log::info!(
                    "Skipped {} award for player {}: game {} does not support points",
                    action,
                    player_id,
                    game_id
                );
                return Ok(None);
            }
            self.award_in(&mut uow, player_id, game_id, action, None)
                .await
                .map(Some)
        }
        .await;

        match result {
            Err(e @ LedgerError::AlreadyAwarded { .. }) => {
                uow.rollback().await?;
                log::info!("Skipped duplicate award: {}", e);
                Ok(None)
            }
            other => uow.finish(other).await,
        }
    }

    /// Points a player holds with one developer, zero when none were earned
    pub async fn points_for_developer(
        &self,
        player_id: UserId,
        developer_id: UserId,
    ) -> LedgerResult<i64> {
        let mut uow = self.ctx.begin().await?;
        let result = uow.store().find_points(player_id, developer_id).await;
        let row = uow.finish(result).await?;
        Ok(row.map_or(0, |r| r.total_points))
    }

    /// Every per-developer total of a player
    pub async fn points_by_developer(
        &self,
        player_id: UserId,
    ) -> LedgerResult<Vec<PlayerDeveloperPoints>> {
        let mut uow = self.ctx.begin().await?;
        let result = uow.store().list_points_for_player(player_id).await;
        uow.finish(result).await
    }

    /// A player's award history, newest first
    pub async fn point_history(
        &self,
        player_id: UserId,
        page: PageRequest,
    ) -> LedgerResult<Page<PointTransaction>> {
        let mut uow = self.ctx.begin().await?;
        let result = uow
            .store()
            .list_point_transactions(player_id, self.ctx.config().page(page))
            .await;
        uow.finish(result).await
    }

    /// Top players of a developer.
    ///
    /// Ordered by points, then by most recent update: two players on the
    /// same total rank by who reached it last, not by player ID.
    pub async fn leaderboard(
        &self,
        developer_id: UserId,
        limit: Option<u32>,
    ) -> LedgerResult<Vec<LeaderboardEntry>> {
        let limit = limit
            .filter(|n| *n > 0)
            .unwrap_or(self.ctx.config().leaderboard_size);

        let mut uow = self.ctx.begin().await?;
        let result = uow.store().leaderboard(developer_id, limit).await;
        uow.finish(result).await
    }
}

fn already_awarded(player_id: UserId, game_id: GameId, action: PointActionType) -> LedgerError {
    LedgerError::AlreadyAwarded {
        player_id,
        game_id,
        action: action.to_string(),
    }
}
