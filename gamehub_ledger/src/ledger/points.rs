//! Points ledger: the only code path that writes per-developer point totals.

use super::errors::{LedgerError, LedgerResult};
use super::models::UserId;
use super::unit_of_work::UnitOfWork;
use crate::db::PointsStore;
use crate::rewards::PlayerDeveloperPoints;

/// Award/spend primitives on (player, developer) point totals
pub struct PointsLedger;

impl PointsLedger {
    /// Add points to a player's total with a developer, creating the row on
    /// first award
    pub async fn award(
        uow: &mut UnitOfWork,
        player_id: UserId,
        developer_id: UserId,
        points: i64,
    ) -> LedgerResult<PlayerDeveloperPoints> {
        check_points(points)?;
        let row = uow
            .store()
            .lock_or_create_points(player_id, developer_id)
            .await?;

        let total = row
            .total_points
            .checked_add(points)
            .ok_or(LedgerError::BalanceOverflow)?;

        uow.store()
            .write_points(player_id, developer_id, total)
            .await
    }

    /// Remove points from a player's total with a developer
    ///
    /// # Errors
    ///
    /// * `LedgerError::InsufficientPoints` - Total lower than `points`; nothing
    ///   is written
    pub async fn spend(
        uow: &mut UnitOfWork,
        player_id: UserId,
        developer_id: UserId,
        points: i64,
    ) -> LedgerResult<PlayerDeveloperPoints> {
        check_points(points)?;
        let row = uow
            .store()
            .lock_or_create_points(player_id, developer_id)
            .await?;

        if row.total_points < points {
            return Err(LedgerError::InsufficientPoints {
                available: row.total_points,
                required: points,
            });
        }

        uow.store()
            .write_points(player_id, developer_id, row.total_points - points)
            .await
    }
}

fn check_points(points: i64) -> LedgerResult<()> {
    if points < 0 {
        return Err(LedgerError::validation(format!(
            "points cannot be negative, got {points}"
        )));
    }
    Ok(())
}
